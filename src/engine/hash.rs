//! Deterministic djb2 hashing.
//!
//! Used wherever a hash leaks into observable results (entropy symbols, group
//! hashes, reseeding), so values never depend on the process or toolchain.

const DJB_START: u64 = 5381;

/// djb2 over a byte string.
pub fn djb_bytes(bytes: &[u8]) -> u64 {
    djb_continue(DJB_START, bytes)
}

/// djb2 over a string.
pub fn djb_str(text: &str) -> u64 {
    djb_bytes(text.as_bytes())
}

/// Mix a sequence of 64-bit values starting from `seed`.
pub fn djb_mix(seed: u64, values: &[u64]) -> u64 {
    values
        .iter()
        .fold(seed, |hash, value| djb_continue(hash, &value.to_le_bytes()))
}

fn djb_continue(start: u64, bytes: &[u8]) -> u64 {
    bytes.iter().fold(start, |hash, &byte| {
        (hash << 5).wrapping_add(hash).wrapping_add(u64::from(byte))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_djb_known_values() {
        assert_eq!(djb_bytes(b""), 5381);
        assert_eq!(djb_bytes(b"a"), 5381 * 33 + 97);
    }

    #[test]
    fn test_djb_mix_is_order_sensitive() {
        assert_ne!(djb_mix(1, &[1, 2]), djb_mix(1, &[2, 1]));
        assert_eq!(djb_mix(1, &[1, 2]), djb_mix(1, &[1, 2]));
    }
}
