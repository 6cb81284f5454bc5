//! Schema module - Configuration, identity and checkpoint types for the engine.

mod config;
mod state;

pub use config::*;
pub use state::*;
