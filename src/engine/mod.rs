//! Engine module - Candidates, selection and the generational population.

mod bitstring;
mod breeder;
mod candidate;
mod entropy;
mod error;
mod evaluator;
mod fitness;
mod hooks;
mod ids;
mod population;
mod rng;
mod selection;
mod statistics;

pub mod distance;
pub mod hash;

pub use bitstring::*;
pub use breeder::*;
pub use candidate::*;
pub use entropy::*;
pub use error::*;
pub use evaluator::*;
pub use fitness::*;
pub use hooks::*;
pub use ids::*;
pub use population::*;
pub use rng::*;
pub use selection::*;
pub use statistics::*;
