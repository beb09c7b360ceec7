//! Pre-flight rate limiting and circuit breaking shared by every API call.

pub mod circuit;
pub mod rate_limit;

pub use circuit::*;
pub use rate_limit::*;
