//! Advertising API client: search, bulk mutate, single-resource lookups, and paged streams.
//!
//! Every call runs the same pipeline. A valid token is resolved through the
//! [`TokenManager`](crate::flows::TokenManager), the [`RateLimiter`](crate::resilience::RateLimiter)
//! approves the operation count and request size, and the HTTP exchange itself runs inside the
//! [`CircuitBreaker`](crate::resilience::CircuitBreaker). Non-2xx responses are classified into
//! the crate [`Error`](crate::error::Error) taxonomy before the breaker sees them.

pub mod classify;
pub mod client;
pub mod mutate;
pub mod stream;
pub mod types;

pub use client::*;
pub use types::*;
