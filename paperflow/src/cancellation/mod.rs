//! Cooperative cancellation for in-flight stage calls.
//!
//! A reset cancels the token owned by the current run; any stage call racing
//! against it resolves as cancelled and its late result is discarded.

mod token;

pub use token::CancellationToken;
