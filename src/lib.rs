//! Client-side orchestration of token <-> Bitcoin swaps through untrusted intermediaries.
//!
//! The [`swap::swapper::Swapper`] façade resolves candidate intermediaries, negotiates with
//! them one at a time, blacklists the ones that misbehave and exposes the lifecycle state of
//! every swap across the four swap directions.

pub mod btc;
pub mod chain;
pub mod config;
pub mod error;
pub mod intermediary;
pub mod lightning;
pub mod logging;
pub mod pricing;
pub mod swap;

pub use error::SwapError;
pub use swap::swapper::{Swapper, SwapperBuilder};
pub use swap::{SwapDirection, SwapRecord, SwapStatus};
