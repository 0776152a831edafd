use crate::swap::{SwapDirection, SwapStatus};

/// Errors surfaced by the swapper façade and the per-direction wrappers.
#[derive(Debug, thiserror::Error)]
pub enum SwapError {
    #[error("amount {amount} sats outside {direction} bounds [{min}, {max}]")]
    OutOfBounds {
        direction: SwapDirection,
        amount: u64,
        min: u64,
        max: u64,
    },

    #[error("invalid lightning invoice: {0}")]
    InvalidInvoice(String),

    #[error("invalid bitcoin address: {0}")]
    InvalidAddress(String),

    #[error("no intermediary available")]
    NoIntermediaryAvailable,

    /// Malformed or dishonest response. The only variant that blacklists the intermediary.
    #[error("intermediary {url} misbehaved: {reason}")]
    IntermediaryProtocol { url: String, reason: String },

    #[error("intermediary {url} unreachable: {reason}")]
    Transport { url: String, reason: String },

    #[error("intermediary {url} rejected the request (HTTP {status}): {message}")]
    Rejected {
        url: String,
        status: u16,
        message: String,
    },

    #[error("request is not a {0} swap request")]
    DirectionMismatch(SwapDirection),

    #[error("swap {swap_id} is {status}, cannot {action}")]
    NotActionable {
        swap_id: String,
        status: SwapStatus,
        action: &'static str,
    },

    #[error("swapper is not running")]
    NotRunning,

    #[error("swap creation cancelled")]
    Cancelled,

    #[error("pricing: {0:#}")]
    Pricing(anyhow::Error),

    #[error("chain adapter: {0:#}")]
    Chain(anyhow::Error),

    #[error("swap storage: {0:#}")]
    Storage(anyhow::Error),
}

impl SwapError {
    pub fn protocol(url: &str, reason: impl Into<String>) -> Self {
        Self::IntermediaryProtocol {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    /// True when the intermediary is to blame and must not be offered again.
    pub fn is_intermediary_fault(&self) -> bool {
        matches!(self, Self::IntermediaryProtocol { .. })
    }
}
