use super::SwapDirection;
use crate::config::{
    DEFAULT_CONFIRMATION_TARGET, DEFAULT_CONFIRMATIONS, DEFAULT_INVOICE_EXPIRY_SECS,
    DEFAULT_LIGHTNING_LOCK_SECS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapAmount {
    /// Sats the recipient receives.
    ExactOut(u64),
    /// Token base units the user spends.
    ExactIn(u64),
}

/// Parameters of one swap, one variant per direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapRequest {
    OutboundOnchain {
        token: String,
        address: String,
        amount: SwapAmount,
        confirmation_target: u32,
        confirmations: u32,
    },
    OutboundLightning {
        token: String,
        invoice: String,
        expiry_secs: u64,
        max_routing_base_fee: Option<u64>,
        max_routing_ppm: Option<u64>,
    },
    InboundOnchain {
        token: String,
        amount: u64,
    },
    InboundLightning {
        token: String,
        amount: u64,
        invoice_expiry_secs: u64,
    },
}

impl SwapRequest {
    pub fn to_btc(token: impl Into<String>, address: impl Into<String>, amount_sats: u64) -> Self {
        Self::OutboundOnchain {
            token: token.into(),
            address: address.into(),
            amount: SwapAmount::ExactOut(amount_sats),
            confirmation_target: DEFAULT_CONFIRMATION_TARGET,
            confirmations: DEFAULT_CONFIRMATIONS,
        }
    }

    pub fn to_btc_exact_in(
        token: impl Into<String>,
        address: impl Into<String>,
        token_amount: u64,
    ) -> Self {
        Self::OutboundOnchain {
            token: token.into(),
            address: address.into(),
            amount: SwapAmount::ExactIn(token_amount),
            confirmation_target: DEFAULT_CONFIRMATION_TARGET,
            confirmations: DEFAULT_CONFIRMATIONS,
        }
    }

    pub fn to_btcln(token: impl Into<String>, invoice: impl Into<String>) -> Self {
        Self::OutboundLightning {
            token: token.into(),
            invoice: invoice.into(),
            expiry_secs: DEFAULT_LIGHTNING_LOCK_SECS,
            max_routing_base_fee: None,
            max_routing_ppm: None,
        }
    }

    pub fn from_btc(token: impl Into<String>, amount_sats: u64) -> Self {
        Self::InboundOnchain {
            token: token.into(),
            amount: amount_sats,
        }
    }

    pub fn from_btcln(token: impl Into<String>, amount_sats: u64) -> Self {
        Self::InboundLightning {
            token: token.into(),
            amount: amount_sats,
            invoice_expiry_secs: DEFAULT_INVOICE_EXPIRY_SECS,
        }
    }

    pub fn direction(&self) -> SwapDirection {
        match self {
            Self::OutboundOnchain { .. } => SwapDirection::OutboundOnchain,
            Self::OutboundLightning { .. } => SwapDirection::OutboundLightning,
            Self::InboundOnchain { .. } => SwapDirection::InboundOnchain,
            Self::InboundLightning { .. } => SwapDirection::InboundLightning,
        }
    }

    pub fn token(&self) -> &str {
        match self {
            Self::OutboundOnchain { token, .. }
            | Self::OutboundLightning { token, .. }
            | Self::InboundOnchain { token, .. }
            | Self::InboundLightning { token, .. } => token,
        }
    }
}
