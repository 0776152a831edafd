pub mod bounds;
pub mod from_btc;
pub mod from_btcln;
pub mod request;
pub mod state;
pub mod store;
pub mod swapper;
pub mod to_btc;
pub mod to_btcln;
pub mod wrapper;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Swap direction, named from the account chain's point of view.
///
/// The serialized form doubles as the intermediary HTTP path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SwapDirection {
    #[serde(rename = "tobtc")]
    OutboundOnchain,
    #[serde(rename = "tobtcln")]
    OutboundLightning,
    #[serde(rename = "frombtc")]
    InboundOnchain,
    #[serde(rename = "frombtcln")]
    InboundLightning,
}

impl SwapDirection {
    /// Aggregation order used by every cross-direction query.
    pub const ALL: [SwapDirection; 4] = [
        SwapDirection::OutboundLightning,
        SwapDirection::OutboundOnchain,
        SwapDirection::InboundLightning,
        SwapDirection::InboundOnchain,
    ];

    pub fn path_segment(self) -> &'static str {
        match self {
            SwapDirection::OutboundOnchain => "tobtc",
            SwapDirection::OutboundLightning => "tobtcln",
            SwapDirection::InboundOnchain => "frombtc",
            SwapDirection::InboundLightning => "frombtcln",
        }
    }

    /// Outbound swaps lock the user's tokens; the user is the party that refunds.
    pub fn is_outbound(self) -> bool {
        matches!(
            self,
            SwapDirection::OutboundOnchain | SwapDirection::OutboundLightning
        )
    }

    pub fn is_lightning(self) -> bool {
        matches!(
            self,
            SwapDirection::OutboundLightning | SwapDirection::InboundLightning
        )
    }
}

impl fmt::Display for SwapDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}

impl FromStr for SwapDirection {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SwapDirection::ALL
            .into_iter()
            .find(|d| d.path_segment() == s)
            .ok_or_else(|| anyhow::anyhow!("unknown swap direction: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapStatus {
    Created,
    Locked,
    Claimed,
    Refundable,
    Refunded,
    Failed,
}

impl SwapStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SwapStatus::Claimed | SwapStatus::Refunded | SwapStatus::Failed
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SwapStatus::Created => "created",
            SwapStatus::Locked => "locked",
            SwapStatus::Claimed => "claimed",
            SwapStatus::Refundable => "refundable",
            SwapStatus::Refunded => "refunded",
            SwapStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for SwapStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fee terms agreed with the intermediary when the swap was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeTerms {
    pub base_fee_sats: u64,
    pub fee_ppm: u64,
    pub swap_fee_sats: u64,
    /// Bitcoin network fee (on-chain) or routing fee ceiling (lightning).
    pub network_fee_sats: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRecord {
    pub swap_id: String,
    pub direction: SwapDirection,

    pub intermediary_url: String,
    /// Intermediary's settlement address on the account chain.
    pub counterpart_address: String,
    pub token: String,

    /// Hex payment hash identifying the escrow (and the invoice for lightning swaps).
    pub escrow_handle: String,
    pub btc_address: Option<String>,
    pub bolt11_invoice: Option<String>,
    /// Preimage of `escrow_handle`, only known for inbound lightning swaps.
    pub secret_hex: Option<String>,

    pub amount_sats: u64,
    pub token_amount: u64,
    pub fee: FeeTerms,

    /// Unix seconds after which the escrow can no longer be claimed.
    pub expiry: u64,
    pub created_at: u64,

    pub status: SwapStatus,
}

pub(crate) fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
