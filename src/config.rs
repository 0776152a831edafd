use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use bitcoin::Network;
use serde::Serialize;

/// Outbound on-chain: confirmation target the intermediary uses to pick its BTC fee rate.
pub const DEFAULT_CONFIRMATION_TARGET: u32 = 3;
/// Outbound on-chain: confirmations the intermediary waits for before claiming.
pub const DEFAULT_CONFIRMATIONS: u32 = 3;
/// Outbound lightning: how long the user's tokens stay locked.
pub const DEFAULT_LIGHTNING_LOCK_SECS: u64 = 3 * 24 * 3600;
/// Inbound lightning: expiry of the invoice issued by the intermediary.
pub const DEFAULT_INVOICE_EXPIRY_SECS: u64 = 24 * 3600;
/// Outbound lightning routing fee ceiling when the caller does not set one.
pub const DEFAULT_MAX_ROUTING_BASE_FEE_SATS: u64 = 10;
pub const DEFAULT_MAX_ROUTING_FEE_PPM: u64 = 2000;

/// Outbound: a locked swap is refundable only this long after expiry, so chain time has
/// certainly passed it.
pub const REFUND_GRACE_PERIOD_SECS: u64 = 10 * 60;
/// Inbound: a locked swap stops being claimable this long before expiry.
pub const CLAIM_GRACE_PERIOD_SECS: u64 = 10 * 60;
/// Outbound: an uncommitted swap fails this long before expiry, when the intermediary's
/// authorization can no longer be relied on.
pub const AUTHORIZATION_GRACE_PERIOD_SECS: u64 = 5 * 60;

pub const BITCOIN_BLOCK_TIME_SECS: u64 = 10 * 60;
/// Inbound on-chain: time the user needs to broadcast the deposit.
pub const MIN_SEND_WINDOW_SECS: u64 = 30 * 60;
/// Inbound on-chain: blocks until the deposit counts as confirmed.
pub const BLOCKS_TILL_TX_CONFIRMS: u64 = 12;
pub const SEND_WINDOW_SAFETY_FACTOR: u64 = 2;

/// Shortest quote lifetime accepted for an inbound on-chain swap.
pub const fn min_deposit_window_secs() -> u64 {
    MIN_SEND_WINDOW_SECS + BLOCKS_TILL_TX_CONFIRMS * BITCOIN_BLOCK_TIME_SECS * SEND_WINDOW_SAFETY_FACTOR
}

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_MAX_PRICE_DIFFERENCE_PPM: u64 = 5000;

#[derive(Debug, Clone)]
pub struct SwapperOptions {
    /// Talk to this intermediary only; disables discovery and failover.
    pub intermediary_url: Option<String>,
    pub registry_url: Option<String>,
    pub bitcoin_network: Network,
    /// Directory holding `swaps.sqlite3`. In-memory storage when unset.
    pub storage_dir: Option<PathBuf>,
    pub request_timeout: Duration,
    pub max_price_difference_ppm: u64,
}

impl Default for SwapperOptions {
    fn default() -> Self {
        Self {
            intermediary_url: None,
            registry_url: None,
            bitcoin_network: Network::Testnet,
            storage_dir: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_price_difference_ppm: DEFAULT_MAX_PRICE_DIFFERENCE_PPM,
        }
    }
}

impl SwapperOptions {
    pub fn for_chain(preset: ChainPreset) -> Self {
        Self {
            bitcoin_network: preset.bitcoin_network(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainPreset {
    Polygon,
    PolygonTestnet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ContractAddresses {
    pub swap_contract: &'static str,
    pub btc_relay_contract: &'static str,
}

impl ChainPreset {
    pub fn chain_id(self) -> u64 {
        match self {
            ChainPreset::Polygon => 137,
            ChainPreset::PolygonTestnet => 80001,
        }
    }

    pub fn addresses(self) -> ContractAddresses {
        match self {
            ChainPreset::Polygon => ContractAddresses {
                swap_contract: "0xF96cCB6e33c3f476D983Eed48817B128193B3bdd",
                btc_relay_contract: "0x585005F61A4a56a453fa4e88216c0D37e782fFe3",
            },
            ChainPreset::PolygonTestnet => ContractAddresses {
                swap_contract: "0x140b71Bbc5605C97065CD22A3dFD0fe81260Be2F",
                btc_relay_contract: "0xEB8546E8B955b7564239Be8452AC2a8B24c07Ed7",
            },
        }
    }

    pub fn bitcoin_network(self) -> Network {
        match self {
            ChainPreset::Polygon => Network::Bitcoin,
            ChainPreset::PolygonTestnet => Network::Testnet,
        }
    }
}

impl FromStr for ChainPreset {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "polygon" => Ok(ChainPreset::Polygon),
            "polygon-testnet" | "polygon_testnet" => Ok(ChainPreset::PolygonTestnet),
            other => anyhow::bail!("unknown chain preset: {other}"),
        }
    }
}
