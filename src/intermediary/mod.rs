pub mod api;
pub mod directory;
pub mod registry;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::swap::SwapDirection;
use crate::swap::bounds::AmountBounds;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub base_fee_sats: u64,
    pub fee_ppm: u64,
}

impl FeeSchedule {
    /// Highest acceptable swap fee for `amount_sats`.
    pub fn fee_for(&self, amount_sats: u64) -> u64 {
        let proportional = u128::from(amount_sats) * u128::from(self.fee_ppm) / 1_000_000;
        self.base_fee_sats
            .saturating_add(u64::try_from(proportional).unwrap_or(u64::MAX))
    }
}

/// What an intermediary advertises for one direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    #[serde(flatten)]
    pub fee: FeeSchedule,
    pub min_sats: u64,
    pub max_sats: u64,
}

impl ServiceInfo {
    pub fn bounds(&self) -> AmountBounds {
        AmountBounds {
            min: self.min_sats,
            max: self.max_sats,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intermediary {
    pub url: String,
    /// Settlement address on the account chain.
    pub address: String,
    pub tokens: Vec<String>,
    pub services: BTreeMap<SwapDirection, ServiceInfo>,
}

impl Intermediary {
    pub fn service(&self, direction: SwapDirection) -> Option<&ServiceInfo> {
        self.services.get(&direction)
    }

    pub fn supports_token(&self, token: &str) -> bool {
        self.tokens.iter().any(|t| t.eq_ignore_ascii_case(token))
    }

    /// Blacklist key: the URL without a trailing slash.
    pub fn key(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}
