use serde::{Deserialize, Serialize};

use super::SwapDirection;
use crate::error::SwapError;
use crate::intermediary::directory::IntermediaryDirectory;

/// Inclusive amount range in sats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountBounds {
    pub min: u64,
    pub max: u64,
}

impl AmountBounds {
    pub fn contains(&self, amount: u64) -> bool {
        (self.min..=self.max).contains(&amount)
    }

    pub fn check(&self, direction: SwapDirection, amount: u64) -> Result<(), SwapError> {
        if self.contains(amount) {
            return Ok(());
        }
        Err(SwapError::OutOfBounds {
            direction,
            amount,
            min: self.min,
            max: self.max,
        })
    }
}

/// Protocol defaults used when no intermediary advertises bounds.
pub const fn default_bounds(direction: SwapDirection) -> AmountBounds {
    match direction {
        SwapDirection::OutboundLightning | SwapDirection::InboundLightning => AmountBounds {
            min: 1_000,
            max: 1_000_000,
        },
        SwapDirection::OutboundOnchain | SwapDirection::InboundOnchain => AmountBounds {
            min: 10_000,
            max: 1_000_000,
        },
    }
}

/// Resolves per-direction bounds: directory-advertised values first, protocol defaults
/// otherwise. Never yields `min > max`.
#[derive(Clone, Copy)]
pub struct BoundsRegistry<'a> {
    directory: Option<&'a IntermediaryDirectory>,
}

impl<'a> BoundsRegistry<'a> {
    pub fn new(directory: Option<&'a IntermediaryDirectory>) -> Self {
        Self { directory }
    }

    pub fn bounds(&self, direction: SwapDirection) -> AmountBounds {
        let defaults = default_bounds(direction);
        let Some(directory) = self.directory else {
            return defaults;
        };

        let resolved = AmountBounds {
            min: directory.swap_minimum(direction).unwrap_or(defaults.min),
            max: directory.swap_maximum(direction).unwrap_or(defaults.max),
        };
        if resolved.min <= resolved.max {
            resolved
        } else {
            defaults
        }
    }

    pub fn get_minimum(&self, direction: SwapDirection) -> u64 {
        self.bounds(direction).min
    }

    pub fn get_maximum(&self, direction: SwapDirection) -> u64 {
        self.bounds(direction).max
    }
}
