use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use async_trait::async_trait;

/// Price oracle: values token amounts in sats.
#[async_trait]
pub trait SwapPrice: Send + Sync {
    async fn token_to_sats(&self, token: &str, token_amount: u64) -> Result<u64>;
}

/// Static rates in micro-sats per token base unit. Token keys are matched case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct FixedSwapPrice {
    usat_per_unit: HashMap<String, u64>,
}

impl FixedSwapPrice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, token: &str, usat_per_unit: u64) -> Self {
        self.usat_per_unit
            .insert(token.to_ascii_lowercase(), usat_per_unit);
        self
    }
}

#[async_trait]
impl SwapPrice for FixedSwapPrice {
    async fn token_to_sats(&self, token: &str, token_amount: u64) -> Result<u64> {
        let rate = self
            .usat_per_unit
            .get(&token.to_ascii_lowercase())
            .with_context(|| format!("no price for token {token}"))?;
        let sats = u128::from(token_amount) * u128::from(*rate) / 1_000_000;
        u64::try_from(sats).context("token value overflows u64 sats")
    }
}

/// Checks quoted token amounts against the oracle within a ppm tolerance.
#[derive(Clone)]
pub struct PriceCheck {
    price: Arc<dyn SwapPrice>,
    max_difference_ppm: u64,
}

impl PriceCheck {
    pub fn new(price: Arc<dyn SwapPrice>, max_difference_ppm: u64) -> Self {
        Self {
            price,
            max_difference_ppm,
        }
    }

    /// The user pays `total_token` for `sats_owed` (amount plus fees).
    pub async fn is_valid_send(&self, token: &str, sats_owed: u64, total_token: u64) -> Result<bool> {
        let value = self.price.token_to_sats(token, total_token).await?;
        Ok(value <= sats_owed.saturating_add(ppm_of(sats_owed, self.max_difference_ppm)))
    }

    /// The user receives `total_token` for `sats_net` (amount minus swap fee).
    pub async fn is_valid_receive(
        &self,
        token: &str,
        sats_net: u64,
        total_token: u64,
    ) -> Result<bool> {
        let value = self.price.token_to_sats(token, total_token).await?;
        Ok(value >= sats_net.saturating_sub(ppm_of(sats_net, self.max_difference_ppm)))
    }
}

fn ppm_of(amount: u64, ppm: u64) -> u64 {
    (u128::from(amount) * u128::from(ppm) / 1_000_000) as u64
}
