use async_trait::async_trait;
use uuid::Uuid;

use super::request::SwapRequest;
use super::wrapper::{Negotiation, NegotiationTarget, SwapWrapper, WrapperCore};
use super::{FeeTerms, SwapDirection, SwapRecord, SwapStatus, unix_now};
use crate::btc::address::is_valid_address;
use crate::config::min_deposit_window_secs;
use crate::error::SwapError;
use crate::intermediary::api::FromBtcQuoteRequest;

/// On-chain BTC -> token. The intermediary escrows tokens for the user, who claims them by
/// proving the BTC deposit to `btc_address`.
pub struct FromBtcWrapper {
    core: WrapperCore,
    negotiation: Negotiation,
}

impl FromBtcWrapper {
    pub fn new(core: WrapperCore, negotiation: Negotiation) -> Self {
        debug_assert_eq!(core.direction(), SwapDirection::InboundOnchain);
        Self { core, negotiation }
    }
}

#[async_trait]
impl SwapWrapper for FromBtcWrapper {
    fn core(&self) -> &WrapperCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut WrapperCore {
        &mut self.core
    }

    async fn create(
        &self,
        request: &SwapRequest,
        target: &NegotiationTarget,
    ) -> Result<SwapRecord, SwapError> {
        self.core.ensure_running()?;
        let SwapRequest::InboundOnchain { token, amount } = request else {
            return Err(SwapError::DirectionMismatch(SwapDirection::InboundOnchain));
        };

        let req = FromBtcQuoteRequest {
            amount: *amount,
            token: token.clone(),
            claimer: self.core.chain().signer_address(),
        };
        let quote = self
            .negotiation
            .api
            .from_btc(&target.url, &req)
            .await
            .map_err(|e| e.into_swap_error(&target.url))?;

        if quote.amount_sats != *amount {
            return Err(target.protocol(format!(
                "quoted amount {} differs from requested {amount}",
                quote.amount_sats
            )));
        }
        target.verify_terms(
            quote.amount_sats,
            quote.swap_fee_sats,
            &quote.intermediary,
            quote.expiry,
        )?;
        target.verify_payment_hash(&quote.payment_hash)?;
        let window = quote.expiry.saturating_sub(unix_now());
        if window < min_deposit_window_secs() {
            return Err(target.protocol(format!(
                "expiry leaves {window}s to deposit, need {}s",
                min_deposit_window_secs()
            )));
        }
        if !is_valid_address(&quote.btc_address, self.negotiation.bitcoin_network) {
            return Err(target.protocol(format!(
                "deposit address {} invalid on {}",
                quote.btc_address, self.negotiation.bitcoin_network
            )));
        }

        if let Some(pricing) = &self.negotiation.pricing {
            let net = quote.amount_sats.saturating_sub(quote.swap_fee_sats);
            target.verify_price(pricing.is_valid_receive(token, net, quote.total_token).await)?;
        }

        let record = SwapRecord {
            swap_id: Uuid::new_v4().to_string(),
            direction: SwapDirection::InboundOnchain,
            intermediary_url: target.url.clone(),
            counterpart_address: quote.intermediary,
            token: token.clone(),
            escrow_handle: quote.payment_hash.to_ascii_lowercase(),
            btc_address: Some(quote.btc_address),
            bolt11_invoice: None,
            secret_hex: None,
            amount_sats: quote.amount_sats,
            token_amount: quote.total_token,
            fee: FeeTerms {
                base_fee_sats: target.fee.map(|f| f.base_fee_sats).unwrap_or_default(),
                fee_ppm: target.fee.map(|f| f.fee_ppm).unwrap_or_default(),
                swap_fee_sats: quote.swap_fee_sats,
                network_fee_sats: 0,
            },
            expiry: quote.expiry,
            created_at: unix_now(),
            status: SwapStatus::Created,
        };
        self.core.persist(&record)?;
        tracing::info!(
            swap_id = %record.swap_id,
            url = %target.url,
            amount_sats = record.amount_sats,
            total_token = record.token_amount,
            "created inbound on-chain swap"
        );
        Ok(record)
    }
}
