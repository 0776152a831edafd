use async_trait::async_trait;
use uuid::Uuid;

use super::request::{SwapAmount, SwapRequest};
use super::wrapper::{Negotiation, NegotiationTarget, SwapWrapper, WrapperCore};
use super::{FeeTerms, SwapDirection, SwapRecord, SwapStatus, unix_now};
use crate::error::SwapError;
use crate::intermediary::api::ToBtcQuoteRequest;

/// Token -> on-chain BTC. The user locks tokens; the intermediary claims them once it proves
/// the BTC payment to `address`.
pub struct ToBtcWrapper {
    core: WrapperCore,
    negotiation: Negotiation,
}

impl ToBtcWrapper {
    pub fn new(core: WrapperCore, negotiation: Negotiation) -> Self {
        debug_assert_eq!(core.direction(), SwapDirection::OutboundOnchain);
        Self { core, negotiation }
    }
}

#[async_trait]
impl SwapWrapper for ToBtcWrapper {
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
        let SwapRequest::OutboundOnchain {
            token,
            address,
            amount,
            confirmation_target,
            confirmations,
        } = request
        else {
            return Err(SwapError::DirectionMismatch(SwapDirection::OutboundOnchain));
        };

        let (requested, exact_in) = match *amount {
            SwapAmount::ExactOut(sats) => (sats, false),
            SwapAmount::ExactIn(token_units) => (token_units, true),
        };
        let req = ToBtcQuoteRequest {
            address: address.clone(),
            amount: requested,
            exact_in,
            token: token.clone(),
            offerer: self.core.chain().signer_address(),
            confirmation_target: *confirmation_target,
            confirmations: *confirmations,
        };
        let quote = self
            .negotiation
            .api
            .to_btc(&target.url, &req)
            .await
            .map_err(|e| e.into_swap_error(&target.url))?;

        match *amount {
            SwapAmount::ExactOut(sats) if quote.amount_sats != sats => {
                return Err(target.protocol(format!(
                    "quoted amount {} differs from requested {sats}",
                    quote.amount_sats
                )));
            }
            SwapAmount::ExactIn(units) if quote.total_token != units => {
                return Err(target.protocol(format!(
                    "quoted input {} differs from requested {units}",
                    quote.total_token
                )));
            }
            _ => {}
        }
        target.verify_terms(
            quote.amount_sats,
            quote.swap_fee_sats,
            &quote.intermediary,
            quote.expiry,
        )?;
        target.verify_payment_hash(&quote.payment_hash)?;

        if let Some(pricing) = &self.negotiation.pricing {
            let owed = quote
                .amount_sats
                .saturating_add(quote.swap_fee_sats)
                .saturating_add(quote.network_fee_sats);
            target.verify_price(pricing.is_valid_send(token, owed, quote.total_token).await)?;
        }

        let record = SwapRecord {
            swap_id: Uuid::new_v4().to_string(),
            direction: SwapDirection::OutboundOnchain,
            intermediary_url: target.url.clone(),
            counterpart_address: quote.intermediary,
            token: token.clone(),
            escrow_handle: quote.payment_hash.to_ascii_lowercase(),
            btc_address: Some(address.clone()),
            bolt11_invoice: None,
            secret_hex: None,
            amount_sats: quote.amount_sats,
            token_amount: quote.total_token,
            fee: FeeTerms {
                base_fee_sats: target.fee.map(|f| f.base_fee_sats).unwrap_or_default(),
                fee_ppm: target.fee.map(|f| f.fee_ppm).unwrap_or_default(),
                swap_fee_sats: quote.swap_fee_sats,
                network_fee_sats: quote.network_fee_sats,
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
            "created outbound on-chain swap"
        );
        Ok(record)
    }
}
