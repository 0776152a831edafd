use async_trait::async_trait;
use uuid::Uuid;

use super::request::SwapRequest;
use super::wrapper::{Negotiation, NegotiationTarget, SwapWrapper, WrapperCore};
use super::{FeeTerms, SwapDirection, SwapRecord, SwapStatus, unix_now};
use crate::config::{DEFAULT_MAX_ROUTING_BASE_FEE_SATS, DEFAULT_MAX_ROUTING_FEE_PPM};
use crate::error::SwapError;
use crate::intermediary::FeeSchedule;
use crate::intermediary::api::ToBtcLnQuoteRequest;
use crate::lightning::invoice::decode_bolt11;

/// Token -> lightning. The user locks tokens against the invoice's payment hash; the
/// intermediary claims them with the preimage it learns by paying the invoice.
pub struct ToBtcLnWrapper {
    core: WrapperCore,
    negotiation: Negotiation,
}

impl ToBtcLnWrapper {
    pub fn new(core: WrapperCore, negotiation: Negotiation) -> Self {
        debug_assert_eq!(core.direction(), SwapDirection::OutboundLightning);
        Self { core, negotiation }
    }
}

#[async_trait]
impl SwapWrapper for ToBtcLnWrapper {
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
        let SwapRequest::OutboundLightning {
            token,
            invoice,
            expiry_secs,
            max_routing_base_fee,
            max_routing_ppm,
        } = request
        else {
            return Err(SwapError::DirectionMismatch(SwapDirection::OutboundLightning));
        };

        let decoded =
            decode_bolt11(invoice).map_err(|e| SwapError::InvalidInvoice(format!("{e:#}")))?;
        let amount_sats = decoded
            .amount_sats()
            .ok_or_else(|| SwapError::InvalidInvoice("invoice has no amount".to_string()))?;

        let routing_ceiling = FeeSchedule {
            base_fee_sats: max_routing_base_fee.unwrap_or(DEFAULT_MAX_ROUTING_BASE_FEE_SATS),
            fee_ppm: max_routing_ppm.unwrap_or(DEFAULT_MAX_ROUTING_FEE_PPM),
        }
        .fee_for(amount_sats);
        let expiry = unix_now().saturating_add(*expiry_secs);

        let req = ToBtcLnQuoteRequest {
            pr: invoice.clone(),
            max_fee_sats: routing_ceiling,
            expiry_timestamp: expiry,
            token: token.clone(),
            offerer: self.core.chain().signer_address(),
        };
        let quote = self
            .negotiation
            .api
            .to_btcln(&target.url, &req)
            .await
            .map_err(|e| e.into_swap_error(&target.url))?;

        if quote.routing_fee_sats > routing_ceiling {
            return Err(target.protocol(format!(
                "routing fee {} exceeds ceiling {routing_ceiling}",
                quote.routing_fee_sats
            )));
        }
        target.verify_terms(amount_sats, quote.swap_fee_sats, &quote.intermediary, expiry)?;

        if let Some(pricing) = &self.negotiation.pricing {
            let owed = amount_sats
                .saturating_add(quote.swap_fee_sats)
                .saturating_add(quote.routing_fee_sats);
            target.verify_price(pricing.is_valid_send(token, owed, quote.total_token).await)?;
        }

        let record = SwapRecord {
            swap_id: Uuid::new_v4().to_string(),
            direction: SwapDirection::OutboundLightning,
            intermediary_url: target.url.clone(),
            counterpart_address: quote.intermediary,
            token: token.clone(),
            escrow_handle: decoded.payment_hash_hex(),
            btc_address: None,
            bolt11_invoice: Some(invoice.clone()),
            secret_hex: None,
            amount_sats,
            token_amount: quote.total_token,
            fee: FeeTerms {
                base_fee_sats: target.fee.map(|f| f.base_fee_sats).unwrap_or_default(),
                fee_ppm: target.fee.map(|f| f.fee_ppm).unwrap_or_default(),
                swap_fee_sats: quote.swap_fee_sats,
                network_fee_sats: quote.routing_fee_sats,
            },
            expiry,
            created_at: unix_now(),
            status: SwapStatus::Created,
        };
        self.core.persist(&record)?;
        tracing::info!(
            swap_id = %record.swap_id,
            url = %target.url,
            amount_sats,
            total_token = record.token_amount,
            "created outbound lightning swap"
        );
        Ok(record)
    }
}
