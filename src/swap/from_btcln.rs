use async_trait::async_trait;
use bitcoin::hashes::{Hash as _, sha256};
use uuid::Uuid;

use super::request::SwapRequest;
use super::wrapper::{Negotiation, NegotiationTarget, SwapWrapper, WrapperCore};
use super::{FeeTerms, SwapDirection, SwapRecord, SwapStatus, unix_now};
use crate::config::CLAIM_GRACE_PERIOD_SECS;
use crate::error::SwapError;
use crate::intermediary::api::FromBtcLnQuoteRequest;
use crate::lightning::invoice::decode_bolt11;

/// Lightning -> token. The client picks a secret, the intermediary issues a hold invoice for
/// its hash and escrows tokens once the invoice is paid; the user claims with the secret.
pub struct FromBtcLnWrapper {
    core: WrapperCore,
    negotiation: Negotiation,
}

impl FromBtcLnWrapper {
    pub fn new(core: WrapperCore, negotiation: Negotiation) -> Self {
        debug_assert_eq!(core.direction(), SwapDirection::InboundLightning);
        Self { core, negotiation }
    }
}

#[async_trait]
impl SwapWrapper for FromBtcLnWrapper {
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
        let SwapRequest::InboundLightning {
            token,
            amount,
            invoice_expiry_secs,
        } = request
        else {
            return Err(SwapError::DirectionMismatch(SwapDirection::InboundLightning));
        };

        let secret: [u8; 32] = rand::random();
        let payment_hash = sha256::Hash::hash(&secret).to_byte_array();
        let payment_hash_hex = hex::encode(payment_hash);

        let req = FromBtcLnQuoteRequest {
            amount: *amount,
            token: token.clone(),
            claimer: self.core.chain().signer_address(),
            payment_hash: payment_hash_hex.clone(),
            expiry_secs: *invoice_expiry_secs,
        };
        let quote = self
            .negotiation
            .api
            .from_btcln(&target.url, &req)
            .await
            .map_err(|e| e.into_swap_error(&target.url))?;

        let invoice = decode_bolt11(&quote.pr)
            .map_err(|e| target.protocol(format!("undecodable invoice: {e:#}")))?;
        if invoice.payment_hash != payment_hash {
            return Err(target.protocol("invoice payment hash differs from requested"));
        }
        match invoice.amount_msat {
            Some(msat) if msat == amount.saturating_mul(1000) => {}
            other => {
                return Err(target.protocol(format!(
                    "invoice amount {other:?} msat differs from requested {amount} sats"
                )));
            }
        }
        let expiry = invoice
            .expires_at
            .unwrap_or_else(|| unix_now().saturating_add(*invoice_expiry_secs));
        target.verify_terms(*amount, quote.swap_fee_sats, &quote.intermediary, expiry)?;
        if expiry <= unix_now().saturating_add(CLAIM_GRACE_PERIOD_SECS) {
            return Err(target.protocol(format!("invoice expires at {expiry}, too soon to claim")));
        }

        if let Some(pricing) = &self.negotiation.pricing {
            let net = amount.saturating_sub(quote.swap_fee_sats);
            target.verify_price(pricing.is_valid_receive(token, net, quote.total_token).await)?;
        }

        let record = SwapRecord {
            swap_id: Uuid::new_v4().to_string(),
            direction: SwapDirection::InboundLightning,
            intermediary_url: target.url.clone(),
            counterpart_address: quote.intermediary,
            token: token.clone(),
            escrow_handle: payment_hash_hex,
            btc_address: None,
            bolt11_invoice: Some(quote.pr),
            secret_hex: Some(hex::encode(secret)),
            amount_sats: *amount,
            token_amount: quote.total_token,
            fee: FeeTerms {
                base_fee_sats: target.fee.map(|f| f.base_fee_sats).unwrap_or_default(),
                fee_ppm: target.fee.map(|f| f.fee_ppm).unwrap_or_default(),
                swap_fee_sats: quote.swap_fee_sats,
                network_fee_sats: 0,
            },
            expiry,
            created_at: unix_now(),
            status: SwapStatus::Created,
        };
        self.core.persist(&record)?;
        tracing::info!(
            swap_id = %record.swap_id,
            url = %target.url,
            amount_sats = record.amount_sats,
            total_token = record.token_amount,
            "created inbound lightning swap"
        );
        Ok(record)
    }
}
