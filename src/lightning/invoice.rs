use std::str::FromStr as _;

use anyhow::Result;
use bitcoin::hashes::Hash as _;
use lightning_invoice::Bolt11Invoice;

/// The parts of a BOLT11 invoice the swap flow cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedInvoice {
    pub payment_hash: [u8; 32],
    pub amount_msat: Option<u64>,
    /// Unix seconds after which the invoice can no longer be paid.
    pub expires_at: Option<u64>,
}

impl DecodedInvoice {
    /// Amount in whole sats, rounding msat down.
    pub fn amount_sats(&self) -> Option<u64> {
        self.amount_msat.map(|msat| msat / 1000)
    }

    pub fn payment_hash_hex(&self) -> String {
        hex::encode(self.payment_hash)
    }
}

pub fn decode_bolt11(invoice: &str) -> Result<DecodedInvoice> {
    let invoice = Bolt11Invoice::from_str(invoice.trim())
        .map_err(|e| anyhow::anyhow!("parse BOLT11 invoice: {e:?}"))?;
    Ok(DecodedInvoice {
        payment_hash: invoice.payment_hash().to_byte_array(),
        amount_msat: invoice.amount_milli_satoshis(),
        expires_at: invoice.expires_at().map(|d| d.as_secs()),
    })
}

/// Sats value of an invoice that carries an amount; `None` for undecodable or amount-less
/// invoices.
pub fn lightning_invoice_value(invoice: &str) -> Option<u64> {
    decode_bolt11(invoice).ok()?.amount_sats()
}
