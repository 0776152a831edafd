use std::time::Duration;

use anyhow::{Context as _, Result};
use bitcoin::hashes::{Hash as _, sha256};
use bitcoin::secp256k1::{Secp256k1, SecretKey};
use lightning_invoice::{Currency, InvoiceBuilder};
use lightning_types::payment::PaymentSecret;

/// Signed testnet BOLT11 invoice for `payment_hash`. `amount_msat` of `None` leaves the
/// amount field out.
pub fn make_invoice(payment_hash: [u8; 32], amount_msat: Option<u64>) -> Result<String> {
    let key = SecretKey::from_slice(&[0x42; 32]).context("invoice signing key")?;
    let builder = InvoiceBuilder::new(Currency::BitcoinTestnet)
        .description("swap test".to_string())
        .payment_hash(sha256::Hash::from_byte_array(payment_hash))
        .payment_secret(PaymentSecret([7; 32]))
        .current_timestamp()
        .expiry_time(Duration::from_secs(3600))
        .min_final_cltv_expiry_delta(144);

    let signer = |msg: &bitcoin::secp256k1::Message| {
        Secp256k1::new().sign_ecdsa_recoverable(msg, &key)
    };
    let invoice = match amount_msat {
        Some(msat) => builder.amount_milli_satoshis(msat).build_signed(signer),
        None => builder.build_signed(signer),
    }
    .map_err(|e| anyhow::anyhow!("build invoice: {e:?}"))?;
    Ok(invoice.to_string())
}

pub fn invoice_with_amount(amount_sats: u64) -> Result<String> {
    make_invoice(rand_hash(), Some(amount_sats * 1000))
}

pub fn invoice_without_amount() -> Result<String> {
    make_invoice(rand_hash(), None)
}

fn rand_hash() -> [u8; 32] {
    sha256::Hash::hash(uuid::Uuid::new_v4().as_bytes()).to_byte_array()
}
