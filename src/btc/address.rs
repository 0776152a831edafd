use std::str::FromStr as _;

use anyhow::{Context as _, Result};
use bitcoin::{Address, Network};

/// Parses `address` and checks it belongs to `network`.
pub fn parse_address(address: &str, network: Network) -> Result<Address> {
    let unchecked = Address::from_str(address.trim())
        .with_context(|| format!("parse bitcoin address {address}"))?;
    unchecked
        .require_network(network)
        .with_context(|| format!("address {address} is not valid on {network}"))
}

pub fn is_valid_address(address: &str, network: Network) -> bool {
    parse_address(address, network).is_ok()
}
