use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use bitcoin::Network;
use clap::{Parser as _, Subcommand};
use evm_btc_swapper::btc::address::parse_address;
use evm_btc_swapper::config::{ChainPreset, DEFAULT_REQUEST_TIMEOUT};
use evm_btc_swapper::intermediary::api::HttpIntermediaryApi;
use evm_btc_swapper::intermediary::directory::IntermediaryDirectory;
use evm_btc_swapper::intermediary::registry::HttpRegistry;
use evm_btc_swapper::lightning::invoice::decode_bolt11;
use evm_btc_swapper::swap::SwapDirection;
use evm_btc_swapper::swap::bounds::BoundsRegistry;
use evm_btc_swapper::swap::state::classify;
use evm_btc_swapper::swap::store::{SqliteSwapStore, SwapStorage as _};
use serde_json::json;

#[derive(Debug, clap::Parser)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Effective min/max per direction.
    Bounds {
        #[arg(long)]
        registry_url: Option<String>,
    },
    Candidates {
        #[arg(long)]
        registry_url: String,

        /// tobtc, tobtcln, frombtc or frombtcln.
        #[arg(long)]
        direction: String,

        #[arg(long)]
        token: String,

        #[arg(long)]
        amount_sats: Option<u64>,
    },
    /// Persisted swaps, classified by the local clock.
    Swaps {
        #[arg(long)]
        storage_dir: PathBuf,

        #[arg(long)]
        direction: Option<String>,
    },
    DecodeInvoice {
        #[arg(long)]
        invoice: String,
    },
    ValidateAddress {
        #[arg(long)]
        address: String,

        #[arg(long, default_value = "testnet")]
        network: String,
    },
    Preset {
        #[arg(long)]
        chain: String,
    },
}

async fn load_directory(registry_url: &str) -> Result<IntermediaryDirectory> {
    let http = HttpIntermediaryApi::new(DEFAULT_REQUEST_TIMEOUT)?;
    let registry = HttpRegistry::new(http.client().clone(), registry_url);
    let directory = IntermediaryDirectory::new(Arc::new(registry));
    directory.init().await.context("load intermediary registry")?;
    Ok(directory)
}

#[tokio::main]
async fn main() -> Result<()> {
    evm_btc_swapper::logging::init().ok();
    let args = Args::parse();

    let out = match args.command {
        Command::Bounds { registry_url } => {
            let directory = match registry_url {
                Some(url) => Some(load_directory(&url).await?),
                None => None,
            };
            let bounds = BoundsRegistry::new(directory.as_ref());
            let entries: Vec<_> = SwapDirection::ALL
                .into_iter()
                .map(|d| {
                    let b = bounds.bounds(d);
                    json!({ "direction": d, "min_sats": b.min, "max_sats": b.max })
                })
                .collect();
            json!(entries)
        }
        Command::Candidates {
            registry_url,
            direction,
            token,
            amount_sats,
        } => {
            let direction: SwapDirection = direction.parse()?;
            let directory = load_directory(&registry_url).await?;
            let candidates = directory.candidates(direction, amount_sats, &token);
            json!(candidates
                .iter()
                .map(|lp| {
                    let svc = lp.service(direction);
                    json!({
                      "url": lp.url,
                      "address": lp.address,
                      "fee": svc.map(|s| s.fee.fee_for(amount_sats.unwrap_or(s.min_sats))),
                      "min_sats": svc.map(|s| s.min_sats),
                      "max_sats": svc.map(|s| s.max_sats),
                    })
                })
                .collect::<Vec<_>>())
        }
        Command::Swaps {
            storage_dir,
            direction,
        } => {
            let directions = match direction {
                Some(d) => vec![d.parse::<SwapDirection>()?],
                None => SwapDirection::ALL.to_vec(),
            };
            let path = storage_dir.join("swaps.sqlite3");
            anyhow::ensure!(path.is_file(), "no swap store at {}", path.display());
            let now = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .context("system clock before unix epoch")?
                .as_secs();

            let mut swaps = Vec::new();
            for direction in directions {
                let store = SqliteSwapStore::open(path.clone(), direction.path_segment())
                    .with_context(|| format!("open {direction} swap store"))?;
                for record in store.list()? {
                    let status = classify(direction, record.status, None, record.expiry, now);
                    swaps.push(json!({
                      "swap_id": record.swap_id,
                      "direction": record.direction,
                      "intermediary_url": record.intermediary_url,
                      "amount_sats": record.amount_sats,
                      "token_amount": record.token_amount,
                      "expiry": record.expiry,
                      "stored_status": record.status,
                      "status": status,
                    }));
                }
            }
            json!(swaps)
        }
        Command::DecodeInvoice { invoice } => {
            let decoded = decode_bolt11(&invoice)?;
            json!({
              "payment_hash": decoded.payment_hash_hex(),
              "amount_msat": decoded.amount_msat,
              "amount_sats": decoded.amount_sats(),
              "expires_at": decoded.expires_at,
            })
        }
        Command::ValidateAddress { address, network } => {
            let network: Network = network
                .parse()
                .with_context(|| format!("unknown bitcoin network: {network}"))?;
            match parse_address(&address, network) {
                Ok(_) => json!({ "address": address, "network": network.to_string(), "valid": true }),
                Err(err) => json!({
                  "address": address,
                  "network": network.to_string(),
                  "valid": false,
                  "error": format!("{err:#}"),
                }),
            }
        }
        Command::Preset { chain } => {
            let preset: ChainPreset = chain.parse()?;
            let addresses = preset.addresses();
            json!({
              "chain_id": preset.chain_id(),
              "bitcoin_network": preset.bitcoin_network().to_string(),
              "swap_contract": addresses.swap_contract,
              "btc_relay_contract": addresses.btc_relay_contract,
            })
        }
    };

    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
