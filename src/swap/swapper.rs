use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context as _;
use tokio_util::sync::CancellationToken;

use super::bounds::BoundsRegistry;
use super::from_btc::FromBtcWrapper;
use super::from_btcln::FromBtcLnWrapper;
use super::request::{SwapAmount, SwapRequest};
use super::store::{MemorySwapStore, SqliteSwapStore, SwapStorage};
use super::to_btc::ToBtcWrapper;
use super::to_btcln::ToBtcLnWrapper;
use super::wrapper::{Negotiation, NegotiationTarget, SwapWrapper, WrapperCore};
use super::{SwapDirection, SwapRecord, SwapStatus};
use crate::btc::address::parse_address;
use crate::chain::ChainAdapter;
use crate::config::SwapperOptions;
use crate::error::SwapError;
use crate::intermediary::Intermediary;
use crate::intermediary::api::{HttpIntermediaryApi, IntermediaryApi};
use crate::intermediary::directory::IntermediaryDirectory;
use crate::intermediary::registry::{HttpRegistry, IntermediarySource};
use crate::lightning::invoice::{decode_bolt11, lightning_invoice_value};
use crate::pricing::{PriceCheck, SwapPrice};

const STORE_FILE: &str = "swaps.sqlite3";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Created,
    Running,
    Stopped,
}

/// Single entry point for creating swaps and querying their lifecycle state.
pub struct Swapper {
    options: SwapperOptions,
    chain: Arc<dyn ChainAdapter>,
    directory: Option<IntermediaryDirectory>,
    /// One wrapper per direction, in [`SwapDirection::ALL`] order.
    wrappers: Vec<Box<dyn SwapWrapper>>,
    lifecycle: Lifecycle,
}

pub struct SwapperBuilder {
    options: SwapperOptions,
    chain: Arc<dyn ChainAdapter>,
    api: Option<Arc<dyn IntermediaryApi>>,
    source: Option<Arc<dyn IntermediarySource>>,
    pricing: Option<Arc<dyn SwapPrice>>,
    storage: HashMap<SwapDirection, Box<dyn SwapStorage>>,
}

impl SwapperBuilder {
    pub fn new(options: SwapperOptions, chain: Arc<dyn ChainAdapter>) -> Self {
        Self {
            options,
            chain,
            api: None,
            source: None,
            pricing: None,
            storage: HashMap::new(),
        }
    }

    pub fn intermediary_api(mut self, api: Arc<dyn IntermediaryApi>) -> Self {
        self.api = Some(api);
        self
    }

    /// Candidate source used instead of the HTTP registry.
    pub fn intermediary_source(mut self, source: Arc<dyn IntermediarySource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn pricing(mut self, price: Arc<dyn SwapPrice>) -> Self {
        self.pricing = Some(price);
        self
    }

    pub fn storage(mut self, direction: SwapDirection, store: Box<dyn SwapStorage>) -> Self {
        self.storage.insert(direction, store);
        self
    }

    pub fn build(mut self) -> anyhow::Result<Swapper> {
        let http = HttpIntermediaryApi::new(self.options.request_timeout)?;

        let directory = if self.options.intermediary_url.is_some() {
            None
        } else {
            let source: Arc<dyn IntermediarySource> = match (self.source.take(), &self.options.registry_url) {
                (Some(source), _) => source,
                (None, Some(url)) => Arc::new(HttpRegistry::new(http.client().clone(), url.clone())),
                (None, None) => anyhow::bail!(
                    "either an intermediary url, a registry url or an intermediary source is required"
                ),
            };
            Some(IntermediaryDirectory::new(source))
        };

        let negotiation = Negotiation {
            api: self
                .api
                .take()
                .unwrap_or_else(|| Arc::new(http) as Arc<dyn IntermediaryApi>),
            pricing: self
                .pricing
                .take()
                .map(|p| PriceCheck::new(p, self.options.max_price_difference_ppm)),
            bitcoin_network: self.options.bitcoin_network,
        };

        let mut wrappers: Vec<Box<dyn SwapWrapper>> = Vec::with_capacity(SwapDirection::ALL.len());
        for direction in SwapDirection::ALL {
            let store = match self.storage.remove(&direction) {
                Some(store) => store,
                None => open_default_store(&self.options, direction)?,
            };
            let core = WrapperCore::new(direction, store, self.chain.clone());
            let negotiation = negotiation.clone();
            let wrapper: Box<dyn SwapWrapper> = match direction {
                SwapDirection::OutboundOnchain => Box::new(ToBtcWrapper::new(core, negotiation)),
                SwapDirection::OutboundLightning => {
                    Box::new(ToBtcLnWrapper::new(core, negotiation))
                }
                SwapDirection::InboundOnchain => Box::new(FromBtcWrapper::new(core, negotiation)),
                SwapDirection::InboundLightning => {
                    Box::new(FromBtcLnWrapper::new(core, negotiation))
                }
            };
            wrappers.push(wrapper);
        }

        Ok(Swapper {
            options: self.options,
            chain: self.chain,
            directory,
            wrappers,
            lifecycle: Lifecycle::Created,
        })
    }
}

fn open_default_store(
    options: &SwapperOptions,
    direction: SwapDirection,
) -> anyhow::Result<Box<dyn SwapStorage>> {
    let store: Box<dyn SwapStorage> = match &options.storage_dir {
        Some(dir) => Box::new(
            SqliteSwapStore::open(dir.join(STORE_FILE), direction.path_segment())
                .with_context(|| format!("open {direction} swap store"))?,
        ),
        None => Box::new(MemorySwapStore::new()),
    };
    Ok(store)
}

impl Swapper {
    pub fn builder(options: SwapperOptions, chain: Arc<dyn ChainAdapter>) -> SwapperBuilder {
        SwapperBuilder::new(options, chain)
    }

    /// Loads persisted swaps, subscribes to escrow events and loads the intermediary
    /// directory. Must be called before any other operation.
    pub async fn init(&mut self) -> Result<(), SwapError> {
        if self.lifecycle == Lifecycle::Running {
            return Ok(());
        }
        for idx in 0..self.wrappers.len() {
            let wrapper = &mut self.wrappers[idx];
            tracing::info!(direction = %wrapper.direction(), "initializing swap wrapper");
            if let Err(err) = wrapper.init().await {
                for started in &mut self.wrappers[..idx] {
                    started.stop().await?;
                }
                return Err(err);
            }
        }
        if let Some(directory) = &self.directory
            && let Err(err) = directory.init().await
        {
            tracing::warn!(error = %format!("{err:#}"), "intermediary directory unavailable");
        }
        self.lifecycle = Lifecycle::Running;
        Ok(())
    }

    /// Stops listening for escrow events. Further operations fail with `NotRunning`.
    pub async fn stop(&mut self) -> Result<(), SwapError> {
        for wrapper in &mut self.wrappers {
            wrapper.stop().await?;
        }
        self.lifecycle = Lifecycle::Stopped;
        Ok(())
    }

    fn ensure_running(&self) -> Result<(), SwapError> {
        if self.lifecycle == Lifecycle::Running {
            Ok(())
        } else {
            Err(SwapError::NotRunning)
        }
    }

    pub fn directory(&self) -> Option<&IntermediaryDirectory> {
        self.directory.as_ref()
    }

    pub fn bounds(&self) -> BoundsRegistry<'_> {
        BoundsRegistry::new(self.directory.as_ref())
    }

    pub fn get_minimum(&self, direction: SwapDirection) -> u64 {
        self.bounds().get_minimum(direction)
    }

    pub fn get_maximum(&self, direction: SwapDirection) -> u64 {
        self.bounds().get_maximum(direction)
    }

    pub fn is_valid_bitcoin_address(&self, address: &str) -> bool {
        parse_address(address, self.options.bitcoin_network).is_ok()
    }

    /// True only for decodable invoices that carry an amount.
    pub fn is_valid_lightning_invoice(&self, invoice: &str) -> bool {
        lightning_invoice_value(invoice).is_some()
    }

    fn wrapper(&self, direction: SwapDirection) -> Result<&dyn SwapWrapper, SwapError> {
        self.wrappers
            .iter()
            .find(|w| w.direction() == direction)
            .map(|w| w.as_ref())
            .ok_or(SwapError::DirectionMismatch(direction))
    }

    /// Candidates for a swap; refreshes the directory once if none qualify.
    pub async fn swap_candidates(
        &self,
        direction: SwapDirection,
        amount_sats: Option<u64>,
        token: &str,
    ) -> Result<Vec<Intermediary>, SwapError> {
        let directory = self
            .directory
            .as_ref()
            .ok_or(SwapError::NoIntermediaryAvailable)?;

        let mut candidates = directory.candidates(direction, amount_sats, token);
        if candidates.is_empty() {
            tracing::info!(%direction, token, "no candidates, refreshing intermediary directory");
            if let Err(err) = directory.init().await {
                tracing::warn!(error = %format!("{err:#}"), "intermediary directory refresh failed");
            }
            candidates = directory.candidates(direction, amount_sats, token);
        }
        if candidates.is_empty() {
            return Err(SwapError::NoIntermediaryAvailable);
        }
        Ok(candidates)
    }

    /// Validation done before any network call. Returns the sats amount to bounds-check and
    /// filter candidates by, when the request is denominated in sats.
    fn preflight(&self, request: &SwapRequest) -> Result<Option<u64>, SwapError> {
        let amount = match request {
            SwapRequest::OutboundOnchain {
                address, amount, ..
            } => {
                parse_address(address, self.options.bitcoin_network)
                    .map_err(|e| SwapError::InvalidAddress(format!("{e:#}")))?;
                match amount {
                    SwapAmount::ExactOut(sats) => Some(*sats),
                    SwapAmount::ExactIn(_) => None,
                }
            }
            SwapRequest::OutboundLightning { invoice, .. } => {
                let decoded = decode_bolt11(invoice)
                    .map_err(|e| SwapError::InvalidInvoice(format!("{e:#}")))?;
                let sats = decoded
                    .amount_sats()
                    .ok_or_else(|| SwapError::InvalidInvoice("invoice has no amount".to_string()))?;
                Some(sats)
            }
            SwapRequest::InboundOnchain { amount, .. }
            | SwapRequest::InboundLightning { amount, .. } => Some(*amount),
        };

        if let Some(sats) = amount {
            let direction = request.direction();
            self.bounds().bounds(direction).check(direction, sats)?;
        }
        Ok(amount)
    }

    pub async fn create_swap(&self, request: SwapRequest) -> Result<SwapRecord, SwapError> {
        self.create_swap_cancellable(request, CancellationToken::new())
            .await
    }

    /// Creates a swap, failing over across candidates until one succeeds. Candidates are tried
    /// strictly one after another; `cancel` aborts between and during attempts.
    pub async fn create_swap_cancellable(
        &self,
        request: SwapRequest,
        cancel: CancellationToken,
    ) -> Result<SwapRecord, SwapError> {
        self.ensure_running()?;
        let direction = request.direction();
        let amount_sats = self.preflight(&request)?;
        let wrapper = self.wrapper(direction)?;

        if let Some(url) = &self.options.intermediary_url {
            let target = NegotiationTarget::fixed(url.clone(), self.bounds().bounds(direction));
            return tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(SwapError::Cancelled),
                res = wrapper.create(&request, &target) => res,
            };
        }

        let candidates = self
            .swap_candidates(direction, amount_sats, request.token())
            .await?;

        let mut last_error = None;
        for candidate in &candidates {
            if cancel.is_cancelled() {
                return Err(SwapError::Cancelled);
            }
            let Some(target) = NegotiationTarget::from_candidate(candidate, direction) else {
                continue;
            };

            tracing::debug!(%direction, url = %candidate.url, "trying intermediary");
            let attempt = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SwapError::Cancelled),
                res = wrapper.create(&request, &target) => res,
            };

            match attempt {
                Ok(record) => return Ok(record),
                Err(err) => {
                    tracing::warn!(
                        %direction,
                        url = %candidate.url,
                        error = %err,
                        "intermediary attempt failed"
                    );
                    if err.is_intermediary_fault()
                        && let Some(directory) = &self.directory
                    {
                        directory.remove_intermediary(candidate);
                    }
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or(SwapError::NoIntermediaryAvailable))
    }

    pub async fn get_all_swaps(&self) -> Result<Vec<SwapRecord>, SwapError> {
        self.ensure_running()?;
        let mut out = Vec::new();
        for wrapper in &self.wrappers {
            out.extend(wrapper.all_swaps().await?);
        }
        Ok(out)
    }

    pub fn get_all_swaps_sync(&self) -> Result<Vec<SwapRecord>, SwapError> {
        self.ensure_running()?;
        let mut out = Vec::new();
        for wrapper in &self.wrappers {
            out.extend(wrapper.all_swaps_cached()?);
        }
        Ok(out)
    }

    /// Swaps awaiting a user action: refunds for outbound, claims for inbound.
    pub async fn get_actionable_swaps(&self) -> Result<Vec<SwapRecord>, SwapError> {
        self.ensure_running()?;
        let mut out = Vec::new();
        for wrapper in &self.wrappers {
            out.extend(wrapper.actionable_swaps().await?);
        }
        Ok(out)
    }

    pub fn get_actionable_swaps_sync(&self) -> Result<Vec<SwapRecord>, SwapError> {
        self.ensure_running()?;
        let mut out = Vec::new();
        for wrapper in &self.wrappers {
            out.extend(wrapper.actionable_swaps_cached()?);
        }
        Ok(out)
    }

    pub async fn get_refundable_swaps(&self) -> Result<Vec<SwapRecord>, SwapError> {
        self.ensure_running()?;
        let mut out = Vec::new();
        for wrapper in self.wrappers.iter().filter(|w| w.direction().is_outbound()) {
            out.extend(wrapper.refundable_swaps().await?);
        }
        Ok(out)
    }

    pub fn get_refundable_swaps_sync(&self) -> Result<Vec<SwapRecord>, SwapError> {
        self.ensure_running()?;
        let mut out = Vec::new();
        for wrapper in self.wrappers.iter().filter(|w| w.direction().is_outbound()) {
            out.extend(wrapper.refundable_swaps_cached()?);
        }
        Ok(out)
    }

    pub async fn get_claimable_swaps(&self) -> Result<Vec<SwapRecord>, SwapError> {
        self.ensure_running()?;
        let mut out = Vec::new();
        for wrapper in self.wrappers.iter().filter(|w| !w.direction().is_outbound()) {
            out.extend(wrapper.claimable_swaps().await?);
        }
        Ok(out)
    }

    pub fn get_claimable_swaps_sync(&self) -> Result<Vec<SwapRecord>, SwapError> {
        self.ensure_running()?;
        let mut out = Vec::new();
        for wrapper in self.wrappers.iter().filter(|w| !w.direction().is_outbound()) {
            out.extend(wrapper.claimable_swaps_cached()?);
        }
        Ok(out)
    }

    /// Whether the escrow contract needs a token approval before `swap` can be committed.
    pub async fn is_approve_required(&self, swap: &SwapRecord) -> Result<bool, SwapError> {
        self.ensure_running()?;
        let allowance = self.chain.allowance(swap).await.map_err(SwapError::Chain)?;
        Ok(allowance < swap.token_amount)
    }

    pub async fn approve_spend(&self, swap: &SwapRecord) -> Result<String, SwapError> {
        self.ensure_running()?;
        self.chain.approve_spend(swap).await.map_err(SwapError::Chain)
    }

    /// Locks the user's tokens for an outbound swap.
    pub async fn commit_swap(&self, swap: &SwapRecord) -> Result<String, SwapError> {
        self.ensure_running()?;
        require_state(swap, swap.direction.is_outbound(), SwapStatus::Created, "commit")?;
        self.chain.create_escrow(swap).await.map_err(SwapError::Chain)
    }

    pub async fn claim_swap(&self, swap: &SwapRecord) -> Result<String, SwapError> {
        self.ensure_running()?;
        require_state(swap, !swap.direction.is_outbound(), SwapStatus::Locked, "claim")?;
        self.chain.claim(swap).await.map_err(SwapError::Chain)
    }

    pub async fn refund_swap(&self, swap: &SwapRecord) -> Result<String, SwapError> {
        self.ensure_running()?;
        require_state(swap, swap.direction.is_outbound(), SwapStatus::Refundable, "refund")?;
        self.chain.refund(swap).await.map_err(SwapError::Chain)
    }
}

fn require_state(
    swap: &SwapRecord,
    direction_ok: bool,
    status: SwapStatus,
    action: &'static str,
) -> Result<(), SwapError> {
    if direction_ok && swap.status == status {
        return Ok(());
    }
    Err(SwapError::NotActionable {
        swap_id: swap.swap_id.clone(),
        status: swap.status,
        action,
    })
}
