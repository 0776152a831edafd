use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::bounds::AmountBounds;
use super::request::SwapRequest;
use super::state::classify;
use super::store::SwapStorage;
use super::{SwapDirection, SwapRecord, SwapStatus, unix_now};
use crate::chain::{ChainAdapter, EscrowEvent, EscrowEventKind};
use crate::error::SwapError;
use crate::intermediary::api::IntermediaryApi;
use crate::intermediary::{FeeSchedule, Intermediary};
use crate::pricing::PriceCheck;

/// The intermediary a wrapper negotiates with, plus what it promised up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiationTarget {
    pub url: String,
    /// Advertised settlement address; unknown for a fixed intermediary URL.
    pub address: Option<String>,
    /// Fee ceiling from the advertisement; unknown for a fixed intermediary URL.
    pub fee: Option<FeeSchedule>,
    pub bounds: AmountBounds,
}

impl NegotiationTarget {
    pub fn fixed(url: impl Into<String>, bounds: AmountBounds) -> Self {
        Self {
            url: url.into(),
            address: None,
            fee: None,
            bounds,
        }
    }

    /// `None` if the candidate does not serve `direction`.
    pub fn from_candidate(candidate: &Intermediary, direction: SwapDirection) -> Option<Self> {
        let svc = candidate.service(direction)?;
        Some(Self {
            url: candidate.url.clone(),
            address: Some(candidate.address.clone()),
            fee: Some(svc.fee),
            bounds: svc.bounds(),
        })
    }

    pub(crate) fn protocol(&self, reason: impl Into<String>) -> SwapError {
        SwapError::protocol(&self.url, reason)
    }

    /// Checks shared by every direction: bounds, fee ceiling, counterpart, expiry.
    pub(crate) fn verify_terms(
        &self,
        amount_sats: u64,
        swap_fee_sats: u64,
        counterpart: &str,
        expiry: u64,
    ) -> Result<(), SwapError> {
        if !self.bounds.contains(amount_sats) {
            return Err(self.protocol(format!(
                "amount {amount_sats} outside advertised bounds [{}, {}]",
                self.bounds.min, self.bounds.max
            )));
        }
        if let Some(fee) = self.fee
            && swap_fee_sats > fee.fee_for(amount_sats)
        {
            return Err(self.protocol(format!(
                "swap fee {swap_fee_sats} exceeds advertised {}",
                fee.fee_for(amount_sats)
            )));
        }
        if counterpart.trim().is_empty() {
            return Err(self.protocol("missing intermediary address"));
        }
        if let Some(address) = &self.address
            && !address.eq_ignore_ascii_case(counterpart)
        {
            return Err(self.protocol(format!(
                "intermediary address {counterpart} differs from advertised {address}"
            )));
        }
        if expiry <= unix_now() {
            return Err(self.protocol(format!("expiry {expiry} already passed")));
        }
        Ok(())
    }

    pub(crate) fn verify_payment_hash(&self, payment_hash: &str) -> Result<(), SwapError> {
        match hex::decode(payment_hash) {
            Ok(bytes) if bytes.len() == 32 => Ok(()),
            _ => Err(self.protocol(format!("invalid payment hash {payment_hash}"))),
        }
    }

    pub(crate) fn verify_price(&self, valid: anyhow::Result<bool>) -> Result<(), SwapError> {
        match valid {
            Ok(true) => Ok(()),
            Ok(false) => Err(self.protocol("quoted token amount outside price tolerance")),
            Err(e) => Err(SwapError::Pricing(e)),
        }
    }
}

/// Collaborators every wrapper negotiates through.
#[derive(Clone)]
pub struct Negotiation {
    pub api: Arc<dyn IntermediaryApi>,
    pub pricing: Option<PriceCheck>,
    pub bitcoin_network: bitcoin::Network,
}

/// One swap direction: creation, persistence and lifecycle classification.
#[async_trait]
pub trait SwapWrapper: Send + Sync {
    fn core(&self) -> &WrapperCore;

    fn core_mut(&mut self) -> &mut WrapperCore;

    /// Negotiates with `target` and persists the resulting record in state `Created`.
    async fn create(
        &self,
        request: &SwapRequest,
        target: &NegotiationTarget,
    ) -> Result<SwapRecord, SwapError>;

    fn direction(&self) -> SwapDirection {
        self.core().direction()
    }

    async fn init(&mut self) -> Result<(), SwapError> {
        self.core_mut().init().await
    }

    async fn stop(&mut self) -> Result<(), SwapError> {
        self.core_mut().stop();
        Ok(())
    }

    fn all_swaps_cached(&self) -> Result<Vec<SwapRecord>, SwapError> {
        self.core().cached(|_| true)
    }

    async fn all_swaps(&self) -> Result<Vec<SwapRecord>, SwapError> {
        self.core().revalidated(|_| true).await
    }

    fn refundable_swaps_cached(&self) -> Result<Vec<SwapRecord>, SwapError> {
        let outbound = self.direction().is_outbound();
        self.core()
            .cached(|r| outbound && r.status == SwapStatus::Refundable)
    }

    async fn refundable_swaps(&self) -> Result<Vec<SwapRecord>, SwapError> {
        let outbound = self.direction().is_outbound();
        self.core()
            .revalidated(|r| outbound && r.status == SwapStatus::Refundable)
            .await
    }

    fn claimable_swaps_cached(&self) -> Result<Vec<SwapRecord>, SwapError> {
        let inbound = !self.direction().is_outbound();
        self.core().cached(|r| inbound && r.status == SwapStatus::Locked)
    }

    async fn claimable_swaps(&self) -> Result<Vec<SwapRecord>, SwapError> {
        let inbound = !self.direction().is_outbound();
        self.core()
            .revalidated(|r| inbound && r.status == SwapStatus::Locked)
            .await
    }

    /// Refundable swaps for outbound directions, claimable swaps for inbound ones.
    fn actionable_swaps_cached(&self) -> Result<Vec<SwapRecord>, SwapError> {
        if self.direction().is_outbound() {
            self.refundable_swaps_cached()
        } else {
            self.claimable_swaps_cached()
        }
    }

    async fn actionable_swaps(&self) -> Result<Vec<SwapRecord>, SwapError> {
        if self.direction().is_outbound() {
            self.refundable_swaps().await
        } else {
            self.claimable_swaps().await
        }
    }
}

type SharedStore = Arc<Mutex<Box<dyn SwapStorage>>>;
type SharedCache = Arc<Mutex<Vec<SwapRecord>>>;

/// Storage, cache and event subscription shared by the four wrappers.
pub struct WrapperCore {
    direction: SwapDirection,
    chain: Arc<dyn ChainAdapter>,
    store: SharedStore,
    cache: SharedCache,
    events: Option<JoinHandle<()>>,
}

impl WrapperCore {
    pub fn new(
        direction: SwapDirection,
        store: Box<dyn SwapStorage>,
        chain: Arc<dyn ChainAdapter>,
    ) -> Self {
        Self {
            direction,
            chain,
            store: Arc::new(Mutex::new(store)),
            cache: Arc::new(Mutex::new(Vec::new())),
            events: None,
        }
    }

    pub fn direction(&self) -> SwapDirection {
        self.direction
    }

    pub fn chain(&self) -> &Arc<dyn ChainAdapter> {
        &self.chain
    }

    pub fn is_running(&self) -> bool {
        self.events.is_some()
    }

    /// Loads persisted records and starts consuming escrow events. No-op when running.
    pub async fn init(&mut self) -> Result<(), SwapError> {
        if self.is_running() {
            return Ok(());
        }

        let records = self
            .store
            .lock()
            .expect("store mutex poisoned")
            .list()
            .map_err(SwapError::Storage)?;
        tracing::info!(direction = %self.direction, swaps = records.len(), "loaded swaps");
        *self.cache.lock().expect("cache mutex poisoned") = records;

        let rx = self
            .chain
            .subscribe(self.direction)
            .await
            .map_err(SwapError::Chain)?;
        self.events = Some(tokio::spawn(consume_events(
            self.direction,
            rx,
            self.store.clone(),
            self.cache.clone(),
        )));
        Ok(())
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.events.take() {
            handle.abort();
            tracing::info!(direction = %self.direction, "stopped listening for escrow events");
        }
    }

    pub fn ensure_running(&self) -> Result<(), SwapError> {
        if self.is_running() {
            Ok(())
        } else {
            Err(SwapError::NotRunning)
        }
    }

    pub fn persist(&self, record: &SwapRecord) -> Result<(), SwapError> {
        self.store
            .lock()
            .expect("store mutex poisoned")
            .save(record)
            .map_err(SwapError::Storage)?;
        let mut cache = self.cache.lock().expect("cache mutex poisoned");
        match cache.iter_mut().find(|r| r.swap_id == record.swap_id) {
            Some(existing) => *existing = record.clone(),
            None => cache.push(record.clone()),
        }
        Ok(())
    }

    /// Cached records classified by the local clock only.
    pub fn cached(&self, filter: impl Fn(&SwapRecord) -> bool) -> Result<Vec<SwapRecord>, SwapError> {
        self.ensure_running()?;
        let now = unix_now();
        let direction = self.direction;
        let cache = self.cache.lock().expect("cache mutex poisoned");
        Ok(cache
            .iter()
            .map(|r| SwapRecord {
                status: classify(direction, r.status, None, r.expiry, now),
                ..r.clone()
            })
            .filter(|r| filter(r))
            .collect())
    }

    /// Records re-classified against the chain; changed statuses are persisted.
    pub async fn revalidated(
        &self,
        filter: impl Fn(&SwapRecord) -> bool + Send,
    ) -> Result<Vec<SwapRecord>, SwapError> {
        self.ensure_running()?;
        let snapshot = self.cache.lock().expect("cache mutex poisoned").clone();

        let mut out = Vec::with_capacity(snapshot.len());
        for mut record in snapshot {
            if !record.status.is_terminal() {
                let escrow = match self.chain.escrow_state(&record).await {
                    Ok(state) => Some(state),
                    Err(err) => {
                        tracing::warn!(
                            swap_id = %record.swap_id,
                            error = %format!("{err:#}"),
                            "escrow state unavailable, classifying by clock"
                        );
                        None
                    }
                };
                let status =
                    classify(self.direction, record.status, escrow, record.expiry, unix_now());
                if status != record.status {
                    set_status(&self.store, &self.cache, &record.swap_id, status)
                        .map_err(SwapError::Storage)?;
                    record.status = status;
                }
            }
            if filter(&record) {
                out.push(record);
            }
        }
        Ok(out)
    }
}

impl Drop for WrapperCore {
    fn drop(&mut self) {
        self.stop();
    }
}

fn set_status(
    store: &SharedStore,
    cache: &SharedCache,
    swap_id: &str,
    status: SwapStatus,
) -> anyhow::Result<()> {
    store
        .lock()
        .expect("store mutex poisoned")
        .update_status(swap_id, status)?;
    if let Some(record) = cache
        .lock()
        .expect("cache mutex poisoned")
        .iter_mut()
        .find(|r| r.swap_id == swap_id)
    {
        record.status = status;
    }
    Ok(())
}

async fn consume_events(
    direction: SwapDirection,
    mut rx: mpsc::Receiver<EscrowEvent>,
    store: SharedStore,
    cache: SharedCache,
) {
    while let Some(event) = rx.recv().await {
        let current = cache
            .lock()
            .expect("cache mutex poisoned")
            .iter()
            .find(|r| r.escrow_handle.eq_ignore_ascii_case(&event.escrow_handle))
            .map(|r| (r.swap_id.clone(), r.status));
        let Some((swap_id, status)) = current else {
            continue;
        };
        if status.is_terminal() {
            continue;
        }

        let next = match event.kind {
            EscrowEventKind::Initialized if status == SwapStatus::Created => SwapStatus::Locked,
            EscrowEventKind::Initialized => continue,
            EscrowEventKind::Claimed => SwapStatus::Claimed,
            EscrowEventKind::Refunded => SwapStatus::Refunded,
        };

        match set_status(&store, &cache, &swap_id, next) {
            Ok(()) => tracing::debug!(%direction, %swap_id, status = %next, "applied escrow event"),
            Err(err) => tracing::warn!(
                %direction,
                %swap_id,
                error = %format!("{err:#}"),
                "failed to apply escrow event"
            ),
        }
    }
    tracing::debug!(%direction, "escrow event stream closed");
}
