use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use evm_btc_swapper::chain::{ChainAdapter, EscrowEvent, EscrowState};
use evm_btc_swapper::intermediary::api::{
    ApiError, FromBtcLnQuote, FromBtcLnQuoteRequest, FromBtcQuote, FromBtcQuoteRequest,
    IntermediaryApi, ToBtcLnQuote, ToBtcLnQuoteRequest, ToBtcQuote, ToBtcQuoteRequest,
};
use evm_btc_swapper::intermediary::registry::IntermediarySource;
use evm_btc_swapper::intermediary::{FeeSchedule, Intermediary, ServiceInfo};
use evm_btc_swapper::lightning::invoice::lightning_invoice_value;
use evm_btc_swapper::swap::{FeeTerms, SwapDirection, SwapRecord, SwapStatus};
use tokio::sync::mpsc;

use super::invoice::make_invoice;

pub const TOKEN: &str = "0xusdc";
pub const SIGNER: &str = "0xuser";
/// BIP173 testnet P2WSH vector.
pub const TESTNET_ADDRESS: &str = "tb1qrp33g0q5c5txsp9arysrx4k6zdkfs4nce4xj0gdcccefvpysxf3q0sl5k7";
/// BIP173 mainnet P2WPKH vector.
pub const MAINNET_ADDRESS: &str = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";

pub fn now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

pub fn lp_address(url: &str) -> String {
    format!("0xlp:{}", url.trim_end_matches('/'))
}

/// Intermediary serving every direction with the same fee schedule and bounds.
pub fn intermediary(url: &str, base_fee_sats: u64, min_sats: u64, max_sats: u64) -> Intermediary {
    let svc = ServiceInfo {
        fee: FeeSchedule {
            base_fee_sats,
            fee_ppm: 0,
        },
        min_sats,
        max_sats,
    };
    Intermediary {
        url: url.to_string(),
        address: lp_address(url),
        tokens: vec![TOKEN.to_string()],
        services: SwapDirection::ALL.into_iter().map(|d| (d, svc)).collect::<BTreeMap<_, _>>(),
    }
}

pub fn record(swap_id: &str, direction: SwapDirection, status: SwapStatus, expiry: u64) -> SwapRecord {
    SwapRecord {
        swap_id: swap_id.to_string(),
        direction,
        intermediary_url: "https://lp.example".to_string(),
        counterpart_address: lp_address("https://lp.example"),
        token: TOKEN.to_string(),
        escrow_handle: format!("{:0>64}", hex::encode(swap_id.as_bytes())),
        btc_address: None,
        bolt11_invoice: None,
        secret_hex: None,
        amount_sats: 50_000,
        token_amount: 50_000,
        fee: FeeTerms::default(),
        expiry,
        created_at: now(),
        status,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behaviour {
    Honest,
    /// Well-formed quote with a swap fee far above any advertised ceiling.
    Overcharge,
    /// Honest amounts but a token total twice the fair price.
    Overprice,
    Protocol,
    Transport,
    Rejected,
    /// Never answers.
    Hang,
    /// Quoted sats (or exact-in token input) one off from the request.
    AmountMismatch,
    /// Quoted sats far above every advertised maximum.
    OutsideBounds,
    /// Escrow handle that is not 32 bytes of hex.
    MalformedHash,
    /// Counterpart address other than the advertised one.
    ForeignCounterpart,
    MissingCounterpart,
    ExpiredQuote,
    /// Inbound on-chain quote expiring before a deposit could confirm.
    ShortDepositWindow,
    /// Mainnet deposit address for a testnet swapper.
    MainnetDeposit,
    /// Routing fee one sat above the requested ceiling.
    RoutingFeeAboveCeiling,
    /// Inbound lightning invoice for some other payment hash.
    ForeignInvoiceHash,
    /// Inbound lightning invoice for one sat more than requested.
    InvoiceAmountMismatch,
    AmountlessInvoice,
}

/// Intermediary API scripted per base URL. Quotes are priced at 1 token unit per sat.
#[derive(Default)]
pub struct ScriptedApi {
    behaviours: Mutex<HashMap<String, Behaviour>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, url: &str, behaviour: Behaviour) -> Self {
        self.set(url, behaviour);
        self
    }

    pub fn set(&self, url: &str, behaviour: Behaviour) {
        self.behaviours
            .lock()
            .expect("behaviours mutex poisoned")
            .insert(url.to_string(), behaviour);
    }

    /// URLs contacted, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls mutex poisoned").clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("calls mutex poisoned").len()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls().iter().filter(|u| *u == url).count()
    }

    async fn enter(&self, url: &str) -> Result<Behaviour, ApiError> {
        self.calls
            .lock()
            .expect("calls mutex poisoned")
            .push(url.to_string());
        let behaviour = self
            .behaviours
            .lock()
            .expect("behaviours mutex poisoned")
            .get(url)
            .copied()
            .unwrap_or(Behaviour::Honest);
        match behaviour {
            Behaviour::Protocol => Err(ApiError::Protocol("garbled body".to_string())),
            Behaviour::Transport => Err(ApiError::Transport("connection refused".to_string())),
            Behaviour::Rejected => Err(ApiError::Rejected {
                status: 400,
                message: "amount not supported".to_string(),
            }),
            Behaviour::Hang => std::future::pending().await,
            other => Ok(other),
        }
    }
}

fn swap_fee(behaviour: Behaviour) -> u64 {
    if behaviour == Behaviour::Overcharge {
        1_000_000
    } else {
        0
    }
}

fn price_factor(behaviour: Behaviour) -> u64 {
    if behaviour == Behaviour::Overprice { 2 } else { 1 }
}

const PAYMENT_HASH: &str = "0101010101010101010101010101010101010101010101010101010101010101";

fn payment_hash(behaviour: Behaviour) -> String {
    match behaviour {
        Behaviour::MalformedHash => "zz".to_string(),
        _ => PAYMENT_HASH.to_string(),
    }
}

fn expiry(behaviour: Behaviour) -> u64 {
    match behaviour {
        Behaviour::ExpiredQuote => now().saturating_sub(1),
        Behaviour::ShortDepositWindow => now() + 3600,
        _ => now() + 24 * 3600,
    }
}

fn counterpart(url: &str, behaviour: Behaviour) -> String {
    match behaviour {
        Behaviour::ForeignCounterpart => lp_address("https://mallory.example"),
        Behaviour::MissingCounterpart => String::new(),
        _ => lp_address(url),
    }
}

#[async_trait]
impl IntermediaryApi for ScriptedApi {
    async fn to_btc(&self, url: &str, req: &ToBtcQuoteRequest) -> Result<ToBtcQuote, ApiError> {
        let b = self.enter(url).await?;
        let fee = swap_fee(b);
        let network_fee = 5;
        let (mut amount_sats, mut total_token) = if req.exact_in {
            (req.amount.saturating_sub(fee + network_fee), req.amount)
        } else {
            (req.amount, req.amount + fee + network_fee)
        };
        match b {
            Behaviour::AmountMismatch if req.exact_in => total_token += 1,
            Behaviour::AmountMismatch => amount_sats += 1,
            Behaviour::OutsideBounds => amount_sats = 10_000_000,
            _ => {}
        }
        Ok(ToBtcQuote {
            amount_sats,
            swap_fee_sats: fee,
            network_fee_sats: network_fee,
            total_token: total_token * price_factor(b),
            payment_hash: payment_hash(b),
            expiry: expiry(b),
            intermediary: counterpart(url, b),
        })
    }

    async fn to_btcln(
        &self,
        url: &str,
        req: &ToBtcLnQuoteRequest,
    ) -> Result<ToBtcLnQuote, ApiError> {
        let b = self.enter(url).await?;
        let amount = lightning_invoice_value(&req.pr)
            .ok_or_else(|| ApiError::Protocol("amount-less invoice".to_string()))?;
        let fee = swap_fee(b);
        let routing = if b == Behaviour::RoutingFeeAboveCeiling {
            req.max_fee_sats + 1
        } else {
            req.max_fee_sats.min(3)
        };
        Ok(ToBtcLnQuote {
            swap_fee_sats: fee,
            routing_fee_sats: routing,
            total_token: (amount + fee + routing) * price_factor(b),
            intermediary: counterpart(url, b),
        })
    }

    async fn from_btc(
        &self,
        url: &str,
        req: &FromBtcQuoteRequest,
    ) -> Result<FromBtcQuote, ApiError> {
        let b = self.enter(url).await?;
        let fee = swap_fee(b);
        let amount_sats = match b {
            Behaviour::AmountMismatch => req.amount + 1,
            _ => req.amount,
        };
        let btc_address = match b {
            Behaviour::MainnetDeposit => MAINNET_ADDRESS,
            _ => TESTNET_ADDRESS,
        };
        Ok(FromBtcQuote {
            btc_address: btc_address.to_string(),
            amount_sats,
            swap_fee_sats: fee,
            total_token: req.amount.saturating_sub(fee) / price_factor(b),
            payment_hash: payment_hash(b),
            expiry: expiry(b),
            intermediary: counterpart(url, b),
        })
    }

    async fn from_btcln(
        &self,
        url: &str,
        req: &FromBtcLnQuoteRequest,
    ) -> Result<FromBtcLnQuote, ApiError> {
        let b = self.enter(url).await?;
        let mut hash = [0u8; 32];
        hex::decode_to_slice(&req.payment_hash, &mut hash)
            .map_err(|e| ApiError::Protocol(e.to_string()))?;
        if b == Behaviour::ForeignInvoiceHash {
            hash = [7; 32];
        }
        let amount_msat = match b {
            Behaviour::InvoiceAmountMismatch => Some((req.amount + 1) * 1000),
            Behaviour::AmountlessInvoice => None,
            _ => Some(req.amount * 1000),
        };
        let pr = make_invoice(hash, amount_msat).map_err(|e| ApiError::Protocol(format!("{e:#}")))?;
        Ok(FromBtcLnQuote {
            pr,
            swap_fee_sats: swap_fee(b),
            total_token: req.amount / price_factor(b),
            intermediary: counterpart(url, b),
        })
    }
}

/// Candidate source that counts fetches.
#[derive(Default)]
pub struct CountingSource {
    intermediaries: Mutex<Vec<Intermediary>>,
    fetches: AtomicUsize,
}

impl CountingSource {
    pub fn new(intermediaries: Vec<Intermediary>) -> Self {
        Self {
            intermediaries: Mutex::new(intermediaries),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn replace(&self, intermediaries: Vec<Intermediary>) {
        *self.intermediaries.lock().expect("source mutex poisoned") = intermediaries;
    }
}

#[async_trait]
impl IntermediarySource for CountingSource {
    async fn fetch(&self) -> Result<Vec<Intermediary>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.intermediaries.lock().expect("source mutex poisoned").clone())
    }
}

/// Chain adapter backed by in-memory escrow states and test-driven event channels.
#[derive(Default)]
pub struct MockChain {
    senders: Mutex<HashMap<SwapDirection, mpsc::Sender<EscrowEvent>>>,
    states: Mutex<HashMap<String, EscrowState>>,
    failing_queries: Mutex<bool>,
    failing_subscription: Mutex<Option<SwapDirection>>,
    allowance: AtomicU64,
    actions: Mutex<Vec<(String, String)>>,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn emit(&self, direction: SwapDirection, event: EscrowEvent) -> Result<()> {
        let sender = self
            .senders
            .lock()
            .expect("senders mutex poisoned")
            .get(&direction)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no subscriber for {direction}"))?;
        sender
            .send(event)
            .await
            .map_err(|_| anyhow::anyhow!("{direction} subscriber gone"))
    }

    pub fn set_state(&self, escrow_handle: &str, state: EscrowState) {
        self.states
            .lock()
            .expect("states mutex poisoned")
            .insert(escrow_handle.to_string(), state);
    }

    pub fn fail_queries(&self, fail: bool) {
        *self.failing_queries.lock().expect("flag mutex poisoned") = fail;
    }

    /// Makes `subscribe` fail for `direction`.
    pub fn fail_subscription(&self, direction: SwapDirection) {
        *self.failing_subscription.lock().expect("flag mutex poisoned") = Some(direction);
    }

    pub fn set_allowance(&self, allowance: u64) {
        self.allowance.store(allowance, Ordering::SeqCst);
    }

    /// `(action, swap_id)` pairs, in call order.
    pub fn actions(&self) -> Vec<(String, String)> {
        self.actions.lock().expect("actions mutex poisoned").clone()
    }

    fn act(&self, action: &str, swap: &SwapRecord) -> Result<String> {
        self.actions
            .lock()
            .expect("actions mutex poisoned")
            .push((action.to_string(), swap.swap_id.clone()));
        Ok(format!("0xtx:{action}:{}", swap.swap_id))
    }
}

#[async_trait]
impl ChainAdapter for MockChain {
    fn signer_address(&self) -> String {
        SIGNER.to_string()
    }

    async fn subscribe(&self, direction: SwapDirection) -> Result<mpsc::Receiver<EscrowEvent>> {
        if *self.failing_subscription.lock().expect("flag mutex poisoned") == Some(direction) {
            anyhow::bail!("{direction} event filter rejected");
        }
        let (tx, rx) = mpsc::channel(16);
        self.senders
            .lock()
            .expect("senders mutex poisoned")
            .insert(direction, tx);
        Ok(rx)
    }

    async fn escrow_state(&self, swap: &SwapRecord) -> Result<EscrowState> {
        if *self.failing_queries.lock().expect("flag mutex poisoned") {
            anyhow::bail!("rpc unavailable");
        }
        Ok(self
            .states
            .lock()
            .expect("states mutex poisoned")
            .get(&swap.escrow_handle)
            .copied()
            .unwrap_or(EscrowState::NotCommitted))
    }

    async fn allowance(&self, _swap: &SwapRecord) -> Result<u64> {
        Ok(self.allowance.load(Ordering::SeqCst))
    }

    async fn approve_spend(&self, swap: &SwapRecord) -> Result<String> {
        self.act("approve", swap)
    }

    async fn create_escrow(&self, swap: &SwapRecord) -> Result<String> {
        self.act("commit", swap)
    }

    async fn claim(&self, swap: &SwapRecord) -> Result<String> {
        self.act("claim", swap)
    }

    async fn refund(&self, swap: &SwapRecord) -> Result<String> {
        self.act("refund", swap)
    }
}
