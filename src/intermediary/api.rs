//! Intermediary HTTP API: one POST endpoint per swap direction under the intermediary's base
//! URL (`/tobtc`, `/tobtcln`, `/frombtc`, `/frombtcln`).

use std::time::Duration;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::SwapError;
use crate::swap::SwapDirection;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToBtcQuoteRequest {
    pub address: String,
    /// Sats to deliver, or token units to spend when `exact_in` is set.
    pub amount: u64,
    pub exact_in: bool,
    pub token: String,
    pub offerer: String,
    pub confirmation_target: u32,
    pub confirmations: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToBtcQuote {
    pub amount_sats: u64,
    pub swap_fee_sats: u64,
    pub network_fee_sats: u64,
    pub total_token: u64,
    pub payment_hash: String,
    pub expiry: u64,
    pub intermediary: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToBtcLnQuoteRequest {
    pub pr: String,
    pub max_fee_sats: u64,
    pub expiry_timestamp: u64,
    pub token: String,
    pub offerer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToBtcLnQuote {
    pub swap_fee_sats: u64,
    pub routing_fee_sats: u64,
    pub total_token: u64,
    pub intermediary: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FromBtcQuoteRequest {
    pub amount: u64,
    pub token: String,
    pub claimer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FromBtcQuote {
    pub btc_address: String,
    pub amount_sats: u64,
    pub swap_fee_sats: u64,
    pub total_token: u64,
    pub payment_hash: String,
    pub expiry: u64,
    pub intermediary: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FromBtcLnQuoteRequest {
    pub amount: u64,
    pub token: String,
    pub claimer: String,
    pub payment_hash: String,
    pub expiry_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FromBtcLnQuote {
    pub pr: String,
    pub swap_fee_sats: u64,
    pub total_token: u64,
    pub intermediary: String,
}

/// Failure of a single intermediary round trip.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("transport: {0}")]
    Transport(String),
    #[error("HTTP {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("malformed response: {0}")]
    Protocol(String),
}

impl ApiError {
    pub fn into_swap_error(self, url: &str) -> SwapError {
        let url = url.to_string();
        match self {
            ApiError::Transport(reason) => SwapError::Transport { url, reason },
            ApiError::Rejected { status, message } => SwapError::Rejected {
                url,
                status,
                message,
            },
            ApiError::Protocol(reason) => SwapError::IntermediaryProtocol { url, reason },
        }
    }
}

#[async_trait]
pub trait IntermediaryApi: Send + Sync {
    async fn to_btc(&self, url: &str, req: &ToBtcQuoteRequest) -> Result<ToBtcQuote, ApiError>;

    async fn to_btcln(
        &self,
        url: &str,
        req: &ToBtcLnQuoteRequest,
    ) -> Result<ToBtcLnQuote, ApiError>;

    async fn from_btc(
        &self,
        url: &str,
        req: &FromBtcQuoteRequest,
    ) -> Result<FromBtcQuote, ApiError>;

    async fn from_btcln(
        &self,
        url: &str,
        req: &FromBtcLnQuoteRequest,
    ) -> Result<FromBtcLnQuote, ApiError>;
}

#[derive(Clone)]
pub struct HttpIntermediaryApi {
    client: reqwest::Client,
}

impl HttpIntermediaryApi {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build intermediary http client")?;
        Ok(Self { client })
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    async fn post<Req, Resp>(
        &self,
        base_url: &str,
        direction: SwapDirection,
        body: &Req,
    ) -> Result<Resp, ApiError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            direction.path_segment()
        );
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ApiError::Transport(format!("POST {url}: {e}")))?;

        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ApiError::Transport(format!("read {url}: {e}")))?;

        if !status.is_success() {
            return Err(ApiError::Rejected {
                status: status.as_u16(),
                message: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        serde_json::from_slice(&bytes).map_err(|e| ApiError::Protocol(format!("decode {url}: {e}")))
    }
}

#[async_trait]
impl IntermediaryApi for HttpIntermediaryApi {
    async fn to_btc(&self, url: &str, req: &ToBtcQuoteRequest) -> Result<ToBtcQuote, ApiError> {
        self.post(url, SwapDirection::OutboundOnchain, req).await
    }

    async fn to_btcln(
        &self,
        url: &str,
        req: &ToBtcLnQuoteRequest,
    ) -> Result<ToBtcLnQuote, ApiError> {
        self.post(url, SwapDirection::OutboundLightning, req).await
    }

    async fn from_btc(
        &self,
        url: &str,
        req: &FromBtcQuoteRequest,
    ) -> Result<FromBtcQuote, ApiError> {
        self.post(url, SwapDirection::InboundOnchain, req).await
    }

    async fn from_btcln(
        &self,
        url: &str,
        req: &FromBtcLnQuoteRequest,
    ) -> Result<FromBtcLnQuote, ApiError> {
        self.post(url, SwapDirection::InboundLightning, req).await
    }
}
