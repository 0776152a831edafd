//! Account-chain adapter boundary.
//!
//! Escrow creation, claims, refunds and token approvals are executed by an adapter owned by
//! the embedding application; this crate only decides when to call it and how to interpret
//! what it reports.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::swap::{SwapDirection, SwapRecord};

/// Escrow state as reported by the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscrowState {
    NotCommitted,
    Committed,
    Claimed,
    Refunded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscrowEventKind {
    Initialized,
    Claimed,
    Refunded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowEvent {
    pub escrow_handle: String,
    pub kind: EscrowEventKind,
}

#[async_trait]
pub trait ChainAdapter: Send + Sync {
    /// Address of the local signer; sent to intermediaries as offerer or claimer.
    fn signer_address(&self) -> String;

    /// Escrow lifecycle events for swaps of one direction. The stream ends when the sender
    /// side is dropped.
    async fn subscribe(&self, direction: SwapDirection) -> Result<mpsc::Receiver<EscrowEvent>>;

    async fn escrow_state(&self, swap: &SwapRecord) -> Result<EscrowState>;

    /// Token allowance currently granted to the escrow contract.
    async fn allowance(&self, swap: &SwapRecord) -> Result<u64>;

    async fn approve_spend(&self, swap: &SwapRecord) -> Result<String>;

    async fn create_escrow(&self, swap: &SwapRecord) -> Result<String>;

    async fn claim(&self, swap: &SwapRecord) -> Result<String>;

    async fn refund(&self, swap: &SwapRecord) -> Result<String>;
}
