//! Deposit collection
//!
//! Moves confirmed deposits from per-user payment addresses into operator
//! hot wallets without pushing any wallet past its ceiling.
//!
//! # Flow
//!
//! ```text
//! Deposit → DepositCollector ─ native: amount − gas ─┐
//!                            └ token:  amount ────────┴→ FundAllocator → TransferExecutor
//! ```
//!
//! Collections for the same destination wallet must be serialized by the
//! caller; two concurrent runs can both see room in a wallet and overshoot it.

pub mod allocator;
pub mod collector;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::AssetKind;
use crate::node::TxHandle;

pub use allocator::{
    decide, Allocated, Allocation, AllocationSink, AllocationTarget, BalanceSource, Decision,
    FundAllocator,
};
pub use collector::DepositCollector;

/// What the collectible amount is derived from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectibleBasis {
    /// The deposit's recorded amount
    #[default]
    Recorded,

    /// The payment address's current balance, for re-driving a partial collection
    ObservedBalance,
}

/// A transfer issued during collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedTransfer {
    /// Destination wallet name
    pub wallet: String,
    pub address: String,
    pub amount: u128,
    pub tx: TxHandle,
    pub submitted_at: DateTime<Utc>,
}

/// Outcome of one collection run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionReport {
    pub deposit_id: String,
    pub currency: String,
    pub asset: AssetKind,

    /// Amount offered to the allocator (after gas for native coin)
    pub collectible: u128,

    /// Issued transfers in order
    pub transfers: Vec<IssuedTransfer>,

    /// Collectible amount left at the payment address for lack of capacity
    pub remaining: u128,
}

impl CollectionReport {
    pub fn total_collected(&self) -> u128 {
        self.transfers.iter().map(|t| t.amount).sum()
    }

    /// Hot-wallet capacity ran out before everything was collected
    pub fn is_partial(&self) -> bool {
        self.remaining > 0
    }

    /// Nothing was sent
    pub fn is_noop(&self) -> bool {
        self.transfers.is_empty()
    }
}
