//! Simulated node
//!
//! In-memory stand-in for a blockchain node. Used for dry runs and tests:
//! balances live in a concurrent map, submissions are recorded in order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::ledger::AssetKind;

use super::{FeeConfig, NodeClient, TransferSource, TxHandle};

/// A transfer accepted by the simulated node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedTransfer {
    pub tx: TxHandle,
    pub from: String,
    pub to: String,
    pub amount: u128,
    pub asset: AssetKind,
    pub fee: FeeConfig,
    pub submitted_at: DateTime<Utc>,
}

/// In-memory node
///
/// With `confirm_on_submit` disabled (the default) balance reads keep
/// returning the last confirmed state until [`SimulatedNode::confirm_all`]
/// is called, mirroring a real node's lag.
#[derive(Debug, Default)]
pub struct SimulatedNode {
    /// Confirmed balances keyed by (lowercase address, asset)
    balances: DashMap<(String, AssetKind), u128>,

    /// Submissions in order, newest last
    submitted: Mutex<Vec<SubmittedTransfer>>,

    /// Number of submissions already applied to `balances`
    confirmed: Mutex<usize>,

    confirm_on_submit: AtomicBool,

    /// Addresses whose balance reads fail
    unreachable: DashMap<String, ()>,

    /// Next submission fails with this error message
    fail_next_submit: Mutex<Option<String>>,
}

impl SimulatedNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply every submission to balances immediately
    pub fn with_confirm_on_submit(self) -> Self {
        self.confirm_on_submit.store(true, Ordering::SeqCst);
        self
    }

    /// Set a confirmed balance
    pub fn set_balance(&self, address: &str, asset: &AssetKind, amount: u128) {
        self.balances
            .insert((address.to_lowercase(), asset.clone()), amount);
    }

    /// Current confirmed balance (0 if unknown)
    pub fn confirmed_balance(&self, address: &str, asset: &AssetKind) -> u128 {
        self.balances
            .get(&(address.to_lowercase(), asset.clone()))
            .map(|b| *b)
            .unwrap_or(0)
    }

    /// Make balance reads for `address` fail with `NodeUnavailable`
    pub fn make_unreachable(&self, address: &str) {
        self.unreachable.insert(address.to_lowercase(), ());
    }

    pub fn make_reachable(&self, address: &str) {
        self.unreachable.remove(&address.to_lowercase());
    }

    /// Make the next submission fail with `RejectedByNode`
    pub fn fail_next_submit(&self, reason: impl Into<String>) {
        if let Ok(mut slot) = self.fail_next_submit.lock() {
            *slot = Some(reason.into());
        }
    }

    /// All accepted submissions, oldest first
    pub fn submitted(&self) -> Vec<SubmittedTransfer> {
        self.submitted
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Apply all pending submissions to confirmed balances
    pub fn confirm_all(&self) -> Result<usize> {
        let submitted = self.submitted.lock().map_err(poisoned)?;
        let mut confirmed = self.confirmed.lock().map_err(poisoned)?;

        let mut count = 0;
        for transfer in &submitted[*confirmed..] {
            self.apply(transfer)?;
            *confirmed += 1;
            count += 1;
        }

        debug!("Confirmed {} simulated transfer(s)", count);
        Ok(count)
    }

    fn apply(&self, transfer: &SubmittedTransfer) -> Result<()> {
        let from_key = (transfer.from.to_lowercase(), transfer.asset.clone());
        let to_key = (transfer.to.to_lowercase(), transfer.asset.clone());

        {
            let mut from = self.balances.entry(from_key).or_insert(0);
            let available = *from;
            *from = available.checked_sub(transfer.amount).ok_or(
                Error::InsufficientSourceBalance {
                    available,
                    required: transfer.amount,
                },
            )?;
        }
        *self.balances.entry(to_key).or_insert(0) += transfer.amount;

        // Gas is burned from the sender's native balance
        let gas_key = (transfer.from.to_lowercase(), AssetKind::Native);
        let mut native = self.balances.entry(gas_key).or_insert(0);
        *native = native.saturating_sub(transfer.fee.cost());

        Ok(())
    }

    fn submit(
        &self,
        source: &TransferSource,
        destination: &str,
        amount: u128,
        fee: &FeeConfig,
        asset: AssetKind,
    ) -> Result<TxHandle> {
        if let Some(reason) = self.fail_next_submit.lock().map_err(poisoned)?.take() {
            warn!("Simulated node rejecting transfer: {}", reason);
            return Err(Error::RejectedByNode(reason));
        }

        let mut submitted = self.submitted.lock().map_err(poisoned)?;
        let pending = {
            let confirmed = self.confirmed.lock().map_err(poisoned)?;
            submitted[*confirmed..]
                .iter()
                .filter(|t| t.from.eq_ignore_ascii_case(&source.address))
                .map(|t| {
                    let moved = if t.asset == asset { t.amount } else { 0 };
                    let gas = if asset.is_native() { t.fee.cost() } else { 0 };
                    moved + gas
                })
                .sum::<u128>()
        };

        // Pending outflows and their gas are already spoken for
        let available = self
            .confirmed_balance(&source.address, &asset)
            .saturating_sub(pending);
        if available < amount {
            return Err(Error::InsufficientSourceBalance {
                available,
                required: amount,
            });
        }

        let tx = TxHandle(format!("0x{}", Uuid::new_v4().simple()));
        let transfer = SubmittedTransfer {
            tx: tx.clone(),
            from: source.address.clone(),
            to: destination.to_string(),
            amount,
            asset,
            fee: *fee,
            submitted_at: Utc::now(),
        };

        info!(
            tx = %tx,
            from = %transfer.from,
            to = %transfer.to,
            amount = %amount,
            asset = %transfer.asset,
            "Simulated transfer submitted"
        );

        submitted.push(transfer);
        drop(submitted);

        if self.confirm_on_submit.load(Ordering::SeqCst) {
            self.confirm_all()?;
        }

        Ok(tx)
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> Error {
    Error::NodeUnavailable("simulated node state poisoned".to_string())
}

#[async_trait]
impl NodeClient for SimulatedNode {
    async fn balance_of(&self, address: &str, asset: &AssetKind) -> Result<u128> {
        if self.unreachable.contains_key(&address.to_lowercase()) {
            return Err(Error::NodeUnavailable(format!(
                "balance of {} unavailable",
                address
            )));
        }
        Ok(self.confirmed_balance(address, asset))
    }

    async fn submit_native_transfer(
        &self,
        source: &TransferSource,
        destination: &str,
        amount: u128,
        fee: &FeeConfig,
    ) -> Result<TxHandle> {
        self.submit(source, destination, amount, fee, AssetKind::Native)
    }

    async fn submit_token_transfer(
        &self,
        source: &TransferSource,
        destination: &str,
        amount: u128,
        fee: &FeeConfig,
        contract_address: &str,
    ) -> Result<TxHandle> {
        self.submit(
            source,
            destination,
            amount,
            fee,
            AssetKind::Token {
                contract_address: contract_address.to_string(),
            },
        )
    }
}
