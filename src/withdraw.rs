//! Withdrawal construction
//!
//! One withdrawal request becomes exactly one transfer from the withdraw
//! wallet. Recipients are external addresses, so there is no splitting and
//! no capacity check.

use tracing::info;

use crate::error::{Error, Result};
use crate::ledger::{Currency, Withdrawal};
use crate::node::{FeeConfig, TxHandle};
use crate::wallet::{TransferExecutor, TransferInstruction, Wallet};

/// Builds withdrawal transfers
pub struct WithdrawalBuilder {
    executor: TransferExecutor,
}

impl WithdrawalBuilder {
    pub fn new(executor: TransferExecutor) -> Self {
        Self { executor }
    }

    /// Build the transfer for `withdrawal` out of `source_wallet`
    ///
    /// Native withdrawals use [`crate::node::DEFAULT_NATIVE_FEE`]; token
    /// withdrawals carry the contract address and use
    /// [`crate::node::DEFAULT_TOKEN_FEE`].
    pub fn build(
        withdrawal: &Withdrawal,
        currency: &Currency,
        source_wallet: &Wallet,
    ) -> Result<TransferInstruction> {
        if !currency.code.eq_ignore_ascii_case(&withdrawal.currency) {
            return Err(Error::InvalidConfiguration(format!(
                "withdrawal {} is in {}, currency given is {}",
                withdrawal.id, withdrawal.currency, currency.code
            )));
        }
        if !source_wallet.holds(&withdrawal.currency) {
            return Err(Error::InvalidConfiguration(format!(
                "wallet {} holds {}, cannot fund {} withdrawal {}",
                source_wallet.name, source_wallet.currency, withdrawal.currency, withdrawal.id
            )));
        }

        Ok(TransferInstruction {
            source: source_wallet.source(),
            destination: withdrawal.rid.clone(),
            amount: withdrawal.amount,
            fee: FeeConfig::default_for(&currency.asset),
            asset: currency.asset.clone(),
        })
    }

    /// Build and submit the withdrawal transfer
    pub async fn submit(
        &self,
        withdrawal: &Withdrawal,
        currency: &Currency,
        source_wallet: &Wallet,
    ) -> Result<TxHandle> {
        let instruction = Self::build(withdrawal, currency, source_wallet)?;
        let tx = self.executor.execute(&instruction).await?;

        info!(
            withdrawal = %withdrawal.id,
            currency = %currency.code,
            rid = %withdrawal.rid,
            amount = %withdrawal.amount,
            tx = %tx,
            "Withdrawal submitted"
        );

        Ok(tx)
    }
}
