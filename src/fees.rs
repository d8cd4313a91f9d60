//! Collection fee funding
//!
//! Token collection gas is paid in native coin by the payment address
//! itself. Before collecting a token deposit, the fee reserve tops the
//! address up with enough native coin for that transfer.

use tracing::info;

use crate::error::{Error, Result};
use crate::ledger::{AssetKind, Deposit};
use crate::node::{FeeConfig, TxHandle};
use crate::wallet::{TransferExecutor, TransferInstruction, Wallet};

/// Funds payment addresses from the fee reserve
pub struct FeeFunder {
    executor: TransferExecutor,
}

impl FeeFunder {
    pub fn new(executor: TransferExecutor) -> Self {
        Self { executor }
    }

    /// Native transfer of `amount` from the fee reserve to the deposit's
    /// payment address
    ///
    /// Callers normally pass [`crate::node::DEFAULT_TOKEN_FEE_BUDGET`].
    pub async fn fund_collection_fee(
        &self,
        deposit: &Deposit,
        fee_reserve_wallet: &Wallet,
        amount: u128,
        fee: &FeeConfig,
    ) -> Result<TxHandle> {
        let instruction = Self::build(deposit, fee_reserve_wallet, amount, fee)?;
        let tx = self.executor.execute(&instruction).await?;

        info!(
            deposit = %deposit.id,
            fee_wallet = %fee_reserve_wallet.name,
            address = %deposit.payment_address.address,
            amount = %amount,
            tx = %tx,
            "Funded collection fee"
        );

        Ok(tx)
    }

    /// The funding transfer, without submitting it
    pub fn build(
        deposit: &Deposit,
        fee_reserve_wallet: &Wallet,
        amount: u128,
        fee: &FeeConfig,
    ) -> Result<TransferInstruction> {
        if amount == 0 {
            return Err(Error::InvalidConfiguration(format!(
                "zero fee budget for deposit {}",
                deposit.id
            )));
        }

        Ok(TransferInstruction {
            source: fee_reserve_wallet.source(),
            destination: deposit.payment_address.address.clone(),
            amount,
            fee: *fee,
            asset: AssetKind::Native,
        })
    }
}
