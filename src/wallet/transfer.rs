//! Transfer execution
//!
//! A [`TransferInstruction`] is one value transfer. The executor dispatches
//! it to the node as a native-coin or token transfer.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::Result;
use crate::ledger::AssetKind;
use crate::node::{FeeConfig, NodeClient, TransferSource, TxHandle};

/// One value transfer, ready for submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferInstruction {
    pub source: TransferSource,

    /// Destination address
    pub destination: String,

    /// Amount in smallest units of `asset`
    pub amount: u128,

    /// Gas parameters, paid in native coin by the source
    pub fee: FeeConfig,

    pub asset: AssetKind,
}

/// Transfer executor
#[derive(Clone)]
pub struct TransferExecutor {
    node: Arc<dyn NodeClient>,
}

impl TransferExecutor {
    /// Create a new transfer executor
    pub fn new(node: Arc<dyn NodeClient>) -> Self {
        Self { node }
    }

    /// Submit a transfer
    ///
    /// # Returns
    /// Node transaction handle on success
    pub async fn execute(&self, instruction: &TransferInstruction) -> Result<TxHandle> {
        debug!(
            "Executing transfer: {} ({}) from {} to {}",
            instruction.amount,
            instruction.asset,
            instruction.source.address,
            instruction.destination
        );

        let tx = match &instruction.asset {
            AssetKind::Native => {
                self.node
                    .submit_native_transfer(
                        &instruction.source,
                        &instruction.destination,
                        instruction.amount,
                        &instruction.fee,
                    )
                    .await?
            }
            AssetKind::Token { contract_address } => {
                self.node
                    .submit_token_transfer(
                        &instruction.source,
                        &instruction.destination,
                        instruction.amount,
                        &instruction.fee,
                        contract_address,
                    )
                    .await?
            }
        };

        info!(
            "Transfer submitted: {} ({}) to {} (tx: {})",
            instruction.amount, instruction.asset, instruction.destination, tx
        );

        Ok(tx)
    }

    /// Get balance of an address in smallest units
    pub async fn get_balance(&self, address: &str, asset: &AssetKind) -> Result<u128> {
        self.node.balance_of(address, asset).await
    }
}
