//! Blockchain node contract
//!
//! The node client (balance reads, signing, broadcast) lives outside this
//! crate. The core talks to it through [`NodeClient`]; [`SimulatedNode`] is an
//! in-memory implementation for dry runs and tests.
//!
//! Retries and timeouts belong to the node client. Every failure surfaced
//! here is propagated unchanged by the collector.

pub mod simulation;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ledger::{AssetKind, Secret};

pub use simulation::{SimulatedNode, SubmittedTransfer};

/// Native-coin transaction cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeConfig {
    pub gas_limit: u64,
    /// Price per gas unit in smallest native units
    pub gas_price: u64,
}

/// Plain native transfer: 21k gas at 10 gwei
pub const DEFAULT_NATIVE_FEE: FeeConfig = FeeConfig {
    gas_limit: 21_000,
    gas_price: 10_000_000_000,
};

/// Gas units budgeted for one token transfer when pre-funding a deposit address
pub const TOKEN_TRANSFER_GAS_BUDGET: u64 = 100_000;

/// Token transfer: the funded gas budget at the default price
pub const DEFAULT_TOKEN_FEE: FeeConfig = FeeConfig {
    gas_limit: TOKEN_TRANSFER_GAS_BUDGET,
    gas_price: DEFAULT_NATIVE_FEE.gas_price,
};

/// Native coin sent to a token deposit address so it can pay for its own collection
pub const DEFAULT_TOKEN_FEE_BUDGET: u128 = DEFAULT_TOKEN_FEE.cost();

impl FeeConfig {
    pub fn new(gas_limit: u64, gas_price: u64) -> Self {
        Self {
            gas_limit,
            gas_price,
        }
    }

    /// Maximum native cost of one transaction (`gas_limit × gas_price`)
    pub const fn cost(&self) -> u128 {
        self.gas_limit as u128 * self.gas_price as u128
    }

    /// Default fee for moving `asset`
    pub fn default_for(asset: &AssetKind) -> Self {
        match asset {
            AssetKind::Native => DEFAULT_NATIVE_FEE,
            AssetKind::Token { .. } => DEFAULT_TOKEN_FEE,
        }
    }

    /// Same gas price, different limit
    pub fn with_gas_limit(self, gas_limit: u64) -> Self {
        Self { gas_limit, ..self }
    }
}

impl Default for FeeConfig {
    fn default() -> Self {
        DEFAULT_NATIVE_FEE
    }
}

/// Signing source of a transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSource {
    pub address: String,
    pub secret: Secret,
}

/// Handle returned by the node for a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHandle(pub String);

impl std::fmt::Display for TxHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Operations the custody core needs from a blockchain node
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Latest confirmed balance of `address` in `asset`, in smallest units
    ///
    /// Does not necessarily include transfers submitted moments ago.
    async fn balance_of(&self, address: &str, asset: &AssetKind) -> Result<u128>;

    /// Submit a native-coin transfer
    async fn submit_native_transfer(
        &self,
        source: &TransferSource,
        destination: &str,
        amount: u128,
        fee: &FeeConfig,
    ) -> Result<TxHandle>;

    /// Submit a token transfer through `contract_address`
    async fn submit_token_transfer(
        &self,
        source: &TransferSource,
        destination: &str,
        amount: u128,
        fee: &FeeConfig,
        contract_address: &str,
    ) -> Result<TxHandle>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_fee_cost() {
        assert_eq!(DEFAULT_NATIVE_FEE.cost(), 210_000_000_000_000);
        assert_eq!(FeeConfig::default(), DEFAULT_NATIVE_FEE);
    }

    #[test]
    fn test_default_fee_follows_asset() {
        let token = AssetKind::Token {
            contract_address: "0xdac17f958d2ee523a2206206994597c13d831ec7".to_string(),
        };
        assert_eq!(FeeConfig::default_for(&AssetKind::Native), DEFAULT_NATIVE_FEE);
        assert_eq!(FeeConfig::default_for(&token).gas_limit, TOKEN_TRANSFER_GAS_BUDGET);
        // A funded token deposit address can always pay for its collection
        assert!(FeeConfig::default_for(&token).cost() <= DEFAULT_TOKEN_FEE_BUDGET);
    }

    #[test]
    fn test_default_token_fee_budget() {
        assert_eq!(DEFAULT_TOKEN_FEE_BUDGET, 1_000_000_000_000_000);
        assert_eq!(DEFAULT_TOKEN_FEE.cost(), DEFAULT_TOKEN_FEE_BUDGET);
    }
}
