//! Core types for operator wallets

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ledger::Secret;
use crate::node::TransferSource;

/// Role of an operator wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletKind {
    /// Hot wallet receiving collected deposits, bounded by `max_balance`
    #[serde(alias = "deposit")]
    Collection,

    /// Hot wallet funding outbound withdrawals
    Withdraw,

    /// Native-coin reserve paying gas for token collection
    Fee,
}

impl WalletKind {
    /// Check if collected deposits may land in this wallet
    pub fn is_collection_target(&self) -> bool {
        matches!(self, WalletKind::Collection)
    }
}

impl std::fmt::Display for WalletKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WalletKind::Collection => write!(f, "collection"),
            WalletKind::Withdraw => write!(f, "withdraw"),
            WalletKind::Fee => write!(f, "fee"),
        }
    }
}

/// Operator-controlled wallet
#[derive(Debug, Clone, PartialEq)]
pub struct Wallet {
    /// Unique identifier: "hot-eth-1"
    pub name: String,

    pub address: String,

    /// Signing handle, passed through to the node client
    pub secret: Secret,

    /// Currency code this wallet holds
    pub currency: String,

    pub kind: WalletKind,

    /// Balance ceiling in whole currency units
    pub max_balance: Decimal,

    pub active: bool,

    /// Fill order among collection targets, lowest first
    pub priority: u32,
}

impl Wallet {
    /// Signing source for transfers out of this wallet
    pub fn source(&self) -> TransferSource {
        TransferSource {
            address: self.address.clone(),
            secret: self.secret.clone(),
        }
    }

    /// Check if this wallet holds `currency`
    pub fn holds(&self, currency: &str) -> bool {
        self.currency.eq_ignore_ascii_case(currency)
    }
}
