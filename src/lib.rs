//! Custody Sweeper Library
//!
//! Moves customer deposits from per-user payment addresses into operator hot
//! wallets, builds withdrawals and funds token collection gas.

pub mod collect;
pub mod config;
pub mod error;
pub mod fees;
pub mod ledger;
pub mod logging;
pub mod node;
pub mod service;
pub mod wallet;
pub mod withdraw;

// Re-export commonly used types
pub use collect::{CollectibleBasis, CollectionReport, DepositCollector, FundAllocator};
pub use config::Config;
pub use error::{Error, Result};
pub use fees::FeeFunder;
pub use ledger::{Currency, Deposit, Withdrawal};
pub use node::{FeeConfig, NodeClient, SimulatedNode};
pub use service::WalletService;
pub use wallet::{Wallet, WalletRegistry};
pub use withdraw::WithdrawalBuilder;
