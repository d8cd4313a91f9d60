//! Operator wallets
//!
//! Hot wallets receiving collected deposits, wallets funding withdrawals and
//! the native-coin fee reserve, plus transfer execution.
//!
//! # Architecture
//!
//! ```text
//! WalletRegistry → WalletService → DepositCollector / WithdrawalBuilder / FeeFunder
//!                                              ↓
//!                                      TransferExecutor → NodeClient
//! ```

pub mod registry;
pub mod transfer;
pub mod types;

pub use registry::{StaticWalletRegistry, WalletRegistry};
pub use transfer::{TransferExecutor, TransferInstruction};
pub use types::{Wallet, WalletKind};
