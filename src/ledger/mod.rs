//! Ledger records consumed by the custody core
//!
//! Deposits, withdrawals and currencies are owned by an external ledger.
//! This module holds their in-memory shapes and the read-only lookup trait.

pub mod registry;
pub mod types;

pub use registry::{CurrencyLookup, StaticCurrencyLookup};
pub use types::{AssetKind, Currency, Deposit, PaymentAddress, Secret, Withdrawal};
