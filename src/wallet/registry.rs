//! Wallet registry
//!
//! Resolves which operator wallets take part in collection, withdrawals and
//! fee funding. The real registry is an external store; [`StaticWalletRegistry`]
//! holds the configured wallets in memory.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::WalletEntryConfig;
use crate::error::{Error, Result};
use crate::ledger::Deposit;

use super::types::{Wallet, WalletKind};

/// Read-through access to operator wallets
#[async_trait]
pub trait WalletRegistry: Send + Sync {
    /// Active collection targets for the deposit's currency, in fill order
    async fn destination_wallets(&self, deposit: &Deposit) -> Result<Vec<Wallet>>;

    /// Active wallet funding withdrawals of `currency`
    async fn withdraw_wallet(&self, currency: &str) -> Result<Wallet>;

    /// Active native-coin fee reserve
    async fn fee_wallet(&self) -> Result<Wallet>;
}

/// In-memory registry
#[derive(Debug, Clone, Default)]
pub struct StaticWalletRegistry {
    /// Wallets in registration order
    wallets: Vec<Wallet>,
}

impl StaticWalletRegistry {
    pub fn new(wallets: Vec<Wallet>) -> Self {
        Self { wallets }
    }

    /// Build from the `[[wallets]]` config section
    pub fn from_config(entries: &[WalletEntryConfig]) -> Self {
        let wallets: Vec<Wallet> = entries.iter().map(WalletEntryConfig::to_wallet).collect();
        info!("Loaded {} wallet entries", wallets.len());
        Self { wallets }
    }

    fn active(&self, kind: WalletKind) -> impl Iterator<Item = &Wallet> {
        self.wallets
            .iter()
            .filter(move |w| w.active && w.kind == kind)
    }
}

#[async_trait]
impl WalletRegistry for StaticWalletRegistry {
    async fn destination_wallets(&self, deposit: &Deposit) -> Result<Vec<Wallet>> {
        let mut wallets: Vec<Wallet> = self
            .active(WalletKind::Collection)
            .filter(|w| w.holds(&deposit.currency))
            .cloned()
            .collect();

        // Stable: equal priorities keep registration order
        wallets.sort_by_key(|w| w.priority);

        debug!(
            deposit = %deposit.id,
            currency = %deposit.currency,
            count = wallets.len(),
            "Resolved destination wallets"
        );
        Ok(wallets)
    }

    async fn withdraw_wallet(&self, currency: &str) -> Result<Wallet> {
        self.active(WalletKind::Withdraw)
            .filter(|w| w.holds(currency))
            .min_by_key(|w| w.priority)
            .cloned()
            .ok_or_else(|| Error::WalletNotFound(format!("withdraw wallet for {}", currency)))
    }

    async fn fee_wallet(&self) -> Result<Wallet> {
        self.active(WalletKind::Fee)
            .min_by_key(|w| w.priority)
            .cloned()
            .ok_or_else(|| Error::WalletNotFound("fee wallet".to_string()))
    }
}
