//! Wallet service
//!
//! Entry point for the custody core: resolves wallets and currencies through
//! the injected registries, then delegates to the collector, the withdrawal
//! builder and the fee funder.

use std::sync::Arc;

use tracing::instrument;

use crate::collect::{CollectibleBasis, CollectionReport, DepositCollector};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::fees::FeeFunder;
use crate::ledger::{AssetKind, CurrencyLookup, Deposit, StaticCurrencyLookup, Withdrawal};
use crate::node::{FeeConfig, NodeClient, TxHandle};
use crate::wallet::{StaticWalletRegistry, TransferExecutor, WalletRegistry};
use crate::withdraw::WithdrawalBuilder;

/// Custody operations for one chain
pub struct WalletService {
    currencies: Arc<dyn CurrencyLookup>,
    wallets: Arc<dyn WalletRegistry>,
    collector: DepositCollector,
    withdrawals: WithdrawalBuilder,
    fee_funder: FeeFunder,

    /// Native transfer fee used when the caller does not override it
    native_fee: FeeConfig,

    /// Token transfer fee used when the caller does not override it; its
    /// cost is what fee funding sends by default
    token_fee: FeeConfig,
}

impl WalletService {
    pub fn new(
        node: Arc<dyn NodeClient>,
        currencies: Arc<dyn CurrencyLookup>,
        wallets: Arc<dyn WalletRegistry>,
        native_fee: FeeConfig,
        token_fee: FeeConfig,
    ) -> Self {
        let executor = TransferExecutor::new(node);
        Self {
            collector: DepositCollector::new(executor.clone(), currencies.clone()),
            withdrawals: WithdrawalBuilder::new(executor.clone()),
            fee_funder: FeeFunder::new(executor),
            currencies,
            wallets,
            native_fee,
            token_fee,
        }
    }

    /// Build a service with in-memory registries seeded from configuration
    pub fn from_config(config: &Config, node: Arc<dyn NodeClient>) -> Self {
        let currencies = Arc::new(StaticCurrencyLookup::from_config(&config.currencies));
        let wallets = Arc::new(StaticWalletRegistry::from_config(&config.wallets));

        Self::new(
            node,
            currencies,
            wallets,
            config.fee_config(),
            config.fees.token_fee_config(),
        )
        .with_basis(config.collection.basis)
    }

    pub fn with_basis(mut self, basis: CollectibleBasis) -> Self {
        self.collector = self.collector.with_basis(basis);
        self
    }

    /// Fee applied to transfers of `asset` when none is given
    pub fn default_fee(&self, asset: &AssetKind) -> FeeConfig {
        match asset {
            AssetKind::Native => self.native_fee,
            AssetKind::Token { .. } => self.token_fee,
        }
    }

    /// Collect a deposit into the registry's destination wallets
    #[instrument(skip_all, fields(deposit = %deposit.id, currency = %deposit.currency))]
    pub async fn collect_deposit(
        &self,
        deposit: &Deposit,
        fee: Option<FeeConfig>,
    ) -> Result<CollectionReport> {
        // Unknown currencies fail here rather than as an empty wallet list
        let currency = self.currencies.currency(&deposit.currency).await?;
        let destinations = self.wallets.destination_wallets(deposit).await?;
        let fee = fee.unwrap_or_else(|| self.default_fee(&currency.asset));
        self.collector.collect(deposit, &destinations, &fee).await
    }

    /// Build and submit a withdrawal from the currency's withdraw wallet
    #[instrument(skip_all, fields(withdrawal = %withdrawal.id, currency = %withdrawal.currency))]
    pub async fn build_withdrawal(&self, withdrawal: &Withdrawal) -> Result<TxHandle> {
        let currency = self.currencies.currency(&withdrawal.currency).await?;
        let source = self.wallets.withdraw_wallet(&currency.code).await?;
        self.withdrawals.submit(withdrawal, &currency, &source).await
    }

    /// Send native coin from the fee wallet to a token deposit's address
    #[instrument(skip_all, fields(deposit = %deposit.id))]
    pub async fn deposit_collection_fees(
        &self,
        deposit: &Deposit,
        amount: Option<u128>,
        fee: Option<FeeConfig>,
    ) -> Result<TxHandle> {
        let currency = self.currencies.currency(&deposit.currency).await?;
        if currency.asset.is_native() {
            return Err(Error::InvalidConfiguration(format!(
                "deposit {} is native {}, its collection gas comes out of the amount",
                deposit.id, currency.code
            )));
        }

        let fee_wallet = self.wallets.fee_wallet().await?;
        let native = self.currencies.currency(&fee_wallet.currency).await?;
        if !native.asset.is_native() {
            return Err(Error::InvalidConfiguration(format!(
                "fee wallet {} holds token {}",
                fee_wallet.name, native.code
            )));
        }

        self.fee_funder
            .fund_collection_fee(
                deposit,
                &fee_wallet,
                amount.unwrap_or_else(|| self.token_fee.cost()),
                &fee.unwrap_or(self.native_fee),
            )
            .await
    }
}
