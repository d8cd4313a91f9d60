//! Deposit collector
//!
//! Drives the allocator for one deposit and submits each allocated transfer
//! before the next wallet's balance is read.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::ledger::{AssetKind, Currency, CurrencyLookup, Deposit};
use crate::node::{FeeConfig, TransferSource};
use crate::wallet::{TransferExecutor, TransferInstruction, Wallet};

use super::allocator::{AllocationSink, AllocationTarget, BalanceSource, FundAllocator};
use super::{CollectibleBasis, CollectionReport, IssuedTransfer};

/// Collects deposits into destination wallets
pub struct DepositCollector {
    executor: TransferExecutor,
    currencies: Arc<dyn CurrencyLookup>,
    basis: CollectibleBasis,
}

impl DepositCollector {
    pub fn new(executor: TransferExecutor, currencies: Arc<dyn CurrencyLookup>) -> Self {
        Self {
            executor,
            currencies,
            basis: CollectibleBasis::default(),
        }
    }

    /// Derive the collectible amount from `basis` instead of the recorded amount
    pub fn with_basis(mut self, basis: CollectibleBasis) -> Self {
        self.basis = basis;
        self
    }

    /// Collect a deposit into `destination_wallets`, filled in the given order
    ///
    /// A failed balance read or submission aborts the run with
    /// [`Error::CollectionAborted`], which carries the transfers already
    /// issued. Issued transfers are never rolled back.
    pub async fn collect(
        &self,
        deposit: &Deposit,
        destination_wallets: &[Wallet],
        fee: &FeeConfig,
    ) -> Result<CollectionReport> {
        if destination_wallets.is_empty() {
            return Err(Error::InvalidConfiguration(format!(
                "no destination wallets for {} deposit {}",
                deposit.currency, deposit.id
            )));
        }

        let currency = self.currencies.currency(&deposit.currency).await?;
        let gross = self.gross_amount(deposit, &currency).await?;
        let collectible = collectible_amount(gross, &currency.asset, fee)?;
        let targets = self.targets(&currency, destination_wallets)?;

        info!(
            deposit = %deposit.id,
            currency = %currency.code,
            asset = %currency.asset,
            gross = %gross,
            collectible = %collectible,
            collectible_units = %currency.from_base_unit(collectible),
            wallets = targets.len(),
            "Collecting deposit"
        );

        let balances = AssetBalances {
            executor: &self.executor,
            asset: &currency.asset,
        };
        let mut sink = SubmittingSink {
            executor: &self.executor,
            source: TransferSource {
                address: deposit.payment_address.address.clone(),
                secret: deposit.payment_address.secret.clone(),
            },
            asset: &currency.asset,
            fee: *fee,
            wallets: destination_wallets,
            issued: Vec::new(),
        };

        let remaining = match FundAllocator::run(collectible, &targets, &balances, &mut sink).await {
            Ok(remaining) => remaining,
            Err(e) => {
                error!(
                    deposit = %deposit.id,
                    issued = sink.issued.len(),
                    "Collection aborted: {}",
                    e
                );
                return Err(Error::CollectionAborted {
                    issued: sink.issued,
                    source: Box::new(e),
                });
            }
        };

        let report = CollectionReport {
            deposit_id: deposit.id.clone(),
            currency: currency.code.clone(),
            asset: currency.asset.clone(),
            collectible,
            transfers: sink.issued,
            remaining,
        };

        if report.is_partial() {
            warn!(
                deposit = %deposit.id,
                collected = %report.total_collected(),
                remaining = %remaining,
                "Hot wallet capacity exhausted, leaving remainder at payment address"
            );
        } else {
            info!(
                deposit = %deposit.id,
                collected = %report.total_collected(),
                transfers = report.transfers.len(),
                "Deposit collected"
            );
        }

        Ok(report)
    }

    async fn gross_amount(&self, deposit: &Deposit, currency: &Currency) -> Result<u128> {
        match self.basis {
            CollectibleBasis::Recorded => Ok(deposit.amount),
            CollectibleBasis::ObservedBalance => {
                let observed = self
                    .executor
                    .get_balance(&deposit.payment_address.address, &currency.asset)
                    .await?;
                debug!(
                    deposit = %deposit.id,
                    recorded = %deposit.amount,
                    observed = %observed,
                    "Using observed payment address balance"
                );
                Ok(observed)
            }
        }
    }

    /// Per-wallet ceilings and minimums in smallest units
    fn targets(&self, currency: &Currency, wallets: &[Wallet]) -> Result<Vec<AllocationTarget>> {
        let max_balances = wallets
            .iter()
            .map(|wallet| {
                if !wallet.holds(&currency.code) {
                    return Err(Error::InvalidConfiguration(format!(
                        "wallet {} holds {}, cannot receive {}",
                        wallet.name, wallet.currency, currency.code
                    )));
                }
                currency.ceiling_to_base_unit(wallet.max_balance)
            })
            .collect::<Result<Vec<u128>>>()?;

        Ok(wallets
            .iter()
            .zip(max_balances)
            .map(|(wallet, max_balance)| AllocationTarget {
                address: wallet.address.clone(),
                max_balance,
                min_transfer: currency.min_deposit_amount,
            })
            .collect())
    }
}

/// Collectible amount for a deposit of `gross` smallest units
///
/// Native deposits pay their own collection gas, so it comes out of the
/// amount. Token collection gas is paid from the address's native balance.
pub fn collectible_amount(gross: u128, asset: &AssetKind, fee: &FeeConfig) -> Result<u128> {
    match asset {
        AssetKind::Native => gross.checked_sub(fee.cost()).ok_or_else(|| {
            Error::InvalidConfiguration(format!(
                "deposit of {} cannot cover gas cost {} ({} × {})",
                gross,
                fee.cost(),
                fee.gas_limit,
                fee.gas_price
            ))
        }),
        AssetKind::Token { .. } => Ok(gross),
    }
}

struct AssetBalances<'a> {
    executor: &'a TransferExecutor,
    asset: &'a AssetKind,
}

#[async_trait]
impl BalanceSource for AssetBalances<'_> {
    async fn balance_of(&self, address: &str) -> Result<u128> {
        self.executor.get_balance(address, self.asset).await
    }
}

struct SubmittingSink<'a> {
    executor: &'a TransferExecutor,
    source: TransferSource,
    asset: &'a AssetKind,
    fee: FeeConfig,
    wallets: &'a [Wallet],
    issued: Vec<IssuedTransfer>,
}

#[async_trait]
impl AllocationSink for SubmittingSink<'_> {
    async fn accept(&mut self, index: usize, target: &AllocationTarget, amount: u128) -> Result<()> {
        let instruction = TransferInstruction {
            source: self.source.clone(),
            destination: target.address.clone(),
            amount,
            fee: self.fee,
            asset: self.asset.clone(),
        };

        let tx = self.executor.execute(&instruction).await?;

        self.issued.push(IssuedTransfer {
            wallet: self.wallets[index].name.clone(),
            address: target.address.clone(),
            amount,
            tx,
            submitted_at: Utc::now(),
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{PaymentAddress, Secret, StaticCurrencyLookup};
    use crate::node::{SimulatedNode, DEFAULT_NATIVE_FEE};
    use crate::wallet::WalletKind;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    const USDT: &str = "0xdac17f958d2ee523a2206206994597c13d831ec7";
    const ETHER: u128 = 1_000_000_000_000_000_000;

    fn usdt_asset() -> AssetKind {
        AssetKind::Token {
            contract_address: USDT.to_string(),
        }
    }

    fn currencies() -> Arc<StaticCurrencyLookup> {
        Arc::new(StaticCurrencyLookup::new([
            Currency {
                code: "eth".to_string(),
                base_factor: ETHER,
                min_deposit_amount: 10_000_000_000_000_000,
                asset: AssetKind::Native,
            },
            Currency {
                code: "usdt".to_string(),
                base_factor: 1_000_000,
                min_deposit_amount: 1_000,
                asset: usdt_asset(),
            },
        ]))
    }

    fn wallet(name: &str, currency: &str, max_balance: Decimal) -> Wallet {
        Wallet {
            name: name.to_string(),
            address: format!("0x{}", name),
            secret: Secret::new("pw"),
            currency: currency.to_string(),
            kind: WalletKind::Collection,
            max_balance,
            active: true,
            priority: 0,
        }
    }

    fn deposit(currency: &str, amount: u128) -> Deposit {
        Deposit {
            id: "dep-1".to_string(),
            currency: currency.to_string(),
            amount,
            payment_address: PaymentAddress {
                address: "0xuser".to_string(),
                secret: Secret::new("user-pw"),
            },
        }
    }

    fn collector(node: &Arc<SimulatedNode>) -> DepositCollector {
        DepositCollector::new(TransferExecutor::new(node.clone()), currencies())
    }

    #[tokio::test]
    async fn test_native_collection_subtracts_gas() {
        let node = Arc::new(SimulatedNode::new());
        node.set_balance("0xuser", &AssetKind::Native, 2 * ETHER);

        let report = collector(&node)
            .collect(&deposit("eth", 2 * ETHER), &[wallet("hot", "eth", dec!(100))], &DEFAULT_NATIVE_FEE)
            .await
            .unwrap();

        let expected = 2 * ETHER - DEFAULT_NATIVE_FEE.cost();
        assert_eq!(report.collectible, expected);
        assert_eq!(report.total_collected(), expected);
        assert!(!report.is_partial());

        let submitted = node.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].amount, expected);
        assert_eq!(submitted[0].to, "0xhot");
        assert_eq!(submitted[0].fee, DEFAULT_NATIVE_FEE);
    }

    #[tokio::test]
    async fn test_native_deposit_equal_to_gas_is_noop() {
        let node = Arc::new(SimulatedNode::new());

        let report = collector(&node)
            .collect(
                &deposit("eth", 210_000_000_000_000),
                &[wallet("hot", "eth", dec!(100))],
                &FeeConfig::new(21_000, 10_000_000_000),
            )
            .await
            .unwrap();

        assert_eq!(report.collectible, 0);
        assert!(report.is_noop());
        assert!(node.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_native_deposit_below_gas_is_configuration_error() {
        let node = Arc::new(SimulatedNode::new());

        let err = collector(&node)
            .collect(&deposit("eth", 1_000), &[wallet("hot", "eth", dec!(100))], &DEFAULT_NATIVE_FEE)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[tokio::test]
    async fn test_token_collection_keeps_full_amount() {
        let node = Arc::new(SimulatedNode::new());
        node.set_balance("0xuser", &usdt_asset(), 1_000_000);
        // Hot wallet A already holds 0.7 of its 1.0 USDT ceiling
        node.set_balance("0xa", &usdt_asset(), 700_000);

        let fee = FeeConfig::new(90_000, 20_000_000_000);
        let wallets = [wallet("a", "usdt", dec!(1)), wallet("b", "usdt", dec!(5))];

        let report = collector(&node)
            .collect(&deposit("usdt", 1_000_000), &wallets, &fee)
            .await
            .unwrap();

        assert_eq!(report.collectible, 1_000_000);
        let amounts: Vec<(&str, u128)> = report
            .transfers
            .iter()
            .map(|t| (t.wallet.as_str(), t.amount))
            .collect();
        assert_eq!(amounts, vec![("a", 300_000), ("b", 700_000)]);

        for transfer in node.submitted() {
            assert_eq!(transfer.asset, usdt_asset());
            assert_eq!(transfer.fee, fee);
        }
    }

    #[tokio::test]
    async fn test_ceiling_finer_than_smallest_unit_rounds_down() {
        let node = Arc::new(SimulatedNode::new());
        node.set_balance("0xuser", &usdt_asset(), 1_000_000);

        let wallets = [wallet("a", "usdt", dec!(0.3000001)), wallet("b", "usdt", dec!(5))];
        let report = collector(&node)
            .collect(&deposit("usdt", 1_000_000), &wallets, &DEFAULT_NATIVE_FEE)
            .await
            .unwrap();

        let amounts: Vec<u128> = report.transfers.iter().map(|t| t.amount).collect();
        assert_eq!(amounts, vec![300_000, 700_000]);
    }

    #[tokio::test]
    async fn test_partial_collection_when_capacity_runs_out() {
        let node = Arc::new(SimulatedNode::new());
        node.set_balance("0xuser", &usdt_asset(), 1_000_000);
        node.set_balance("0xa", &usdt_asset(), 999_500);

        let report = collector(&node)
            .collect(&deposit("usdt", 1_000_000), &[wallet("a", "usdt", dec!(1))], &DEFAULT_NATIVE_FEE)
            .await
            .unwrap();

        assert!(report.is_noop());
        assert!(report.is_partial());
        assert_eq!(report.remaining, 1_000_000);
    }

    #[tokio::test]
    async fn test_no_destination_wallets() {
        let node = Arc::new(SimulatedNode::new());
        let err = collector(&node)
            .collect(&deposit("eth", ETHER), &[], &DEFAULT_NATIVE_FEE)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[tokio::test]
    async fn test_wallet_of_other_currency_is_rejected() {
        let node = Arc::new(SimulatedNode::new());
        let err = collector(&node)
            .collect(&deposit("eth", ETHER), &[wallet("a", "usdt", dec!(1))], &DEFAULT_NATIVE_FEE)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    /// Rejects every submission after the first `accept` ones
    struct FlakyNode {
        inner: Arc<SimulatedNode>,
        accept: usize,
        seen: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl crate::node::NodeClient for FlakyNode {
        async fn balance_of(&self, address: &str, asset: &AssetKind) -> Result<u128> {
            self.inner.balance_of(address, asset).await
        }

        async fn submit_native_transfer(
            &self,
            source: &TransferSource,
            destination: &str,
            amount: u128,
            fee: &FeeConfig,
        ) -> Result<crate::node::TxHandle> {
            self.inner
                .submit_native_transfer(source, destination, amount, fee)
                .await
        }

        async fn submit_token_transfer(
            &self,
            source: &TransferSource,
            destination: &str,
            amount: u128,
            fee: &FeeConfig,
            contract_address: &str,
        ) -> Result<crate::node::TxHandle> {
            let seen = self
                .seen
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if seen >= self.accept {
                return Err(Error::RejectedByNode(
                    "replacement transaction underpriced".to_string(),
                ));
            }
            self.inner
                .submit_token_transfer(source, destination, amount, fee, contract_address)
                .await
        }
    }

    #[tokio::test]
    async fn test_submission_failure_reports_issued_transfers() {
        let inner = Arc::new(SimulatedNode::new());
        inner.set_balance("0xuser", &usdt_asset(), 1_000_000);
        let node = Arc::new(FlakyNode {
            inner: inner.clone(),
            accept: 1,
            seen: std::sync::atomic::AtomicUsize::new(0),
        });

        let wallets = [
            wallet("a", "usdt", dec!(0.3)),
            wallet("b", "usdt", dec!(0.3)),
            wallet("c", "usdt", dec!(5)),
        ];
        let collector = DepositCollector::new(TransferExecutor::new(node), currencies());

        let err = collector
            .collect(&deposit("usdt", 1_000_000), &wallets, &DEFAULT_NATIVE_FEE)
            .await
            .unwrap_err();

        let issued = err.issued_transfers();
        assert_eq!(issued.len(), 1);
        assert_eq!(issued[0].wallet, "a");
        assert_eq!(issued[0].amount, 300_000);
        assert!(matches!(
            &err,
            Error::CollectionAborted { source, .. } if matches!(**source, Error::RejectedByNode(_))
        ));
        // Nothing after the failed transfer was attempted
        assert_eq!(inner.submitted().len(), 1);
    }

    #[tokio::test]
    async fn test_balance_read_failure_aborts_before_transfer() {
        let node = Arc::new(SimulatedNode::new());
        node.set_balance("0xuser", &usdt_asset(), 1_000_000);
        node.make_unreachable("0xb");

        let wallets = [wallet("a", "usdt", dec!(0.3)), wallet("b", "usdt", dec!(5))];
        let err = collector(&node)
            .collect(&deposit("usdt", 1_000_000), &wallets, &DEFAULT_NATIVE_FEE)
            .await
            .unwrap_err();

        assert_eq!(err.issued_transfers().len(), 1);
        assert!(err.is_node_communication_failure());
        assert_eq!(node.submitted().len(), 1);
    }

    #[tokio::test]
    async fn test_observed_balance_basis_on_redrive() {
        let node = Arc::new(SimulatedNode::new().with_confirm_on_submit());
        node.set_balance("0xuser", &usdt_asset(), 1_000_000);
        node.make_unreachable("0xb");

        let wallets = [wallet("a", "usdt", dec!(0.3)), wallet("b", "usdt", dec!(5))];
        let collector = collector(&node).with_basis(CollectibleBasis::ObservedBalance);

        assert!(collector
            .collect(&deposit("usdt", 1_000_000), &wallets, &DEFAULT_NATIVE_FEE)
            .await
            .is_err());

        // Node recovers; re-driving only moves what is still at the address
        node.make_reachable("0xb");

        let report = collector
            .collect(&deposit("usdt", 1_000_000), &wallets, &DEFAULT_NATIVE_FEE)
            .await
            .unwrap();

        assert_eq!(report.collectible, 700_000);
        assert_eq!(report.transfers.len(), 1);
        assert_eq!(report.transfers[0].wallet, "b");
        assert_eq!(report.transfers[0].amount, 700_000);
        assert_eq!(node.confirmed_balance("0xuser", &usdt_asset()), 0);
        assert_eq!(node.confirmed_balance("0xa", &usdt_asset()), 300_000);
    }
}
