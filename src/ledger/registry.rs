//! Currency parameter lookup
//!
//! The ledger owns currency records; the custody core only reads them.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;

use crate::config::CurrencyConfig;
use crate::error::{Error, Result};

use super::types::Currency;

/// Read-through access to currency parameters
#[async_trait]
pub trait CurrencyLookup: Send + Sync {
    /// Look up a currency by code, failing with `UnknownCurrency`
    async fn currency(&self, code: &str) -> Result<Currency>;
}

/// In-memory currency table seeded from configuration
#[derive(Debug, Clone, Default)]
pub struct StaticCurrencyLookup {
    currencies: HashMap<String, Currency>,
}

impl StaticCurrencyLookup {
    pub fn new(currencies: impl IntoIterator<Item = Currency>) -> Self {
        Self {
            currencies: currencies
                .into_iter()
                .map(|c| (c.code.to_lowercase(), c))
                .collect(),
        }
    }

    /// Build from the `[[currencies]]` config section
    pub fn from_config(entries: &[CurrencyConfig]) -> Self {
        let lookup = Self::new(entries.iter().map(CurrencyConfig::to_currency));
        debug!("Loaded {} currencies", lookup.currencies.len());
        lookup
    }

    /// Synchronous lookup for callers that already hold the table
    pub fn get(&self, code: &str) -> Option<&Currency> {
        self.currencies.get(&code.to_lowercase())
    }
}

#[async_trait]
impl CurrencyLookup for StaticCurrencyLookup {
    async fn currency(&self, code: &str) -> Result<Currency> {
        self.get(code)
            .cloned()
            .ok_or_else(|| Error::UnknownCurrency(code.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::AssetKind;

    fn lookup() -> StaticCurrencyLookup {
        StaticCurrencyLookup::from_config(&[
            CurrencyConfig {
                code: "eth".to_string(),
                base_factor: 1_000_000_000_000_000_000,
                min_deposit_amount: 10_000_000_000_000_000,
                contract_address: None,
            },
            CurrencyConfig {
                code: "USDT".to_string(),
                base_factor: 1_000_000,
                min_deposit_amount: 1_000,
                contract_address: Some("0xdac17f958d2ee523a2206206994597c13d831ec7".to_string()),
            },
        ])
    }

    #[tokio::test]
    async fn test_lookup_is_case_insensitive() {
        let lookup = lookup();
        let usdt = lookup.currency("usdt").await.unwrap();
        assert_eq!(usdt.base_factor, 1_000_000);
        assert!(!usdt.asset.is_native());
        assert_eq!(lookup.get("ETH").map(|c| c.asset.clone()), Some(AssetKind::Native));
    }

    #[test]
    fn test_unknown_currency() {
        let err = tokio_test::block_on(lookup().currency("btc")).unwrap_err();
        assert!(matches!(err, Error::UnknownCurrency(code) if code == "btc"));
    }
}
