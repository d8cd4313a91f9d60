//! Configuration loading and validation

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::collect::CollectibleBasis;
use crate::ledger::{AssetKind, Currency, Secret};
use crate::node::{FeeConfig, DEFAULT_NATIVE_FEE, TOKEN_TRANSFER_GAS_BUDGET};
use crate::wallet::{Wallet, WalletKind};

lazy_static! {
    static ref ADDRESS_RE: Regex = Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("valid address regex");
}

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fees: FeesConfig,
    #[serde(default)]
    pub collection: CollectionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub currencies: Vec<CurrencyConfig>,
    #[serde(default)]
    pub wallets: Vec<WalletEntryConfig>,
}

/// Default transaction cost parameters
#[derive(Debug, Clone, Deserialize)]
pub struct FeesConfig {
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
    #[serde(default = "default_gas_price")]
    pub gas_price: u64,
    /// Gas units funded per token collection
    #[serde(default = "default_token_gas_budget")]
    pub token_gas_budget: u64,
}

impl FeesConfig {
    pub fn fee_config(&self) -> FeeConfig {
        FeeConfig::new(self.gas_limit, self.gas_price)
    }

    /// Default fee for token transfers
    pub fn token_fee_config(&self) -> FeeConfig {
        self.fee_config().with_gas_limit(self.token_gas_budget)
    }

}

impl Default for FeesConfig {
    fn default() -> Self {
        Self {
            gas_limit: default_gas_limit(),
            gas_price: default_gas_price(),
            token_gas_budget: default_token_gas_budget(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CollectionConfig {
    /// What the collectible amount is derived from
    #[serde(default)]
    pub basis: CollectibleBasis,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, overridden by `RUST_LOG`
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}

/// `[[currencies]]` entry
#[derive(Debug, Clone, Deserialize)]
pub struct CurrencyConfig {
    pub code: String,
    pub base_factor: u64,
    #[serde(default)]
    pub min_deposit_amount: u64,
    /// Token contract; absent for the native coin
    #[serde(default)]
    pub contract_address: Option<String>,
}

impl CurrencyConfig {
    pub fn to_currency(&self) -> Currency {
        Currency {
            code: self.code.to_lowercase(),
            base_factor: self.base_factor as u128,
            min_deposit_amount: self.min_deposit_amount as u128,
            asset: match &self.contract_address {
                Some(contract_address) => AssetKind::Token {
                    contract_address: contract_address.clone(),
                },
                None => AssetKind::Native,
            },
        }
    }
}

/// `[[wallets]]` entry
#[derive(Debug, Clone, Deserialize)]
pub struct WalletEntryConfig {
    pub name: String,
    pub address: String,
    #[serde(default = "default_secret")]
    pub secret: Secret,
    pub currency: String,
    pub kind: WalletKind,
    /// Ceiling in whole currency units
    #[serde(default)]
    pub max_balance: Decimal,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub priority: u32,
}

impl WalletEntryConfig {
    pub fn to_wallet(&self) -> Wallet {
        Wallet {
            name: self.name.clone(),
            address: self.address.clone(),
            secret: self.secret.clone(),
            currency: self.currency.to_lowercase(),
            kind: self.kind,
            max_balance: self.max_balance,
            active: self.active,
            priority: self.priority,
        }
    }
}

fn default_gas_limit() -> u64 {
    DEFAULT_NATIVE_FEE.gas_limit
}

fn default_gas_price() -> u64 {
    DEFAULT_NATIVE_FEE.gas_price
}

fn default_token_gas_budget() -> u64 {
    TOKEN_TRANSFER_GAS_BUDGET
}

fn default_log_filter() -> String {
    "custody_sweeper=info".to_string()
}

fn default_secret() -> Secret {
    Secret::new("")
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Secrets usually come from .env
        dotenvy::dotenv().ok();

        let settings = config::Config::builder()
            // Start with defaults
            .set_default("fees.gas_limit", default_gas_limit() as i64)?
            .set_default("fees.gas_price", default_gas_price() as i64)?
            .set_default("fees.token_gas_budget", default_token_gas_budget() as i64)?
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix CUSTODY_)
            .add_source(
                config::Environment::with_prefix("CUSTODY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.fees.gas_limit == 0 {
            anyhow::bail!("fees.gas_limit must be positive");
        }
        if self.fees.gas_price == 0 {
            anyhow::bail!("fees.gas_price must be positive");
        }

        let mut codes = HashSet::new();
        for currency in &self.currencies {
            let code = currency.code.to_lowercase();
            if !codes.insert(code.clone()) {
                anyhow::bail!("Duplicate currency: {}", code);
            }
            if currency.base_factor == 0 {
                anyhow::bail!("base_factor for {} must be positive", code);
            }
            if let Some(contract) = &currency.contract_address {
                if !ADDRESS_RE.is_match(contract) {
                    anyhow::bail!("Invalid contract address for {}: {}", code, contract);
                }
            }
        }

        let natives = self
            .currencies
            .iter()
            .filter(|c| c.contract_address.is_none())
            .count();
        if natives > 1 {
            anyhow::bail!("At most one native currency allowed, got {}", natives);
        }

        let mut names = HashSet::new();
        let mut active_fee_wallets = 0;
        for wallet in &self.wallets {
            if !names.insert(wallet.name.as_str()) {
                anyhow::bail!("Duplicate wallet name: {}", wallet.name);
            }
            if !ADDRESS_RE.is_match(&wallet.address) {
                anyhow::bail!("Invalid address for wallet {}: {}", wallet.name, wallet.address);
            }
            if !codes.contains(&wallet.currency.to_lowercase()) {
                anyhow::bail!(
                    "Wallet {} references unknown currency {}",
                    wallet.name,
                    wallet.currency
                );
            }
            if wallet.max_balance.is_sign_negative() {
                anyhow::bail!("max_balance for wallet {} cannot be negative", wallet.name);
            }
            let currency = self
                .currencies
                .iter()
                .find(|c| c.code.eq_ignore_ascii_case(&wallet.currency))
                .map(CurrencyConfig::to_currency);
            if let Some(currency) = currency {
                currency.to_base_unit(wallet.max_balance).with_context(|| {
                    format!(
                        "max_balance {} for wallet {} is finer than the smallest {} unit",
                        wallet.max_balance, wallet.name, currency.code
                    )
                })?;
            }
            if wallet.kind == WalletKind::Fee && wallet.active {
                active_fee_wallets += 1;
            }
            if wallet.kind.is_collection_target() && wallet.active && wallet.max_balance.is_zero() {
                tracing::warn!(
                    "Collection wallet {} has zero max_balance and will never receive funds",
                    wallet.name
                );
            }
        }

        if active_fee_wallets > 1 {
            anyhow::bail!(
                "At most one active fee wallet allowed, got {}",
                active_fee_wallets
            );
        }

        Ok(())
    }

    /// Default fee parameters as a `FeeConfig`
    pub fn fee_config(&self) -> FeeConfig {
        self.fees.fee_config()
    }

    /// Get masked configuration for display (hide secrets)
    pub fn masked_display(&self) -> String {
        let mut out = format!(
            r#"Configuration:
  Fees:
    gas_limit: {}
    gas_price: {}
    token_gas_budget: {}
  Collection:
    basis: {:?}
  Logging:
    filter: {}
    json: {}
  Currencies:
"#,
            self.fees.gas_limit,
            self.fees.gas_price,
            self.fees.token_gas_budget,
            self.collection.basis,
            self.logging.filter,
            self.logging.json,
        );

        for currency in &self.currencies {
            out.push_str(&format!(
                "    {}: base_factor={} min_deposit={} contract={}\n",
                currency.code,
                currency.base_factor,
                currency.min_deposit_amount,
                currency.contract_address.as_deref().unwrap_or("(native)")
            ));
        }

        out.push_str("  Wallets:\n");
        for wallet in &self.wallets {
            out.push_str(&format!(
                "    {}: {} {} {} max={} active={} priority={} secret={}\n",
                wallet.name,
                wallet.kind,
                wallet.currency,
                wallet.address,
                wallet.max_balance,
                wallet.active,
                wallet.priority,
                if wallet.secret.is_empty() {
                    "(not set)"
                } else {
                    "***"
                },
            ));
        }

        out
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fees: FeesConfig::default(),
            collection: CollectionConfig::default(),
            logging: LoggingConfig::default(),
            currencies: vec![],
            wallets: vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
[fees]
gas_price = 20000000000

[collection]
basis = "observed_balance"

[[currencies]]
code = "eth"
base_factor = 1000000000000000000
min_deposit_amount = 10000000000000000

[[currencies]]
code = "usdt"
base_factor = 1000000
min_deposit_amount = 1000
contract_address = "0xdac17f958d2ee523a2206206994597c13d831ec7"

[[wallets]]
name = "hot-eth"
address = "0x00000000000000000000000000000000000000a1"
secret = "changeme"
currency = "eth"
kind = "collection"
max_balance = "100.5"

[[wallets]]
name = "fees"
address = "0x00000000000000000000000000000000000000f1"
secret = "changeme"
currency = "eth"
kind = "fee"
"#;

    fn load_sample(contents: &str) -> Result<Config> {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
        file.write_all(contents.as_bytes())?;
        Config::load(file.path())
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.fee_config(), DEFAULT_NATIVE_FEE);
        assert_eq!(config.fees.token_fee_config().cost(), 1_000_000_000_000_000);
        assert_eq!(config.collection.basis, CollectibleBasis::Recorded);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let config = load_sample(SAMPLE).unwrap();

        assert_eq!(config.fees.gas_limit, 21_000);
        assert_eq!(config.fees.gas_price, 20_000_000_000);
        assert_eq!(config.collection.basis, CollectibleBasis::ObservedBalance);
        assert_eq!(config.currencies.len(), 2);
        assert!(config.currencies[1].to_currency().asset.contract_address().is_some());

        let hot = config.wallets[0].to_wallet();
        assert_eq!(hot.kind, WalletKind::Collection);
        assert_eq!(hot.max_balance, Decimal::new(1005, 1));
        assert!(hot.active);
    }

    #[test]
    fn test_rejects_unknown_wallet_currency() {
        let broken = SAMPLE.replace(
            "currency = \"eth\"\nkind = \"fee\"",
            "currency = \"btc\"\nkind = \"fee\"",
        );
        assert!(load_sample(&broken).is_err());
    }

    #[test]
    fn test_rejects_ceiling_finer_than_smallest_unit() {
        let broken = SAMPLE.replace("max_balance = \"100.5\"", "max_balance = \"100.0000000000000000001\"");
        let err = load_sample(&broken).unwrap_err();
        assert!(err.to_string().contains("hot-eth"));
    }

    #[test]
    fn test_rejects_bad_address() {
        let broken = SAMPLE.replace("0x00000000000000000000000000000000000000a1", "0xnothex");
        assert!(load_sample(&broken).is_err());
    }

    #[test]
    fn test_masked_display_hides_secrets() {
        let config = load_sample(SAMPLE).unwrap();
        let display = config.masked_display();
        assert!(display.contains("hot-eth"));
        assert!(!display.contains("changeme"));
    }
}
