//! Core ledger types
//!
//! Currencies, deposits, withdrawals and the payment addresses deposits arrive at.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How an asset moves on chain
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssetKind {
    /// The chain's own coin; transfers pay gas out of the moved value's balance
    Native,

    /// Contract-based token; gas is paid in native coin by the sender
    Token {
        /// Token contract address
        contract_address: String,
    },
}

impl AssetKind {
    pub fn is_native(&self) -> bool {
        matches!(self, AssetKind::Native)
    }

    /// Contract address for tokens, `None` for the native coin
    pub fn contract_address(&self) -> Option<&str> {
        match self {
            AssetKind::Native => None,
            AssetKind::Token { contract_address } => Some(contract_address),
        }
    }
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetKind::Native => write!(f, "native"),
            AssetKind::Token { contract_address } => write!(f, "token({})", contract_address),
        }
    }
}

/// Per-currency parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Currency {
    /// Currency code: "eth", "usdt"
    pub code: String,

    /// Smallest units per whole unit (10^decimals)
    pub base_factor: u128,

    /// Minimum deposit, also the minimum partial collection transfer (smallest unit)
    pub min_deposit_amount: u128,

    /// Native coin or token
    pub asset: AssetKind,
}

impl Currency {
    /// Convert a whole-unit amount into smallest units
    ///
    /// Fails for negative amounts, for amounts carrying more precision than
    /// the currency supports, and on overflow.
    pub fn to_base_unit(&self, amount: Decimal) -> Result<u128> {
        let scaled = self.scale(amount)?;
        if !scaled.fract().is_zero() {
            return Err(Error::AmountConversion(format!(
                "{} {} is finer than the smallest unit",
                amount, self.code
            )));
        }
        self.whole(amount, scaled)
    }

    /// Convert a balance ceiling into smallest units, rounding down
    ///
    /// A ceiling finer than the smallest unit still bounds the wallet; the
    /// excess precision can never be filled.
    pub fn ceiling_to_base_unit(&self, amount: Decimal) -> Result<u128> {
        let scaled = self.scale(amount)?;
        self.whole(amount, scaled.trunc())
    }

    fn scale(&self, amount: Decimal) -> Result<Decimal> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(Error::AmountConversion(format!(
                "negative amount {} {}",
                amount, self.code
            )));
        }

        let factor = Decimal::from_u128(self.base_factor).ok_or_else(|| {
            Error::AmountConversion(format!("base factor {} out of range", self.base_factor))
        })?;

        amount.checked_mul(factor).ok_or_else(|| {
            Error::AmountConversion(format!("{} {} overflows", amount, self.code))
        })
    }

    fn whole(&self, amount: Decimal, scaled: Decimal) -> Result<u128> {
        scaled.to_u128().ok_or_else(|| {
            Error::AmountConversion(format!("{} {} out of range", amount, self.code))
        })
    }

    /// Convert smallest units back into whole units (for display)
    pub fn from_base_unit(&self, amount: u128) -> Decimal {
        match (Decimal::from_u128(amount), Decimal::from_u128(self.base_factor)) {
            (Some(amount), Some(factor)) if !factor.is_zero() => amount / factor,
            _ => Decimal::ZERO,
        }
    }
}

/// Signing secret handle for an address
///
/// Never printed; `Debug` and `Display` are masked.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Expose the raw secret to the node client
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret(***)")
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "***")
    }
}

/// Per-user deposit address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentAddress {
    pub address: String,
    pub secret: Secret,
}

/// A confirmed deposit waiting for collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deposit {
    /// Ledger identifier, used for log correlation only
    pub id: String,

    /// Currency code
    pub currency: String,

    /// Deposited amount in smallest units
    pub amount: u128,

    /// Address the deposit arrived at
    pub payment_address: PaymentAddress,
}

/// An outbound withdrawal request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Withdrawal {
    pub id: String,

    /// Currency code
    pub currency: String,

    /// Recipient address
    pub rid: String,

    /// Amount in smallest units
    pub amount: u128,
}
