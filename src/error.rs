//! Error types for deposit collection and withdrawals

use thiserror::Error;

use crate::collect::IssuedTransfer;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the custody core
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Unknown currency: {0}")]
    UnknownCurrency(String),

    #[error("Wallet not found: {0}")]
    WalletNotFound(String),

    #[error("Amount conversion failed: {0}")]
    AmountConversion(String),

    // Node errors
    #[error("Node unavailable: {0}")]
    NodeUnavailable(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Insufficient source balance: {available} available, {required} required")]
    InsufficientSourceBalance { available: u128, required: u128 },

    #[error("Transfer rejected by node: {0}")]
    RejectedByNode(String),

    // Collection errors
    #[error("Collection aborted after {} transfer(s): {source}", .issued.len())]
    CollectionAborted {
        issued: Vec<IssuedTransfer>,
        #[source]
        source: Box<Error>,
    },

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error is retryable (transient)
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::NodeUnavailable(_) | Error::Rpc(_) => true,
            Error::CollectionAborted { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Check if the node could not be reached or answered with an RPC failure
    pub fn is_node_communication_failure(&self) -> bool {
        match self {
            Error::NodeUnavailable(_) | Error::Rpc(_) | Error::RejectedByNode(_) => true,
            Error::InsufficientSourceBalance { .. } => true,
            Error::CollectionAborted { source, .. } => source.is_node_communication_failure(),
            _ => false,
        }
    }

    /// Transfers already on their way when a collection was aborted
    pub fn issued_transfers(&self) -> &[IssuedTransfer] {
        match self {
            Error::CollectionAborted { issued, .. } => issued,
            _ => &[],
        }
    }
}
