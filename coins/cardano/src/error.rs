use std::time::Duration;

use thiserror::Error;

use crate::ledger::LedgerError;

#[derive(Error, Debug)]
pub enum CardanoError {
    // ============ Wallet discovery / session ============
    #[error("Cardano wallet provider not found: install a CIP-30 wallet extension")]
    WalletProviderUnavailable,

    #[error("Wallet extension not found: {0}")]
    WalletNotFound(String),

    #[error("Invalid network selected: wallet is on {current}, please switch to {suggested}")]
    NetworkMismatch {
        expected: u8,
        actual: u8,
        current: String,
        suggested: String,
    },

    #[error("Wallet is not connected")]
    WalletNotConnected,

    #[error("Wallet operation '{operation}' failed: {info}")]
    WalletOperation {
        operation: &'static str,
        code: Option<i32>,
        info: String,
    },

    #[error("Wallet operation '{operation}' timed out after {duration:?}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    // ============ Caller input ============
    #[error("Invalid asset unit: {0}")]
    InvalidAssetUnit(String),

    #[error("Invalid address format: {0}")]
    InvalidAddress(String),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    // ============ Assembly ============
    #[error("Insufficient funds: required {required} {asset}, available {available}")]
    InsufficientFunds {
        asset: String,
        required: u64,
        available: u64,
    },

    #[error("Change of {change} lovelace is below the minimum UTXO value of {minimum}")]
    ChangeBelowMinimum { change: u64, minimum: u64 },

    #[error("Output of {coin} lovelace is below the minimum UTXO value of {minimum}")]
    OutputBelowMinimum { coin: u64, minimum: u64 },

    #[error("Output value of {size} bytes exceeds the maximum value size of {max}")]
    ValueTooLarge { size: usize, max: u32 },

    #[error("Transaction of {size} bytes exceeds the maximum transaction size of {max}")]
    TransactionTooLarge { size: usize, max: u32 },

    #[error("Transaction error: {0}")]
    TransactionBuild(String),

    // ============ Encoding ============
    #[error("Ledger encoding error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result type for connector operations
pub type Result<T> = std::result::Result<T, CardanoError>;

/// Stable error codes for callers that cannot match on the enum (e.g. JS)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorCode {
    WalletProviderUnavailable = 1001,
    WalletNotFound = 1002,
    NetworkMismatch = 1003,
    WalletNotConnected = 1004,
    WalletOperation = 1005,
    Timeout = 1006,
    InvalidAssetUnit = 2001,
    InvalidAddress = 2002,
    InvalidQuantity = 2003,
    InvalidMetadata = 2004,
    InsufficientFunds = 3001,
    ChangeBelowMinimum = 3002,
    OutputBelowMinimum = 3003,
    ValueTooLarge = 3004,
    TransactionTooLarge = 3005,
    TransactionBuild = 3006,
    Ledger = 4001,
    Config = 4002,
}

impl CardanoError {
    /// Returns the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            CardanoError::WalletProviderUnavailable => ErrorCode::WalletProviderUnavailable,
            CardanoError::WalletNotFound(_) => ErrorCode::WalletNotFound,
            CardanoError::NetworkMismatch { .. } => ErrorCode::NetworkMismatch,
            CardanoError::WalletNotConnected => ErrorCode::WalletNotConnected,
            CardanoError::WalletOperation { .. } => ErrorCode::WalletOperation,
            CardanoError::Timeout { .. } => ErrorCode::Timeout,
            CardanoError::InvalidAssetUnit(_) => ErrorCode::InvalidAssetUnit,
            CardanoError::InvalidAddress(_) => ErrorCode::InvalidAddress,
            CardanoError::InvalidQuantity(_) => ErrorCode::InvalidQuantity,
            CardanoError::InvalidMetadata(_) => ErrorCode::InvalidMetadata,
            CardanoError::InsufficientFunds { .. } => ErrorCode::InsufficientFunds,
            CardanoError::ChangeBelowMinimum { .. } => ErrorCode::ChangeBelowMinimum,
            CardanoError::OutputBelowMinimum { .. } => ErrorCode::OutputBelowMinimum,
            CardanoError::ValueTooLarge { .. } => ErrorCode::ValueTooLarge,
            CardanoError::TransactionTooLarge { .. } => ErrorCode::TransactionTooLarge,
            CardanoError::TransactionBuild(_) => ErrorCode::TransactionBuild,
            CardanoError::Ledger(_) => ErrorCode::Ledger,
            CardanoError::Config(_) => ErrorCode::Config,
        }
    }

    /// Returns true when the user or caller can fix the condition and start
    /// the pipeline again (switch wallet, switch network, send less).
    ///
    /// Nothing in this crate retries on its own; signing and submission are
    /// not idempotent.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CardanoError::WalletNotFound(_)
                | CardanoError::NetworkMismatch { .. }
                | CardanoError::WalletNotConnected
                | CardanoError::InsufficientFunds { .. }
                | CardanoError::ChangeBelowMinimum { .. }
                | CardanoError::OutputBelowMinimum { .. }
                | CardanoError::ValueTooLarge { .. }
                | CardanoError::TransactionTooLarge { .. }
        )
    }

    /// Returns true for malformed caller input, rejected before any wallet call
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            CardanoError::InvalidAssetUnit(_)
                | CardanoError::InvalidAddress(_)
                | CardanoError::InvalidQuantity(_)
                | CardanoError::InvalidMetadata(_)
        )
    }
}
