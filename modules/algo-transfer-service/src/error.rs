//! Error types for the transfer service.

use thiserror::Error;

/// Failures reported by a chain client.
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("Invalid mnemonic: {0}")]
    InvalidSecret(String),

    #[error("Transaction not found: {0}")]
    NotFound(String),

    #[error("Transaction not confirmed after {rounds} rounds")]
    Timeout { rounds: u64 },

    #[error("Transaction rejected from pool: {0}")]
    PoolRejected(String),

    #[error("Algod API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Algod request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to encode transaction: {0}")]
    Encode(String),

    #[error("Malformed algod response: {0}")]
    Decode(String),
}

/// Failures reported by a transaction store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Database connection lock poisoned")]
    Poisoned,

    #[error("Corrupt row for {tx_id}: {reason}")]
    Corrupt { tx_id: String, reason: String },
}

/// Why a submission was refused before or during broadcast.
#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("Invalid recipient address: {0}")]
    InvalidRecipient(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error(transparent)]
    InvalidSecret(ChainError),

    #[error("Broadcast failed: {0}")]
    Broadcast(ChainError),
}

impl SubmitError {
    /// Input errors the caller can fix by changing the request.
    pub fn is_input_error(&self) -> bool {
        !matches!(self, SubmitError::Broadcast(_))
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Submission failed: {0}")]
    SubmissionFailed(#[from] SubmitError),

    /// The transfer reached the network but its record could not be written.
    #[error("Transaction {tx_id} was broadcast but not recorded: {source}")]
    RecordFailed {
        tx_id: String,
        #[source]
        source: StoreError,
    },

    #[error("Invalid transaction ID format: {0}")]
    InvalidIdentifier(String),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("Reconciliation failed: {0}")]
    ReconciliationFailed(#[source] StoreError),
}

impl Error {
    pub fn is_client_error(&self) -> bool {
        match self {
            Error::SubmissionFailed(e) => e.is_input_error(),
            Error::InvalidIdentifier(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
