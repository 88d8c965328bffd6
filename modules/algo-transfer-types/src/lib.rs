//! Shared types for the algo transfer service and its HTTP clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =====================================================
// Units & Limits
// =====================================================

/// Length of a base32 Algorand transaction id.
pub const TX_ID_LENGTH: usize = 52;

/// microAlgos per ALGO.
pub const MICROALGOS_PER_ALGO: u64 = 1_000_000;

/// Smallest amount the send form accepts, in ALGO.
pub const MIN_TRANSFER_ALGO: f64 = 0.001;

/// Largest page returned by the transaction listing.
pub const MAX_LIST_LIMIT: usize = 100;

/// Largest amount that still fits a u64 microAlgo count, in ALGO.
pub const MAX_TRANSFER_ALGO: f64 = (u64::MAX / MICROALGOS_PER_ALGO) as f64;

/// Convert a major-unit amount to microAlgos, rounding to the nearest unit.
/// `None` for negative, non-finite or out-of-range amounts.
pub fn algos_to_microalgos(algos: f64) -> Option<u64> {
    if !algos.is_finite() || algos < 0.0 || algos > MAX_TRANSFER_ALGO {
        return None;
    }
    Some((algos * MICROALGOS_PER_ALGO as f64).round() as u64)
}

pub fn microalgos_to_algos(microalgos: u64) -> f64 {
    microalgos as f64 / MICROALGOS_PER_ALGO as f64
}

// =====================================================
// Domain Types
// =====================================================

/// Lifecycle status of a transfer.
///
/// `Pending` is the only non-terminal state; a record leaves it exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    Pending,
    Confirmed,
    Failed,
}

impl TxStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TxStatus::Pending)
    }

    /// Whether a stored record in `self` may be moved to `next`.
    pub fn can_transition_to(self, next: TxStatus) -> bool {
        self == TxStatus::Pending || self == next
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TxStatus::Pending => "pending",
            TxStatus::Confirmed => "confirmed",
            TxStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TxStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TxStatus::Pending),
            "confirmed" => Ok(TxStatus::Confirmed),
            "failed" => Ok(TxStatus::Failed),
            _ => Err(format!("Unknown status: {}", s)),
        }
    }
}

/// A persisted transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub tx_id: String,
    pub from: String,
    pub to: String,
    /// Amount in ALGO.
    pub amount: f64,
    pub status: TxStatus,
    pub note: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed_round: Option<u64>,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a submission or a status check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResult {
    pub tx_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed_round: Option<u64>,
    pub status: TxStatus,
}

impl From<&TransactionRecord> for TransactionResult {
    fn from(record: &TransactionRecord) -> Self {
        Self {
            tx_id: record.tx_id.clone(),
            confirmed_round: record.confirmed_round,
            status: record.status,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionStats {
    pub total: i64,
    pub pending: i64,
    pub confirmed: i64,
    pub failed: i64,
}

// =====================================================
// HTTP Request Types
// =====================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendTransactionRequest {
    pub from_mnemonic: String,
    pub to_address: String,
    /// Amount in ALGO.
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ListTransactionsQuery {
    pub limit: Option<usize>,
}

// =====================================================
// HTTP Response Types
// =====================================================

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RpcResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationIssue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl<T: Serialize> RpcResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            details: None,
            count: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
            details: None,
            count: None,
        }
    }

    pub fn invalid(details: Vec<ValidationIssue>) -> Self {
        Self {
            details: Some(details),
            ..Self::err("Validation error")
        }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }
}

// =====================================================
// Service Status
// =====================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub running: bool,
    pub uptime_secs: u64,
    pub algod_server: String,
    pub confirmation_rounds: u64,
    pub transactions: TransactionStats,
}
