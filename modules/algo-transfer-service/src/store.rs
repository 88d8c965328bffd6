//! Storage collaborator for transaction records.

use algo_transfer_types::{TransactionRecord, TransactionStats, TxStatus};
use chrono::{DateTime, Utc};

use crate::error::StoreError;

/// Status change to merge into an existing record.
///
/// Only `status` and `confirmed_round` are ever patched; every other field
/// is fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusPatch {
    pub status: TxStatus,
    pub confirmed_round: Option<u64>,
}

impl StatusPatch {
    pub fn pending() -> Self {
        Self {
            status: TxStatus::Pending,
            confirmed_round: None,
        }
    }

    pub fn confirmed(round: u64) -> Self {
        Self {
            status: TxStatus::Confirmed,
            confirmed_round: Some(round),
        }
    }

    pub fn failed() -> Self {
        Self {
            status: TxStatus::Failed,
            confirmed_round: None,
        }
    }
}

/// Fields of a record about to be created.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub tx_id: String,
    pub from: String,
    pub to: String,
    /// Amount in ALGO.
    pub amount: f64,
    pub patch: StatusPatch,
    pub note: String,
    pub created_at: DateTime<Utc>,
}

pub trait TransactionStore: Send + Sync {
    /// Merge `patch` into the record keyed by `tx_id`, atomically.
    ///
    /// Terminal records are left as they are. Returns the stored record after
    /// the merge, or `None` when no record exists.
    fn upsert_status(
        &self,
        tx_id: &str,
        patch: StatusPatch,
    ) -> Result<Option<TransactionRecord>, StoreError>;

    /// Create a record. If one already exists for the id, it is returned unchanged.
    fn insert(&self, tx: &NewTransaction) -> Result<TransactionRecord, StoreError>;

    fn get(&self, tx_id: &str) -> Result<Option<TransactionRecord>, StoreError>;

    /// Most recent records first.
    fn find_all(&self, limit: usize) -> Result<Vec<TransactionRecord>, StoreError>;

    fn stats(&self) -> Result<TransactionStats, StoreError>;
}
