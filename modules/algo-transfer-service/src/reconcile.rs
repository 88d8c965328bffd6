//! Status reconciliation
//!
//! Merges what the node reports about a transaction into the stored record,
//! creating the record when the node knows a transaction we never stored.
//! Classification is kept separate from the storage merge so it can be
//! checked on its own.

use algo_transfer_types::{
    TX_ID_LENGTH, TransactionRecord, TransactionResult, TxStatus, microalgos_to_algos,
};
use chrono::Utc;
use std::sync::Arc;

use crate::algod::{ChainClient, ChainTxStatus, TransferDetail};
use crate::error::{ChainError, Error, Result};
use crate::store::{NewTransaction, StatusPatch, TransactionStore};

/// Outcome of a chain lookup, reduced to the three lifecycle states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainVerdict {
    Confirmed {
        round: u64,
        transfer: Option<TransferDetail>,
    },
    Pending {
        transfer: Option<TransferDetail>,
    },
    /// The node affirmatively does not know the transaction.
    Unknown,
}

impl ChainVerdict {
    pub fn patch(&self) -> StatusPatch {
        match self {
            ChainVerdict::Confirmed { round, .. } => StatusPatch::confirmed(*round),
            ChainVerdict::Pending { .. } => StatusPatch::pending(),
            ChainVerdict::Unknown => StatusPatch::failed(),
        }
    }

    pub fn status(&self) -> TxStatus {
        self.patch().status
    }

    fn transfer(&self) -> Option<&TransferDetail> {
        match self {
            ChainVerdict::Confirmed { transfer, .. } | ChainVerdict::Pending { transfer } => {
                transfer.as_ref()
            }
            ChainVerdict::Unknown => None,
        }
    }
}

/// Classify a status lookup.
///
/// Only a not-found answer becomes [`ChainVerdict::Unknown`]; every other
/// failure is handed back to the caller. A pool error without a confirmed
/// round is still pending.
pub fn classify(
    lookup: std::result::Result<ChainTxStatus, ChainError>,
) -> std::result::Result<ChainVerdict, ChainError> {
    match lookup {
        Ok(ChainTxStatus {
            confirmed_round: Some(round),
            transfer,
            ..
        }) if round > 0 => Ok(ChainVerdict::Confirmed { round, transfer }),
        Ok(ChainTxStatus { transfer, .. }) => Ok(ChainVerdict::Pending { transfer }),
        Err(ChainError::NotFound(_)) => Ok(ChainVerdict::Unknown),
        Err(e) => Err(e),
    }
}

pub struct StatusReconciler {
    chain: Arc<dyn ChainClient>,
    store: Arc<dyn TransactionStore>,
}

impl StatusReconciler {
    pub fn new(chain: Arc<dyn ChainClient>, store: Arc<dyn TransactionStore>) -> Self {
        Self { chain, store }
    }

    /// Bring the stored record for `tx_id` in line with the chain.
    ///
    /// When a record exists, its state after the merge is returned, so a
    /// terminal record keeps answering the same way.
    pub async fn reconcile(&self, tx_id: &str) -> Result<TransactionResult> {
        let length = tx_id.chars().count();
        if length != TX_ID_LENGTH {
            return Err(Error::InvalidIdentifier(format!(
                "expected {} characters, got {}",
                TX_ID_LENGTH, length
            )));
        }
        if !self.chain.validate_tx_id(tx_id) {
            return Err(Error::InvalidIdentifier(
                "not a base32 transaction id".to_string(),
            ));
        }

        let verdict = classify(self.chain.query_status(tx_id).await)?;
        let patch = verdict.patch();

        let stored = self
            .store
            .upsert_status(tx_id, patch)
            .map_err(Error::ReconciliationFailed)?;
        if let Some(record) = stored {
            if !record.status.can_transition_to(patch.status) {
                log::info!(
                    "[RECONCILE] {} stays {} (chain reports {})",
                    tx_id,
                    record.status,
                    patch.status
                );
            }
            return Ok(TransactionResult::from(&record));
        }

        let restored = match verdict.transfer() {
            Some(detail) => self.restore(tx_id, detail, patch),
            None => {
                if verdict != ChainVerdict::Unknown {
                    log::warn!(
                        "[RECONCILE] {} is {} on chain but no transfer detail was reported, \
                         not recording",
                        tx_id,
                        verdict.status()
                    );
                }
                None
            }
        };

        Ok(match restored {
            Some(record) => TransactionResult::from(&record),
            None => TransactionResult {
                tx_id: tx_id.to_string(),
                confirmed_round: patch.confirmed_round,
                status: patch.status,
            },
        })
    }

    /// Create the missing record from chain detail. Failures here are logged only.
    fn restore(
        &self,
        tx_id: &str,
        detail: &TransferDetail,
        patch: StatusPatch,
    ) -> Option<TransactionRecord> {
        let new_tx = NewTransaction {
            tx_id: tx_id.to_string(),
            from: detail.sender.clone(),
            to: detail.receiver.clone(),
            amount: microalgos_to_algos(detail.amount),
            patch,
            note: detail.note.clone().unwrap_or_default(),
            created_at: Utc::now(),
        };
        let record = match self.store.insert(&new_tx) {
            Ok(record) => record,
            Err(e) => {
                log::warn!("[RECONCILE] Could not record {}: {}", tx_id, e);
                return None;
            }
        };
        if record.status == patch.status || record.status.is_terminal() {
            log::info!("[RECONCILE] {} stored as {}", tx_id, record.status);
            return Some(record);
        }

        // a submission recorded it in the meantime
        match self.store.upsert_status(tx_id, patch) {
            Ok(merged) => {
                log::info!("[RECONCILE] {} merged into concurrent record", tx_id);
                merged.or(Some(record))
            }
            Err(e) => {
                log::warn!("[RECONCILE] Could not update {}: {}", tx_id, e);
                None
            }
        }
    }
}
