//! Transfer submission
//!
//! Validates a transfer, hands signing and broadcast to the chain client,
//! waits a bounded number of rounds for confirmation and records the outcome.
//! A confirmation timeout is a normal `pending` outcome, not an error.

use algo_transfer_types::{
    MAX_TRANSFER_ALGO, TransactionRecord, TransactionResult, algos_to_microalgos,
    microalgos_to_algos,
};
use chrono::Utc;
use std::sync::Arc;

use crate::algod::ChainClient;
use crate::error::{ChainError, Error, Result, StoreError, SubmitError};
use crate::store::{NewTransaction, StatusPatch, TransactionStore};

/// A transfer as submitted by a caller.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub sender_secret: String,
    pub recipient: String,
    /// Amount in ALGO.
    pub amount: f64,
    pub note: Option<String>,
}

pub struct SubmissionCoordinator {
    chain: Arc<dyn ChainClient>,
    store: Arc<dyn TransactionStore>,
    confirmation_rounds: u64,
    min_amount: u64,
}

impl SubmissionCoordinator {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        store: Arc<dyn TransactionStore>,
        confirmation_rounds: u64,
        min_amount_algo: f64,
    ) -> Self {
        Self {
            chain,
            store,
            confirmation_rounds,
            // never below one microAlgo
            min_amount: algos_to_microalgos(min_amount_algo)
                .unwrap_or(u64::MAX)
                .max(1),
        }
    }

    pub fn confirmation_rounds(&self) -> u64 {
        self.confirmation_rounds
    }

    /// Submit a transfer.
    ///
    /// Exactly one record is written per successful broadcast, whether or not
    /// the confirmation arrives within the wait bound. Nothing is retried.
    pub async fn submit(&self, req: TransferRequest) -> Result<TransactionResult> {
        if !self.chain.validate_address(&req.recipient) {
            return Err(SubmitError::InvalidRecipient(req.recipient).into());
        }
        let amount = self.check_amount(req.amount)?;
        let signer = self
            .chain
            .recover_signer(&req.sender_secret)
            .map_err(SubmitError::InvalidSecret)?;

        let note = req.note.as_deref().filter(|n| !n.is_empty());
        let tx_id = self
            .chain
            .build_and_broadcast(&signer, &req.recipient, amount, note)
            .await
            .map_err(SubmitError::Broadcast)?;

        let patch = match self
            .chain
            .await_confirmation(&tx_id, self.confirmation_rounds)
            .await
        {
            Ok(confirmation) => {
                log::info!(
                    "[SUBMIT] {} confirmed in round {}",
                    tx_id,
                    confirmation.confirmed_round
                );
                StatusPatch::confirmed(confirmation.confirmed_round)
            }
            Err(ChainError::Timeout { rounds }) => {
                log::info!("[SUBMIT] {} still pending after {} rounds", tx_id, rounds);
                StatusPatch::pending()
            }
            Err(e) => {
                log::warn!("[SUBMIT] {} submitted, confirmation unknown: {}", tx_id, e);
                StatusPatch::pending()
            }
        };

        let new_tx = NewTransaction {
            tx_id: tx_id.clone(),
            from: signer.address().to_string(),
            to: req.recipient,
            amount: microalgos_to_algos(amount),
            patch,
            note: note.unwrap_or_default().to_string(),
            created_at: Utc::now(),
        };
        let record = self.record(new_tx).map_err(|source| Error::RecordFailed {
            tx_id: tx_id.clone(),
            source,
        })?;

        Ok(TransactionResult::from(&record))
    }

    fn check_amount(&self, amount: f64) -> std::result::Result<u64, SubmitError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(SubmitError::InvalidAmount(
                "Amount must be positive".to_string(),
            ));
        }
        let Some(micro) = algos_to_microalgos(amount) else {
            return Err(SubmitError::InvalidAmount(format!(
                "Maximum amount is {} ALGO",
                MAX_TRANSFER_ALGO
            )));
        };
        if micro < self.min_amount {
            return Err(SubmitError::InvalidAmount(format!(
                "Minimum amount is {} ALGO",
                microalgos_to_algos(self.min_amount)
            )));
        }
        Ok(micro)
    }

    /// Insert the record; if a status check created it first, merge our outcome in.
    fn record(
        &self,
        new_tx: NewTransaction,
    ) -> std::result::Result<TransactionRecord, StoreError> {
        let record = self.store.insert(&new_tx)?;
        if record.status == new_tx.patch.status || record.status.is_terminal() {
            return Ok(record);
        }
        Ok(self
            .store
            .upsert_status(&new_tx.tx_id, new_tx.patch)?
            .unwrap_or(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Db;
    use crate::testing::{FakeChain, FlakyStore, RECIPIENT, sender_address, sender_mnemonic};
    use algo_transfer_types::{TX_ID_LENGTH, TxStatus};

    fn coordinator(chain: Arc<FakeChain>, store: Arc<Db>) -> SubmissionCoordinator {
        SubmissionCoordinator::new(chain, store, 4, 0.001)
    }

    fn request(amount: f64) -> TransferRequest {
        TransferRequest {
            sender_secret: sender_mnemonic(),
            recipient: RECIPIENT.to_string(),
            amount,
            note: None,
        }
    }

    #[tokio::test]
    async fn test_timeout_records_pending() {
        let tx_id = "A".repeat(TX_ID_LENGTH);
        let chain = Arc::new(FakeChain::new().broadcasting(&tx_id));
        let store = Arc::new(Db::open(":memory:").unwrap());

        let result = coordinator(chain.clone(), store.clone())
            .submit(request(0.001))
            .await
            .unwrap();

        assert_eq!(
            result,
            TransactionResult {
                tx_id: tx_id.clone(),
                confirmed_round: None,
                status: TxStatus::Pending,
            }
        );
        let records = store.find_all(10).unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.tx_id, tx_id);
        assert_eq!(record.status, TxStatus::Pending);
        assert_eq!(record.confirmed_round, None);
        assert_eq!(record.amount, 0.001);
        assert_eq!(record.from, sender_address());
        assert_eq!(record.to, RECIPIENT);
        assert_eq!(record.note, "");
        assert_eq!(chain.broadcast_amounts(), vec![1_000]);
        assert_eq!(chain.confirmation_waits(), 1);
    }

    #[tokio::test]
    async fn test_confirmation_records_round() {
        let chain = Arc::new(FakeChain::new().confirming_in(9001));
        let store = Arc::new(Db::open(":memory:").unwrap());

        let mut req = request(1.25);
        req.note = Some("coffee".to_string());
        let result = coordinator(chain, store.clone()).submit(req).await.unwrap();

        assert_eq!(result.status, TxStatus::Confirmed);
        assert_eq!(result.confirmed_round, Some(9001));
        let record = store.get(&result.tx_id).unwrap().unwrap();
        assert_eq!(TransactionResult::from(&record), result);
        assert_eq!(record.amount, 1.25);
        assert_eq!(record.note, "coffee");
    }

    #[tokio::test]
    async fn test_wait_failure_still_records_pending() {
        let chain = Arc::new(FakeChain::new().rejecting_from_pool());
        let store = Arc::new(Db::open(":memory:").unwrap());

        let result = coordinator(chain, store.clone())
            .submit(request(0.5))
            .await
            .unwrap();

        assert_eq!(result.status, TxStatus::Pending);
        assert_eq!(store.stats().unwrap().pending, 1);
    }

    #[tokio::test]
    async fn test_zero_amount_rejected_before_broadcast() {
        let chain = Arc::new(FakeChain::new());
        let store = Arc::new(Db::open(":memory:").unwrap());

        let err = coordinator(chain.clone(), store.clone())
            .submit(request(0.0))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::SubmissionFailed(SubmitError::InvalidAmount(_))
        ));
        assert!(err.is_client_error());
        assert!(chain.broadcast_amounts().is_empty());
        assert_eq!(chain.confirmation_waits(), 0);
        assert_eq!(store.stats().unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_unrepresentable_amount_rejected() {
        let chain = Arc::new(FakeChain::new());
        let store = Arc::new(Db::open(":memory:").unwrap());

        let err = coordinator(chain.clone(), store)
            .submit(request(1e20))
            .await
            .unwrap_err();

        match err {
            Error::SubmissionFailed(SubmitError::InvalidAmount(message)) => {
                assert!(message.starts_with("Maximum amount is"))
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(chain.broadcast_amounts().is_empty());
    }

    #[tokio::test]
    async fn test_below_minimum_rejected() {
        let chain = Arc::new(FakeChain::new());
        let store = Arc::new(Db::open(":memory:").unwrap());

        for amount in [0.0009, -1.0, f64::NAN, f64::INFINITY] {
            let err = coordinator(chain.clone(), store.clone())
                .submit(request(amount))
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                Error::SubmissionFailed(SubmitError::InvalidAmount(_))
            ));
        }
        assert!(chain.broadcast_amounts().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_recipient_rejected() {
        let chain = Arc::new(FakeChain::new());
        let store = Arc::new(Db::open(":memory:").unwrap());

        let mut req = request(1.0);
        req.recipient = "not-an-address".to_string();
        let err = coordinator(chain.clone(), store).submit(req).await.unwrap_err();

        assert!(matches!(
            err,
            Error::SubmissionFailed(SubmitError::InvalidRecipient(_))
        ));
        assert!(err.to_string().starts_with("Submission failed"));
        assert!(chain.broadcast_amounts().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_secret_rejected() {
        let chain = Arc::new(FakeChain::new());
        let store = Arc::new(Db::open(":memory:").unwrap());

        let mut req = request(1.0);
        req.sender_secret = "abandon abandon abandon".to_string();
        let err = coordinator(chain.clone(), store).submit(req).await.unwrap_err();

        assert!(matches!(
            err,
            Error::SubmissionFailed(SubmitError::InvalidSecret(_))
        ));
        assert!(chain.broadcast_amounts().is_empty());
    }

    #[tokio::test]
    async fn test_broadcast_failure_writes_nothing() {
        let chain = Arc::new(FakeChain::new().failing_broadcast("overspend"));
        let store = Arc::new(Db::open(":memory:").unwrap());

        let err = coordinator(chain, store.clone())
            .submit(request(1.0))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::SubmissionFailed(SubmitError::Broadcast(_))));
        assert!(!err.is_client_error());
        assert!(err.to_string().contains("overspend"));
        assert_eq!(store.stats().unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_existing_pending_record_is_advanced() {
        let chain = Arc::new(FakeChain::new().confirming_in(55));
        let store = Arc::new(Db::open(":memory:").unwrap());
        store
            .insert(&NewTransaction {
                tx_id: chain.tx_id().to_string(),
                from: sender_address(),
                to: RECIPIENT.to_string(),
                amount: 1.0,
                patch: StatusPatch::pending(),
                note: String::new(),
                created_at: Utc::now(),
            })
            .unwrap();

        let result = coordinator(chain, store.clone())
            .submit(request(1.0))
            .await
            .unwrap();

        assert_eq!(result.confirmed_round, Some(55));
        assert_eq!(store.stats().unwrap().total, 1);
        assert_eq!(store.stats().unwrap().confirmed, 1);
    }

    #[tokio::test]
    async fn test_existing_terminal_record_is_kept() {
        let chain = Arc::new(FakeChain::new().rejecting_from_pool());
        let store = Arc::new(Db::open(":memory:").unwrap());
        store
            .insert(&NewTransaction {
                tx_id: chain.tx_id().to_string(),
                from: sender_address(),
                to: RECIPIENT.to_string(),
                amount: 1.0,
                patch: StatusPatch::confirmed(55),
                note: String::new(),
                created_at: Utc::now(),
            })
            .unwrap();

        let result = coordinator(chain, store.clone())
            .submit(request(1.0))
            .await
            .unwrap();

        assert_eq!(result.status, TxStatus::Confirmed);
        assert_eq!(result.confirmed_round, Some(55));
        assert_eq!(store.stats().unwrap().confirmed, 1);
    }

    #[tokio::test]
    async fn test_store_failure_after_broadcast_names_the_transaction() {
        let chain = Arc::new(FakeChain::new().confirming_in(8));
        let store = Arc::new(FlakyStore::new().failing_insert());
        let coordinator = SubmissionCoordinator::new(chain.clone(), store, 4, 0.001);

        let err = coordinator.submit(request(1.0)).await.unwrap_err();

        match err {
            Error::RecordFailed { tx_id, .. } => assert_eq!(tx_id, chain.tx_id()),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(chain.broadcast_amounts(), vec![1_000_000]);
    }
}
