//! Scripted collaborators shared by the unit tests.

use algo_transfer_types::{TransactionRecord, TransactionStats};
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::algod::{Account, ChainClient, ChainTxStatus, Confirmation, TransferDetail};
use crate::db::Db;
use crate::error::{ChainError, StoreError};
use crate::store::{NewTransaction, StatusPatch, TransactionStore};

/// Address of `Account::from_seed([7; 32])`.
pub const RECIPIENT: &str = "5JFGYY7CTRJAVPXVKB5RGLWF7GKUO5VOX27HXESCD3VGSFCG2IWAKDM5YU";

pub const DEFAULT_TX_ID: &str = "YRWAQVY4BBDHOV2XDQGWN3FJ5XZOY7INKJNAOH5ZWJJ2RAGRNDPQ";

pub fn sender() -> Account {
    Account::from_seed([9u8; 32])
}

pub fn sender_mnemonic() -> String {
    sender().mnemonic()
}

pub fn sender_address() -> String {
    sender().address().to_string()
}

/// What the fake node answers to a status lookup.
#[derive(Debug, Clone)]
pub enum Lookup {
    Confirmed(u64),
    Pending,
    PoolError(String),
    NotFound,
    Unavailable,
}

#[derive(Debug, Clone, Copy)]
enum Confirm {
    Round(u64),
    Timeout,
    PoolRejected,
}

pub struct FakeChain {
    tx_id: String,
    broadcast_error: Option<String>,
    confirmation: Confirm,
    lookup: Mutex<Lookup>,
    with_detail: bool,
    broadcasts: Mutex<Vec<u64>>,
    confirmation_waits: AtomicUsize,
    queries: AtomicUsize,
}

impl FakeChain {
    /// Broadcasts succeed, confirmations time out, lookups say pending.
    pub fn new() -> Self {
        Self {
            tx_id: DEFAULT_TX_ID.to_string(),
            broadcast_error: None,
            confirmation: Confirm::Timeout,
            lookup: Mutex::new(Lookup::Pending),
            with_detail: true,
            broadcasts: Mutex::new(Vec::new()),
            confirmation_waits: AtomicUsize::new(0),
            queries: AtomicUsize::new(0),
        }
    }

    pub fn broadcasting(mut self, tx_id: &str) -> Self {
        self.tx_id = tx_id.to_string();
        self
    }

    pub fn failing_broadcast(mut self, message: &str) -> Self {
        self.broadcast_error = Some(message.to_string());
        self
    }

    pub fn confirming_in(mut self, round: u64) -> Self {
        self.confirmation = Confirm::Round(round);
        self
    }

    pub fn rejecting_from_pool(mut self) -> Self {
        self.confirmation = Confirm::PoolRejected;
        self
    }

    pub fn looking_up(self, lookup: Lookup) -> Self {
        self.set_lookup(lookup);
        self
    }

    pub fn without_detail(mut self) -> Self {
        self.with_detail = false;
        self
    }

    /// Change what later lookups report.
    pub fn set_lookup(&self, lookup: Lookup) {
        *self.lookup.lock().unwrap() = lookup;
    }

    pub fn tx_id(&self) -> &str {
        &self.tx_id
    }

    pub fn broadcast_amounts(&self) -> Vec<u64> {
        self.broadcasts.lock().unwrap().clone()
    }

    pub fn confirmation_waits(&self) -> usize {
        self.confirmation_waits.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn detail() -> TransferDetail {
        TransferDetail {
            sender: sender_address(),
            receiver: RECIPIENT.to_string(),
            amount: 2_500_000,
            note: Some("rent".to_string()),
        }
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    async fn build_and_broadcast(
        &self,
        _signer: &Account,
        _recipient: &str,
        amount: u64,
        _note: Option<&str>,
    ) -> Result<String, ChainError> {
        if let Some(message) = &self.broadcast_error {
            return Err(ChainError::Api {
                status: 400,
                message: message.clone(),
            });
        }
        self.broadcasts.lock().unwrap().push(amount);
        Ok(self.tx_id.clone())
    }

    async fn await_confirmation(
        &self,
        _tx_id: &str,
        max_rounds: u64,
    ) -> Result<Confirmation, ChainError> {
        self.confirmation_waits.fetch_add(1, Ordering::SeqCst);
        match self.confirmation {
            Confirm::Round(round) => Ok(Confirmation {
                confirmed_round: round,
            }),
            Confirm::PoolRejected => Err(ChainError::PoolRejected("overspend".to_string())),
            Confirm::Timeout => Err(ChainError::Timeout { rounds: max_rounds }),
        }
    }

    async fn query_status(&self, tx_id: &str) -> Result<ChainTxStatus, ChainError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let transfer = self.with_detail.then(Self::detail);
        let lookup = self.lookup.lock().unwrap().clone();
        match lookup {
            Lookup::Confirmed(round) => Ok(ChainTxStatus {
                confirmed_round: Some(round),
                pool_error: None,
                transfer,
            }),
            Lookup::Pending => Ok(ChainTxStatus {
                confirmed_round: None,
                pool_error: None,
                transfer,
            }),
            Lookup::PoolError(message) => Ok(ChainTxStatus {
                confirmed_round: None,
                pool_error: Some(message),
                transfer,
            }),
            Lookup::NotFound => Err(ChainError::NotFound(tx_id.to_string())),
            Lookup::Unavailable => Err(ChainError::Api {
                status: 503,
                message: "node is catching up".to_string(),
            }),
        }
    }

    fn endpoint(&self) -> String {
        "fake://algod".to_string()
    }
}

/// Wraps an in-memory [`Db`] and fails selected operations.
pub struct FlakyStore {
    inner: Db,
    fail_upsert: bool,
    fail_insert: bool,
    missing_upserts: usize,
    upserts: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: Db::open(":memory:").unwrap(),
            fail_upsert: false,
            fail_insert: false,
            missing_upserts: 0,
            upserts: AtomicUsize::new(0),
        }
    }

    pub fn failing_upsert(mut self) -> Self {
        self.fail_upsert = true;
        self
    }

    pub fn failing_insert(mut self) -> Self {
        self.fail_insert = true;
        self
    }

    /// The first upsert reports no record even if one exists.
    pub fn missing_on_first_upsert(mut self) -> Self {
        self.missing_upserts = 1;
        self
    }

    pub fn upserts(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }
}

impl TransactionStore for FlakyStore {
    fn upsert_status(
        &self,
        tx_id: &str,
        patch: StatusPatch,
    ) -> Result<Option<TransactionRecord>, StoreError> {
        let seen = self.upserts.fetch_add(1, Ordering::SeqCst);
        if self.fail_upsert {
            return Err(StoreError::Poisoned);
        }
        if seen < self.missing_upserts {
            return Ok(None);
        }
        self.inner.upsert_status(tx_id, patch)
    }

    fn insert(&self, tx: &NewTransaction) -> Result<TransactionRecord, StoreError> {
        if self.fail_insert {
            return Err(StoreError::Poisoned);
        }
        self.inner.insert(tx)
    }

    fn get(&self, tx_id: &str) -> Result<Option<TransactionRecord>, StoreError> {
        self.inner.get(tx_id)
    }

    fn find_all(&self, limit: usize) -> Result<Vec<TransactionRecord>, StoreError> {
        self.inner.find_all(limit)
    }

    fn stats(&self) -> Result<TransactionStats, StoreError> {
        self.inner.stats()
    }
}
