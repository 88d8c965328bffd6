//! SQLite storage for transfer records.

use algo_transfer_types::{TransactionRecord, TransactionStats, TxStatus};
use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::{Mutex, MutexGuard};

use crate::error::StoreError;
use crate::store::{NewTransaction, StatusPatch, TransactionStore};

const SELECT_COLUMNS: &str = "SELECT tx_id, from_address, to_address, amount, status, note,
        confirmed_round, created_at
 FROM transactions";

pub struct Db {
    conn: Mutex<rusqlite::Connection>,
}

impl Db {
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = if path == ":memory:" {
            rusqlite::Connection::open_in_memory()?
        } else {
            rusqlite::Connection::open(path)?
        };
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.create_tables()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, rusqlite::Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn create_tables(&self) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                tx_id TEXT NOT NULL UNIQUE,
                from_address TEXT NOT NULL,
                to_address TEXT NOT NULL,
                amount REAL NOT NULL CHECK (amount >= 0),
                status TEXT NOT NULL DEFAULT 'pending'
                    CHECK (status IN ('pending', 'confirmed', 'failed')),
                note TEXT NOT NULL DEFAULT '',
                confirmed_round INTEGER,
                created_at TEXT NOT NULL,
                CHECK ((status = 'confirmed') = (confirmed_round IS NOT NULL))
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_transactions_created_at
             ON transactions(created_at DESC)",
            [],
        )?;
        Ok(())
    }
}

impl TransactionStore for Db {
    fn upsert_status(
        &self,
        tx_id: &str,
        patch: StatusPatch,
    ) -> Result<Option<TransactionRecord>, StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE transactions
             SET status = ?2, confirmed_round = ?3
             WHERE tx_id = ?1 AND status = 'pending'",
            rusqlite::params![
                tx_id,
                patch.status.as_str(),
                patch.confirmed_round.map(|r| r as i64)
            ],
        )?;
        if changed > 0 {
            log::debug!("[DB] {} -> {}", tx_id, patch.status);
        }
        get_impl(&conn, tx_id)
    }

    fn insert(&self, tx: &NewTransaction) -> Result<TransactionRecord, StoreError> {
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT INTO transactions
             (tx_id, from_address, to_address, amount, status, note, confirmed_round, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(tx_id) DO NOTHING",
            rusqlite::params![
                tx.tx_id,
                tx.from,
                tx.to,
                tx.amount,
                tx.patch.status.as_str(),
                tx.note,
                tx.patch.confirmed_round.map(|r| r as i64),
                tx.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            ],
        )?;
        if inserted == 0 {
            log::debug!("[DB] {} already recorded", tx.tx_id);
        }
        get_impl(&conn, &tx.tx_id)?
            .ok_or(StoreError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    fn get(&self, tx_id: &str) -> Result<Option<TransactionRecord>, StoreError> {
        let conn = self.conn()?;
        get_impl(&conn, tx_id)
    }

    fn find_all(&self, limit: usize) -> Result<Vec<TransactionRecord>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} ORDER BY created_at DESC, id DESC LIMIT ?1",
            SELECT_COLUMNS
        ))?;
        let rows = stmt.query_map([limit as i64], RawRow::from_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.into_record()?);
        }
        Ok(records)
    }

    fn stats(&self) -> Result<TransactionStats, StoreError> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT status, COUNT(*) FROM transactions GROUP BY status")?;
        let rows = stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?;

        let mut stats = TransactionStats::default();
        for row in rows {
            let (status, count) = row?;
            match status.parse::<TxStatus>() {
                Ok(TxStatus::Pending) => stats.pending = count,
                Ok(TxStatus::Confirmed) => stats.confirmed = count,
                Ok(TxStatus::Failed) => stats.failed = count,
                Err(e) => log::warn!("[DB] Ignoring rows with {}", e),
            }
            stats.total += count;
        }
        Ok(stats)
    }
}

fn get_impl(
    conn: &rusqlite::Connection,
    tx_id: &str,
) -> Result<Option<TransactionRecord>, StoreError> {
    let result = conn.query_row(
        &format!("{} WHERE tx_id = ?1", SELECT_COLUMNS),
        rusqlite::params![tx_id],
        RawRow::from_row,
    );
    match result {
        Ok(raw) => Ok(Some(raw.into_record()?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Column values before domain parsing.
struct RawRow {
    tx_id: String,
    from: String,
    to: String,
    amount: f64,
    status: String,
    note: String,
    confirmed_round: Option<i64>,
    created_at: String,
}

impl RawRow {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            tx_id: row.get(0)?,
            from: row.get(1)?,
            to: row.get(2)?,
            amount: row.get(3)?,
            status: row.get(4)?,
            note: row.get(5)?,
            confirmed_round: row.get(6)?,
            created_at: row.get(7)?,
        })
    }

    fn into_record(self) -> Result<TransactionRecord, StoreError> {
        let corrupt = |reason: String| StoreError::Corrupt {
            tx_id: self.tx_id.clone(),
            reason,
        };
        let status = self.status.parse::<TxStatus>().map_err(corrupt)?;
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| corrupt(format!("bad created_at: {}", e)))?
            .with_timezone(&Utc);

        Ok(TransactionRecord {
            tx_id: self.tx_id,
            from: self.from,
            to: self.to,
            amount: self.amount,
            status,
            note: self.note,
            confirmed_round: self.confirmed_round.map(|r| r as u64),
            created_at,
        })
    }
}
