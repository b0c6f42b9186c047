//! Durable transaction store.
//!
//! Records live in a sled tree keyed by the 32-byte transaction identity, with
//! the JSON-encoded `AAStateTransaction` as value. Writes go through
//! compare-and-swap so concurrent ingress requests and the relayer loop never
//! clobber each other, and every successful write is flushed to disk before
//! the call returns. The flush is awaited, so writers never park a runtime
//! worker on fsync.

use std::path::Path;

use alloy_primitives::B256;
use tracing::debug;

use crate::error::StateError;
use crate::models::{AAStateTransaction, AAStatus, AATransaction};

pub struct AATxState {
    db: sled::Db,
}

impl AATxState {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StateError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Store that disappears when dropped
    pub fn temporary() -> Result<Self, StateError> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    /// Persist a newly admitted transaction with status Pending
    pub async fn add(&self, tx: AATransaction) -> Result<AAStateTransaction, StateError> {
        let record = AAStateTransaction::new(tx);
        let encoded = serde_json::to_vec(&record)?;

        match self
            .db
            .compare_and_swap(record.id.as_slice(), None::<&[u8]>, Some(encoded))?
        {
            Ok(()) => {
                self.flush().await?;
                debug!(id = %record.id, from = %record.tx.from(), "stored new transaction");
                Ok(record)
            }
            Err(_) => Err(StateError::DuplicateKey(record.id)),
        }
    }

    pub fn get(&self, id: &B256) -> Result<AAStateTransaction, StateError> {
        let raw = self
            .db
            .get(id.as_slice())?
            .ok_or(StateError::NotFound(*id))?;
        Ok(serde_json::from_slice(&raw)?)
    }

    /// Every record still owed a submission (Pending or Queued)
    pub fn get_all_pending(&self) -> Result<Vec<AAStateTransaction>, StateError> {
        self.scan(|status| status.is_pending())
    }

    /// Records broadcast but never confirmed, e.g. after a crash mid-poll
    pub fn get_all_sent(&self) -> Result<Vec<AAStateTransaction>, StateError> {
        self.scan(|status| status == AAStatus::Sent)
    }

    /// Atomically apply `mutate` to the stored record and persist the result.
    ///
    /// `mutate` may run more than once if another writer races us.
    pub async fn update<F>(&self, id: &B256, mut mutate: F) -> Result<AAStateTransaction, StateError>
    where
        F: FnMut(&mut AAStateTransaction),
    {
        loop {
            let current = self
                .db
                .get(id.as_slice())?
                .ok_or(StateError::NotFound(*id))?;

            let mut record: AAStateTransaction = serde_json::from_slice(&current)?;
            mutate(&mut record);
            // identity is never mutated
            record.id = *id;
            record.updated_at = chrono::Utc::now();

            let encoded = serde_json::to_vec(&record)?;
            match self
                .db
                .compare_and_swap(id.as_slice(), Some(&current), Some(encoded))?
            {
                Ok(()) => {
                    self.flush().await?;
                    debug!(id = %id, status = %record.status, "updated transaction");
                    return Ok(record);
                }
                Err(_) => continue,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.db.len()
    }

    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }

    fn scan<P>(&self, predicate: P) -> Result<Vec<AAStateTransaction>, StateError>
    where
        P: Fn(AAStatus) -> bool,
    {
        let mut records = Vec::new();
        for entry in self.db.iter() {
            let (_, raw) = entry?;
            let record: AAStateTransaction = serde_json::from_slice(&raw)?;
            if predicate(record.status) {
                records.push(record);
            }
        }

        records.sort_by_key(|record| record.created_at);
        Ok(records)
    }

    async fn flush(&self) -> Result<(), StateError> {
        self.db.flush_async().await?;
        Ok(())
    }
}
