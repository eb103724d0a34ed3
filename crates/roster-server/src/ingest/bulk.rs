//! Bulk persistence
//!
//! A batch is split into at most `shard_count` contiguous shards of
//! `ceil(len / shard_count)` rows. Each shard is written on its own task and
//! is all-or-nothing; shards are independent of each other, so a failed
//! shard leaves the successful ones persisted. Every failure is reported.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use roster_common::types::Record;
use thiserror::Error;
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::store::{RecordStore, StoreError};

pub const MISSING_DATA_MESSAGE: &str = "student data are missing, required name, subject and grade";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardFailure {
    pub shard: usize,
    pub rows: usize,
    pub reason: String,
}

impl fmt::Display for ShardFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shard {} ({} rows): {}", self.shard, self.rows, self.reason)
    }
}

fn describe(failures: &[ShardFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("{}", MISSING_DATA_MESSAGE)]
    MissingData,

    #[error("{} of {} shard writes failed: {}", .failures.len(), .shards, describe(.failures))]
    Shards {
        shards: usize,
        failures: Vec<ShardFailure>,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Rejects records lacking a name, a category or a non-zero score, and
/// assigns a fresh identifier when none is set.
pub fn prepare<R: Record>(record: &mut R) -> Result<Uuid, PersistError> {
    if record.name().trim().is_empty() || record.category().trim().is_empty() || record.score() == 0
    {
        return Err(PersistError::MissingData);
    }
    if record.id().is_nil() {
        record.set_id(Uuid::new_v4());
    }
    Ok(record.id())
}

/// Single-record insert path.
pub async fn insert_one<R, S>(store: &S, mut record: R) -> Result<R, PersistError>
where
    R: Record,
    S: RecordStore<R> + ?Sized,
{
    prepare(&mut record)?;
    store.insert(&record).await?;
    Ok(record)
}

pub struct BulkWriter<R, S: ?Sized> {
    store: Arc<S>,
    shard_count: usize,
    _record: PhantomData<fn() -> R>,
}

impl<R, S: ?Sized> Clone for BulkWriter<R, S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            shard_count: self.shard_count,
            _record: PhantomData,
        }
    }
}

impl<R, S> BulkWriter<R, S>
where
    R: Record,
    S: RecordStore<R> + ?Sized + 'static,
{
    pub fn new(store: Arc<S>, shard_count: usize) -> Self {
        Self {
            store,
            shard_count: shard_count.max(1),
            _record: PhantomData,
        }
    }

    /// Writes `rows` across concurrent shards and waits for all of them.
    #[tracing::instrument(skip(self, rows), fields(rows = rows.len(), shards = tracing::field::Empty))]
    pub async fn insert_many(&self, rows: &[R]) -> Result<usize, PersistError> {
        if rows.is_empty() {
            return Err(PersistError::MissingData);
        }

        let shard_size = rows.len().div_ceil(self.shard_count);
        let mut tasks = JoinSet::new();
        let mut sizes = Vec::new();
        let mut shard_of = HashMap::new();
        for (shard, chunk) in rows.chunks(shard_size).enumerate() {
            let store = Arc::clone(&self.store);
            let chunk = chunk.to_vec();
            sizes.push(chunk.len());
            let handle = tasks.spawn(async move { (shard, store.insert_batch(&chunk).await) });
            shard_of.insert(handle.id(), shard);
        }
        let shards = sizes.len();
        tracing::Span::current().record("shards", shards);

        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {},
                Ok((shard, Err(e))) => failures.push(ShardFailure {
                    shard,
                    rows: sizes[shard],
                    reason: e.to_string(),
                }),
                Err(e) => {
                    let shard = shard_of.get(&e.id()).copied().unwrap_or_default();
                    tracing::error!(shard, error = %e, "shard task did not complete");
                    failures.push(ShardFailure {
                        shard,
                        rows: sizes.get(shard).copied().unwrap_or_default(),
                        reason: format!("shard task did not complete: {e}"),
                    })
                },
            }
        }

        if failures.is_empty() {
            tracing::debug!("bulk write complete");
            return Ok(rows.len());
        }

        failures.sort_by_key(|f| f.shard);
        for failure in &failures {
            tracing::warn!(shard = failure.shard, reason = %failure.reason, "shard write failed");
        }
        Err(PersistError::Shards { shards, failures })
    }
}
