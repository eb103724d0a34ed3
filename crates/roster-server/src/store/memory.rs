//! In-memory student store
//!
//! Used by `ROSTER_STORE=memory` and throughout the tests. Failures, delays
//! and a per-write hook can be injected to exercise the bulk writer.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use roster_common::types::Student;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{QueryPage, RecordStore, StoreError, StoreResult, StudentQuery, StudentQueries};

type BatchPredicate = Arc<dyn Fn(&[Student]) -> bool + Send + Sync>;
type WriteHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
pub struct MemoryStore {
    rows: RwLock<Vec<Student>>,
    fail_when: Option<BatchPredicate>,
    on_write: Option<WriteHook>,
    write_delay: Option<Duration>,
    batch_writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Batch writes for which `predicate` returns true fail without persisting.
    pub fn with_failure<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&[Student]) -> bool + Send + Sync + 'static,
    {
        self.fail_when = Some(Arc::new(predicate));
        self
    }

    /// Called at the start of every batch write.
    pub fn with_write_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_write = Some(Arc::new(hook));
        self
    }

    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    pub async fn rows(&self) -> Vec<Student> {
        self.rows.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    /// Number of batch writes attempted, failed ones included.
    pub fn batch_writes(&self) -> usize {
        self.batch_writes.load(Ordering::SeqCst)
    }

    fn check_ids(existing: &[Student], incoming: &[Student]) -> StoreResult<()> {
        for row in incoming {
            if !row.id.is_nil() && existing.iter().any(|s| s.id == row.id) {
                return Err(StoreError::Rejected(format!("duplicate id {}", row.id)));
            }
        }
        Ok(())
    }

    fn with_assigned_id(row: &Student) -> Student {
        let mut row = row.clone();
        if row.id.is_nil() {
            row.id = Uuid::new_v4();
        }
        row
    }
}

#[async_trait]
impl RecordStore<Student> for MemoryStore {
    async fn insert_batch(&self, rows: &[Student]) -> StoreResult<()> {
        self.batch_writes.fetch_add(1, Ordering::SeqCst);
        if let Some(hook) = &self.on_write {
            hook();
        }
        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_when.as_ref().is_some_and(|fail| fail(rows)) {
            return Err(StoreError::Rejected("injected batch failure".to_string()));
        }

        let mut stored = self.rows.write().await;
        Self::check_ids(&stored, rows)?;
        stored.extend(rows.iter().map(Self::with_assigned_id));
        Ok(())
    }

    async fn insert(&self, row: &Student) -> StoreResult<()> {
        let mut stored = self.rows.write().await;
        Self::check_ids(&stored, std::slice::from_ref(row))?;
        stored.push(Self::with_assigned_id(row));
        Ok(())
    }
}

#[async_trait]
impl StudentQueries for MemoryStore {
    async fn query(&self, query: &StudentQuery) -> StoreResult<QueryPage> {
        Ok(query.apply(&self.rows.read().await))
    }

    async fn find_by_name(&self, name: &str) -> StoreResult<Vec<Student>> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .filter(|s| s.name == name)
            .cloned()
            .collect())
    }
}
