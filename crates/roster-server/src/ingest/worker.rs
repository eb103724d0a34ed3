//! File worker pool
//!
//! Each file of an upload is decoded on its own task. At most
//! `max_workers` tasks decode at once; the rest wait on a semaphore.
//! A task streams rows into a batch buffer, flushes full batches through
//! the bulk writer and reports byte-position progress on the conduit.

use std::future::Future;
use std::io::SeekFrom;
use std::sync::Arc;

use csv_async::{AsyncReaderBuilder, StringRecord};
use roster_common::types::{Record, StatusEvent};
use thiserror::Error;
use tokio::io::AsyncSeekExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::bulk::{BulkWriter, PersistError};
use super::coordinator::SpooledFile;
use super::mapper::{DecodeError, RowMapper};
use super::progress::{ByteCounter, CountingReader, ProgressTracker, StatusSender};
use crate::store::RecordStore;

pub const EMPTY_FILE_MESSAGE: &str = "file is empty";

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("error reading csv header: {0}")]
    Header(#[source] csv_async::Error),

    #[error("error reading csv row {row}: {source}")]
    Read {
        row: usize,
        #[source]
        source: csv_async::Error,
    },

    #[error("error decoding csv row {row}: {source}")]
    Decode {
        row: usize,
        #[source]
        source: DecodeError,
    },

    #[error("error inserting batch: {0}")]
    Persistence(#[from] PersistError),

    #[error("error reading file: {0}")]
    Io(#[from] std::io::Error),

    #[error("processing cancelled")]
    Cancelled,
}

/// Everything a file task shares with its siblings.
pub struct WorkerContext<R, S: ?Sized, M> {
    pub writer: BulkWriter<R, S>,
    pub mapper: Arc<M>,
    pub batch_size: usize,
    pub cancel: CancellationToken,
    pub status: StatusSender,
}

/// Runs `task` for every item with at most `max_workers` running at once,
/// and returns after all of them have finished.
pub async fn run_bounded<T, F, Fut>(items: Vec<T>, max_workers: usize, task: F)
where
    T: Send + 'static,
    F: Fn(T) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let permits = Arc::new(Semaphore::new(max_workers.min(items.len()).max(1)));
    let mut tasks = JoinSet::new();

    for item in items {
        let permits = Arc::clone(&permits);
        let work = task(item);
        tasks.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            work.await;
        });
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            tracing::error!(error = %e, "file task did not complete");
        }
    }
}

/// Processes every file of an upload and returns once all have finished.
pub async fn process_files<R, S, M>(
    ctx: Arc<WorkerContext<R, S, M>>,
    files: Vec<SpooledFile>,
    max_workers: usize,
) where
    R: Record,
    S: RecordStore<R> + ?Sized + 'static,
    M: RowMapper<R> + 'static,
{
    run_bounded(files, max_workers, |file| {
        let ctx = Arc::clone(&ctx);
        let span = tracing::info_span!("file", index = file.index, name = %file.name);
        async move { process_file(&ctx, file).await }.instrument(span)
    })
    .await;
}

/// Decodes one file, reporting exactly one terminal event unless cancelled.
pub async fn process_file<R, S, M>(ctx: &WorkerContext<R, S, M>, mut file: SpooledFile)
where
    R: Record,
    S: RecordStore<R> + ?Sized + 'static,
    M: RowMapper<R>,
{
    let index = file.index;
    ctx.status.send(StatusEvent::started(index)).await;

    let size = match file.file.metadata().await {
        Ok(metadata) => metadata.len(),
        Err(e) => {
            let error = IngestError::Io(e);
            ctx.status
                .send(StatusEvent::failed(index, 0.0, format!("processing failed: {error}")))
                .await;
            return;
        },
    };

    if size == 0 {
        tracing::info!("skipping empty file");
        ctx.status
            .send(StatusEvent::failed(index, 100.0, EMPTY_FILE_MESSAGE))
            .await;
        return;
    }

    let mut tracker = ProgressTracker::new(index, size);
    let counter = ByteCounter::default();
    match decode(ctx, &mut file, &mut tracker, &counter).await {
        Ok(rows) => {
            tracing::info!(rows, bytes = size, "file ingested");
            ctx.status.send(StatusEvent::completed(index)).await;
        },
        Err(IngestError::Cancelled) => {
            tracing::info!(bytes_read = counter.get(), "file processing cancelled");
        },
        Err(error) => {
            tracing::warn!(error = %error, "file processing failed");
            let percent = tracker.percent(counter.get());
            ctx.status
                .send(StatusEvent::failed(index, percent, format!("processing failed: {error}")))
                .await;
        },
    }
}

async fn decode<R, S, M>(
    ctx: &WorkerContext<R, S, M>,
    file: &mut SpooledFile,
    tracker: &mut ProgressTracker,
    counter: &ByteCounter,
) -> Result<usize, IngestError>
where
    R: Record,
    S: RecordStore<R> + ?Sized + 'static,
    M: RowMapper<R>,
{
    file.file.seek(SeekFrom::Start(0)).await?;
    let source = CountingReader::new(&mut file.file, counter.clone());

    let mut reader = AsyncReaderBuilder::new()
        .has_headers(true)
        .create_reader(source);
    reader.headers().await.map_err(IngestError::Header)?;

    let mut record = StringRecord::new();
    let mut batch: Vec<R> = Vec::with_capacity(ctx.batch_size);
    let mut rows = 0usize;

    loop {
        let row = rows + 1;
        let more = reader
            .read_record(&mut record)
            .await
            .map_err(|source| IngestError::Read { row, source })?;
        if !more {
            break;
        }

        let mapped = ctx
            .mapper
            .map_row(&record)
            .map_err(|source| IngestError::Decode { row, source })?;
        batch.push(mapped);
        rows = row;

        if batch.len() >= ctx.batch_size {
            flush(ctx, &mut batch).await?;
        }

        if let Some(event) = tracker.poll(rows, counter.get()) {
            ctx.status.tick(event).await;
        }
    }

    if !batch.is_empty() {
        flush(ctx, &mut batch).await?;
    } else if ctx.cancel.is_cancelled() {
        return Err(IngestError::Cancelled);
    }

    Ok(rows)
}

/// Writes the buffered rows unless cancelled, and clears the buffer.
///
/// A write that has started always runs to completion; cancellation is
/// checked again once it returns.
async fn flush<R, S, M>(ctx: &WorkerContext<R, S, M>, batch: &mut Vec<R>) -> Result<(), IngestError>
where
    R: Record,
    S: RecordStore<R> + ?Sized + 'static,
{
    if ctx.cancel.is_cancelled() {
        return Err(IngestError::Cancelled);
    }
    let written = ctx.writer.insert_many(batch).await;
    batch.clear();
    written?;

    if ctx.cancel.is_cancelled() {
        return Err(IngestError::Cancelled);
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::ingest::coordinator::spool_bytes;
    use crate::ingest::mapper::StudentMapper;
    use crate::store::MemoryStore;
    use roster_common::types::Student;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use crate::ingest::progress::{status_conduit, StatusReceiver};
    use std::time::Duration;

    type TestContext = WorkerContext<Student, MemoryStore, StudentMapper>;

    fn context(
        store: Arc<MemoryStore>,
        batch_size: usize,
        cancel: CancellationToken,
    ) -> (Arc<TestContext>, StatusReceiver) {
        let (status, rx) = status_conduit(1024, 16);
        let ctx = WorkerContext {
            writer: BulkWriter::new(store, 10),
            mapper: Arc::new(StudentMapper),
            batch_size,
            cancel,
            status,
        };
        (Arc::new(ctx), rx)
    }

    fn csv(rows: &[&str]) -> Vec<u8> {
        let mut body = String::from("id,name,subject,grade\n");
        for row in rows {
            body.push_str(row);
            body.push('\n');
        }
        body.into_bytes()
    }

    async fn drain(mut rx: StatusReceiver) -> Vec<StatusEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    fn terminal_for(events: &[StatusEvent], index: usize) -> Vec<&StatusEvent> {
        events
            .iter()
            .filter(|e| e.file_index == Some(index) && e.is_terminal())
            .collect()
    }

    #[tokio::test]
    async fn test_valid_file_persists_every_row() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let (ctx, rx) = context(Arc::clone(&store), 2, CancellationToken::new());
        let file = spool_bytes(
            dir.path(),
            0,
            "a.csv",
            csv(&[",Ada,Physics,91", ",Alan,Mathematics,88", ",Grace,Computer Science,95"]),
        )
        .await
        .unwrap();

        process_file(&ctx, file).await;
        drop(ctx);

        let events = drain(rx).await;
        assert_eq!(events.first(), Some(&StatusEvent::started(0)));
        assert_eq!(events.last(), Some(&StatusEvent::completed(0)));
        assert_eq!(store.len().await, 3);
    }

    #[tokio::test]
    async fn test_empty_file_reports_once_and_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let (ctx, rx) = context(Arc::clone(&store), 2, CancellationToken::new());
        let file = spool_bytes(dir.path(), 0, "empty.csv", b"").await.unwrap();

        process_file(&ctx, file).await;
        drop(ctx);

        let events = drain(rx).await;
        let terminal = terminal_for(&events, 0);
        assert_eq!(terminal.len(), 1);
        assert_eq!(terminal[0].percent, 100.0);
        assert_eq!(terminal[0].error, EMPTY_FILE_MESSAGE);
        assert_eq!(store.batch_writes(), 0);
    }

    #[tokio::test]
    async fn test_header_only_file_completes() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let (ctx, rx) = context(Arc::clone(&store), 2, CancellationToken::new());
        let file = spool_bytes(dir.path(), 0, "header.csv", csv(&[])).await.unwrap();

        process_file(&ctx, file).await;
        drop(ctx);

        assert_eq!(drain(rx).await.last(), Some(&StatusEvent::completed(0)));
        assert_eq!(store.batch_writes(), 0);
    }

    #[tokio::test]
    async fn test_decode_failure_keeps_flushed_rows_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let (ctx, rx) = context(Arc::clone(&store), 2, CancellationToken::new());
        let file = spool_bytes(
            dir.path(),
            3,
            "b.csv",
            csv(&[",Ada,Physics,91", ",Alan,Physics,88", ",Grace,Physics,95", ",Eve,Physics,high"]),
        )
        .await
        .unwrap();

        process_file(&ctx, file).await;
        drop(ctx);

        let events = drain(rx).await;
        let terminal = terminal_for(&events, 3);
        assert_eq!(terminal.len(), 1);
        assert!(terminal[0].error.contains("row 4"), "{}", terminal[0].error);
        // rows 1-2 were flushed; row 3 was still buffered
        let names: Vec<String> = store.rows().await.into_iter().map(|s| s.name).collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"Ada".to_string()));
        assert!(names.contains(&"Alan".to_string()));
    }

    #[tokio::test]
    async fn test_persistence_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new().with_failure(|_| true));
        let (ctx, rx) = context(Arc::clone(&store), 10, CancellationToken::new());
        let file = spool_bytes(dir.path(), 0, "a.csv", csv(&[",Ada,Physics,91"]))
            .await
            .unwrap();

        process_file(&ctx, file).await;
        drop(ctx);

        let events = drain(rx).await;
        let terminal = terminal_for(&events, 0);
        assert_eq!(terminal.len(), 1);
        assert!(terminal[0].error.contains("shard"));
    }

    #[tokio::test]
    async fn test_cancellation_lets_started_flush_finish() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let store = Arc::new(
            MemoryStore::new()
                .with_write_delay(Duration::from_millis(20))
                .with_write_hook(move || trigger.cancel()),
        );
        let (ctx, rx) = context(Arc::clone(&store), 2, cancel);
        let file = spool_bytes(
            dir.path(),
            0,
            "a.csv",
            csv(&[",A,Art,1", ",B,Art,2", ",C,Art,3", ",D,Art,4", ",E,Art,5"]),
        )
        .await
        .unwrap();

        process_file(&ctx, file).await;
        drop(ctx);

        let events = drain(rx).await;
        assert_eq!(events.first(), Some(&StatusEvent::started(0)));
        assert!(terminal_for(&events, 0).is_empty());
        // the first batch of two rows was written across two shards
        assert_eq!(store.len().await, 2);
        assert_eq!(store.batch_writes(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let store = Arc::new(MemoryStore::new());
        let (ctx, rx) = context(Arc::clone(&store), 100, cancel);
        let file = spool_bytes(dir.path(), 0, "a.csv", csv(&[",Ada,Physics,91"]))
            .await
            .unwrap();

        process_file(&ctx, file).await;
        drop(ctx);

        assert!(terminal_for(&drain(rx).await, 0).is_empty());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_files_fail_independently() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let (ctx, rx) = context(Arc::clone(&store), 2, CancellationToken::new());
        let files = vec![
            spool_bytes(
                dir.path(),
                0,
                "a.csv",
                csv(&[",Ada,Physics,91", ",Alan,Physics,88", ",Grace,Physics,95"]),
            )
            .await
            .unwrap(),
            spool_bytes(dir.path(), 1, "b.csv", csv(&[",Eve,Physics,91", ",Mallory,Physics,x"]))
                .await
                .unwrap(),
        ];

        process_files(Arc::clone(&ctx), files, 10).await;
        drop(ctx);

        let events = drain(rx).await;
        assert_eq!(terminal_for(&events, 0), vec![&StatusEvent::completed(0)]);
        let failed = terminal_for(&events, 1);
        assert_eq!(failed.len(), 1);
        assert!(failed[0].is_error());

        let names: Vec<String> = store.rows().await.into_iter().map(|s| s.name).collect();
        assert_eq!(names.len(), 3);
        assert!(!names.contains(&"Eve".to_string()));
    }

    #[tokio::test]
    async fn test_pool_never_exceeds_worker_cap() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));

        run_bounded((0..25).collect::<Vec<usize>>(), 10, |_| {
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            let finished = Arc::clone(&finished);
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                finished.fetch_add(1, Ordering::SeqCst);
            }
        })
        .await;

        assert_eq!(finished.load(Ordering::SeqCst), 25);
        assert!(peak.load(Ordering::SeqCst) <= 10);
        assert_eq!(active.load(Ordering::SeqCst), 0);
    }
}
