//! Intake coordinator
//!
//! Accepts spooled files, registers a tracked session and runs validation
//! and the file pool in the background. The caller gets the tracking id
//! back before any file has been read.

use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use roster_common::types::{Record, StatusEvent};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::Instrument;
use uuid::Uuid;

use super::bulk::BulkWriter;
use super::mapper::RowMapper;
use super::session::SessionRegistry;
use super::validation::validate_files;
use super::worker::{process_files, WorkerContext};
use crate::config::IngestConfig;
use crate::store::RecordStore;

/// One uploaded file, copied to an unnamed temporary file.
///
/// The backing file is removed by the OS once the handle is dropped.
#[derive(Debug)]
pub struct SpooledFile {
    pub index: usize,
    pub name: String,
    pub file: tokio::fs::File,
}

/// Copies a stream of byte chunks into a fresh temporary file in `dir`,
/// leaving it rewound to the start.
pub async fn spool_stream<S, B, E>(
    dir: &Path,
    index: usize,
    name: impl Into<String>,
    mut chunks: S,
) -> std::io::Result<SpooledFile>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let mut file = tokio::fs::File::from_std(tempfile::tempfile_in(dir)?);
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.map_err(std::io::Error::other)?;
        file.write_all(chunk.as_ref()).await?;
    }
    file.flush().await?;
    file.seek(SeekFrom::Start(0)).await?;

    Ok(SpooledFile {
        index,
        name: name.into(),
        file,
    })
}

pub async fn spool_bytes(
    dir: &Path,
    index: usize,
    name: impl Into<String>,
    bytes: impl AsRef<[u8]>,
) -> std::io::Result<SpooledFile> {
    let chunks = futures::stream::iter([Ok::<_, std::io::Error>(bytes.as_ref().to_vec())]);
    spool_stream(dir, index, name, chunks).await
}

pub struct IntakeCoordinator<R, S: ?Sized, M> {
    registry: SessionRegistry,
    writer: BulkWriter<R, S>,
    mapper: Arc<M>,
    header: &'static [&'static str],
    settings: IngestConfig,
    shutdown: CancellationToken,
    runs: TaskTracker,
}

impl<R, S, M> IntakeCoordinator<R, S, M>
where
    R: Record,
    S: RecordStore<R> + ?Sized + 'static,
    M: RowMapper<R> + 'static,
{
    pub fn new(
        registry: SessionRegistry,
        store: Arc<S>,
        mapper: M,
        header: &'static [&'static str],
        settings: IngestConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            registry,
            writer: BulkWriter::new(store, settings.shard_count),
            mapper: Arc::new(mapper),
            header,
            settings,
            shutdown,
            runs: TaskTracker::new(),
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &IngestConfig {
        &self.settings
    }

    /// Waits up to `grace` for every launched upload to return.
    ///
    /// Call after cancelling the shutdown token: file tasks then stop at
    /// their next flush boundary, and a write already under way finishes.
    /// Returns false if runs were still going when `grace` ran out.
    pub async fn drain(&self, grace: Duration) -> bool {
        self.runs.close();
        let running = self.runs.len();
        if running > 0 {
            tracing::info!(running, "waiting for upload runs to finish");
        }
        tokio::time::timeout(grace, self.runs.wait()).await.is_ok()
    }

    /// Registers a session for `files` and starts processing them.
    ///
    /// Returns the tracking id immediately. The session's conduit closes
    /// once every file task has finished.
    pub async fn launch(&self, files: Vec<SpooledFile>) -> Uuid {
        let cancel = self.shutdown.child_token();
        // per file an opening and a terminal event, or a single rejection
        let reserved = 2 * files.len() + 1;
        let (id, status) = self
            .registry
            .register(self.settings.conduit_capacity, reserved, cancel.clone())
            .await;

        let ctx = Arc::new(WorkerContext {
            writer: self.writer.clone(),
            mapper: Arc::clone(&self.mapper),
            batch_size: self.settings.batch_size,
            cancel,
            status,
        });
        let header = self.header;
        let max_workers = self.settings.max_workers;
        let span = tracing::info_span!("upload", upload_id = %id, files = files.len());

        self.runs.spawn(
            async move {
                run_upload(ctx, files, header, max_workers).await;
            }
            .instrument(span),
        );

        id
    }
}

async fn run_upload<R, S, M>(
    ctx: Arc<WorkerContext<R, S, M>>,
    mut files: Vec<SpooledFile>,
    header: &'static [&'static str],
    max_workers: usize,
) where
    R: Record,
    S: RecordStore<R> + ?Sized + 'static,
    M: RowMapper<R> + 'static,
{
    tracing::info!("validating upload");
    if let Err(e) = validate_files(&mut files, header).await {
        tracing::warn!(error = %e, "upload rejected");
        ctx.status.send(StatusEvent::rejected(e.to_string())).await;
        return;
    }

    process_files(ctx, files, max_workers).await;
    tracing::info!("upload finished");
}
