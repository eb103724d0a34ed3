//! Byte-position progress tracking and the status conduit

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use roster_common::types::StatusEvent;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::{mpsc, watch, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

/// Rows read before the tracker switches to the steady interval.
pub const EARLY_ROWS: usize = 10;
pub const EARLY_INTERVAL: Duration = Duration::from_millis(50);
pub const STEADY_INTERVAL: Duration = Duration::from_millis(100);

/// In-flight ticks stay below 100, which only a completed file reports.
pub const IN_FLIGHT_MAX_PERCENT: f64 = 99.9;

/// Shared count of bytes pulled from the underlying file.
#[derive(Debug, Clone, Default)]
pub struct ByteCounter(Arc<AtomicU64>);

impl ByteCounter {
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }
}

/// Reader that counts every byte it hands to the CSV decoder.
pub struct CountingReader<R> {
    inner: R,
    counter: ByteCounter,
}

impl<R> CountingReader<R> {
    pub fn new(inner: R, counter: ByteCounter) -> Self {
        Self { inner, counter }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for CountingReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        let poll = Pin::new(&mut this.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = poll {
            this.counter.add((buf.filled().len() - before) as u64);
        }
        poll
    }
}

/// Decides when a file's progress is due and computes percent and ETA.
#[derive(Debug)]
pub struct ProgressTracker {
    file_index: usize,
    file_size: u64,
    started: Instant,
    last_emit: Instant,
}

impl ProgressTracker {
    pub fn new(file_index: usize, file_size: u64) -> Self {
        let now = Instant::now();
        Self {
            file_index,
            file_size,
            started: now,
            last_emit: now,
        }
    }

    fn interval(rows_read: usize) -> Duration {
        if rows_read <= EARLY_ROWS {
            EARLY_INTERVAL
        } else {
            STEADY_INTERVAL
        }
    }

    /// Returns an event when the throttle interval has elapsed since the last one.
    pub fn poll(&mut self, rows_read: usize, consumed: u64) -> Option<StatusEvent> {
        let now = Instant::now();
        if now.duration_since(self.last_emit) <= Self::interval(rows_read) {
            return None;
        }
        self.last_emit = now;
        Some(self.snapshot(consumed))
    }

    pub fn percent(&self, consumed: u64) -> f64 {
        if self.file_size == 0 {
            return 100.0;
        }
        (consumed as f64 / self.file_size as f64 * 100.0).clamp(0.0, 100.0)
    }

    /// Remaining bytes divided by the observed read rate.
    pub fn seconds_remaining(&self, consumed: u64) -> f64 {
        let elapsed = self.started.elapsed().as_secs_f64();
        if consumed == 0 || elapsed <= 0.0 {
            return 0.0;
        }
        let rate = consumed as f64 / elapsed;
        let remaining = self.file_size.saturating_sub(consumed) as f64;
        remaining / rate
    }

    pub fn snapshot(&self, consumed: u64) -> StatusEvent {
        StatusEvent::progress(
            self.file_index,
            self.percent(consumed).min(IN_FLIGHT_MAX_PERCENT),
            self.seconds_remaining(consumed),
        )
    }
}

/// An event in the conduit, holding a progress slot if it is a tick.
#[derive(Debug)]
struct Queued {
    event: StatusEvent,
    _slot: Option<OwnedSemaphorePermit>,
}

/// Opens a status conduit with `ticks` slots for progress events and
/// `reserved` more that only terminal events use.
pub fn status_conduit(ticks: usize, reserved: usize) -> (StatusSender, StatusReceiver) {
    let (tx, rx) = mpsc::channel((ticks + reserved).max(1));
    let (attached, watching) = watch::channel(false);
    let sender = StatusSender {
        tx,
        ticks: Arc::new(Semaphore::new(ticks)),
        attached: watching,
    };
    (sender, StatusReceiver { rx, attached })
}

/// Send side of an upload's status conduit.
///
/// Terminal events always fit. While a subscriber is attached a tick waits
/// for a free progress slot, so a slow reader slows decoding down. With no
/// subscriber, ticks that find no free slot are dropped.
#[derive(Debug, Clone)]
pub struct StatusSender {
    tx: mpsc::Sender<Queued>,
    ticks: Arc<Semaphore>,
    attached: watch::Receiver<bool>,
}

impl StatusSender {
    pub async fn send(&self, event: StatusEvent) {
        let queued = Queued { event, _slot: None };
        if self.tx.send(queued).await.is_err() {
            tracing::debug!("status conduit dropped, event discarded");
        }
    }

    pub async fn tick(&self, event: StatusEvent) {
        let slot = match Arc::clone(&self.ticks).try_acquire_owned() {
            Ok(slot) => slot,
            Err(_) => {
                let watched = *self.attached.borrow();
                if !watched {
                    return;
                }
                tokio::select! {
                    slot = Arc::clone(&self.ticks).acquire_owned() => match slot {
                        Ok(slot) => slot,
                        Err(_) => return,
                    },
                    _ = detached(self.attached.clone()) => return,
                }
            },
        };
        let _ = self.tx.try_send(Queued {
            event,
            _slot: Some(slot),
        });
    }
}

/// Resolves once no subscriber holds the conduit.
async fn detached(mut attached: watch::Receiver<bool>) {
    loop {
        let on = *attached.borrow_and_update();
        if !on || attached.changed().await.is_err() {
            return;
        }
    }
}

/// Receive side of a status conduit.
#[derive(Debug)]
pub struct StatusReceiver {
    rx: mpsc::Receiver<Queued>,
    attached: watch::Sender<bool>,
}

impl StatusReceiver {
    /// Next event, or `None` once every sender is gone and the buffer is empty.
    pub async fn recv(&mut self) -> Option<StatusEvent> {
        self.rx.recv().await.map(|queued| queued.event)
    }

    pub fn is_closed(&self) -> bool {
        self.rx.is_closed()
    }

    /// Marks whether a subscriber is reading.
    pub fn set_attached(&self, attached: bool) {
        self.attached.send_replace(attached);
    }
}
