//! Registry of live upload sessions
//!
//! Each upload gets a bounded status conduit. The registry keeps the
//! receiving half, keyed by tracking id, until a subscriber drains it to the
//! end or the janitor prunes it after the retention period.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use roster_common::types::StatusEvent;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::progress::{status_conduit, StatusReceiver, StatusSender};

pub type Conduit = Arc<Mutex<StatusReceiver>>;

/// Exclusive hold on a session's conduit, released on drop.
///
/// While held, the file tasks wait for the holder to read progress instead
/// of dropping it.
pub struct ConduitGuard(OwnedMutexGuard<StatusReceiver>);

impl ConduitGuard {
    fn new(receiver: OwnedMutexGuard<StatusReceiver>) -> Self {
        receiver.set_attached(true);
        Self(receiver)
    }

    pub async fn recv(&mut self) -> Option<StatusEvent> {
        self.0.recv().await
    }
}

impl Drop for ConduitGuard {
    fn drop(&mut self) {
        self.0.set_attached(false);
    }
}

#[derive(Debug, Clone)]
pub struct UploadSession {
    pub id: Uuid,
    pub conduit: Conduit,
    pub cancel: CancellationToken,
    pub created_at: DateTime<Utc>,
}

impl UploadSession {
    /// Takes the conduit unless another subscriber already holds it.
    pub fn claim(&self) -> Option<ConduitGuard> {
        Arc::clone(&self.conduit)
            .try_lock_owned()
            .ok()
            .map(ConduitGuard::new)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<HashMap<Uuid, UploadSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a session and returns its id with the conduit's send side.
    ///
    /// The conduit holds `capacity` progress events plus `reserved` slots
    /// that only terminal events use.
    pub async fn register(
        &self,
        capacity: usize,
        reserved: usize,
        cancel: CancellationToken,
    ) -> (Uuid, StatusSender) {
        let (status, receiver) = status_conduit(capacity, reserved);
        let session = UploadSession {
            id: Uuid::new_v4(),
            conduit: Arc::new(Mutex::new(receiver)),
            cancel,
            created_at: Utc::now(),
        };
        let id = session.id;
        self.sessions.lock().await.insert(id, session);
        tracing::debug!(upload_id = %id, "upload session registered");
        (id, status)
    }

    pub async fn lookup(&self, id: Uuid) -> Option<UploadSession> {
        self.sessions.lock().await.get(&id).cloned()
    }

    pub async fn remove(&self, id: Uuid) -> Option<UploadSession> {
        let removed = self.sessions.lock().await.remove(&id);
        if removed.is_some() {
            tracing::debug!(upload_id = %id, "upload session removed");
        }
        removed
    }

    /// Signals the session's file tasks to stop. Returns false for unknown ids.
    pub async fn cancel(&self, id: Uuid) -> bool {
        match self.lookup(id).await {
            Some(session) => {
                session.cancel.cancel();
                true
            },
            None => false,
        }
    }

    /// Drops sessions older than `retention` whose pipeline has finished.
    ///
    /// A session currently held by a subscriber is left alone; the
    /// subscriber removes it once it reads the end of the conduit.
    pub async fn prune(&self, retention: Duration) -> usize {
        let cutoff = chrono::Duration::from_std(retention)
            .map(|age| Utc::now() - age)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, session| {
            if session.created_at > cutoff {
                return true;
            }
            match session.conduit.try_lock() {
                Ok(rx) => !rx.is_closed(),
                Err(_) => true,
            }
        });
        let pruned = before - sessions.len();
        if pruned > 0 {
            tracing::info!(pruned, remaining = sessions.len(), "pruned finished upload sessions");
        }
        pruned
    }

    /// Runs [`prune`](Self::prune) every `retention / 2` until `shutdown` fires.
    pub fn spawn_janitor(
        &self,
        retention: Duration,
        shutdown: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let registry = self.clone();
        let period = (retention / 2).max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        registry.prune(retention).await;
                    },
                }
            }
            tracing::debug!("session janitor stopped");
        })
    }
}
