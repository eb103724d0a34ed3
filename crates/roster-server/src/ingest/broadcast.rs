//! Progress broadcaster
//!
//! Streams a session's status conduit to one WebSocket subscriber. One loop
//! forwards events as JSON text frames; a second task reads from the client
//! only to notice when it goes away.

use axum::extract::ws::Message;
use futures::{Sink, SinkExt, Stream, StreamExt};
use roster_common::types::StatusEvent;
use roster_common::RosterError;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::session::{ConduitGuard, SessionRegistry};

/// How a subscription ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// All file tasks finished and every event was delivered.
    Completed,
    /// The client disconnected; the session stays registered.
    ClientGone,
    /// A frame could not be written to the client.
    WriteFailed,
}

pub fn encode(event: &StatusEvent) -> Result<Message, RosterError> {
    Ok(Message::Text(serde_json::to_string(event)?))
}

async fn send_event<W>(writer: &mut W, event: &StatusEvent) -> bool
where
    W: Sink<Message> + Unpin,
{
    match encode(event) {
        Ok(frame) => writer.send(frame).await.is_ok(),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode status event");
            false
        },
    }
}

/// Blocks on client reads until the stream errors, ends or sends a close frame.
async fn watch_disconnect<C, E>(mut client: C, gone: CancellationToken)
where
    C: Stream<Item = Result<Message, E>> + Unpin,
{
    while let Some(frame) = client.next().await {
        match frame {
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {},
        }
    }
    gone.cancel();
}

/// Sends the opening heartbeat, then forwards conduit events until the
/// conduit closes, the client leaves or a write fails.
pub async fn pump<W, C, E>(
    mut writer: W,
    client: C,
    conduit: &mut ConduitGuard,
) -> StreamEnd
where
    W: Sink<Message> + Unpin,
    C: Stream<Item = Result<Message, E>> + Unpin + Send + 'static,
    E: Send + 'static,
{
    if !send_event(&mut writer, &StatusEvent::heartbeat()).await {
        return StreamEnd::WriteFailed;
    }

    let gone = CancellationToken::new();
    let watcher = tokio::spawn(watch_disconnect(client, gone.clone()));

    let end = loop {
        tokio::select! {
            biased;
            _ = gone.cancelled() => break StreamEnd::ClientGone,
            event = conduit.recv() => match event {
                Some(event) => {
                    if !send_event(&mut writer, &event).await {
                        break StreamEnd::WriteFailed;
                    }
                },
                None => break StreamEnd::Completed,
            },
        }
    };

    watcher.abort();
    let _ = writer.close().await;
    end
}

/// Streams one session and removes it from the registry once it has been
/// delivered in full.
pub async fn stream_session<W, C, E>(
    registry: SessionRegistry,
    upload_id: Uuid,
    mut conduit: ConduitGuard,
    writer: W,
    client: C,
) -> StreamEnd
where
    W: Sink<Message> + Unpin,
    C: Stream<Item = Result<Message, E>> + Unpin + Send + 'static,
    E: Send + 'static,
{
    tracing::info!(%upload_id, "subscriber attached");
    let end = pump(writer, client, &mut conduit).await;

    match end {
        StreamEnd::Completed => {
            registry.remove(upload_id).await;
            tracing::info!(%upload_id, "upload stream completed");
        },
        StreamEnd::ClientGone | StreamEnd::WriteFailed => {
            tracing::info!(%upload_id, ?end, "subscriber detached, session retained");
        },
    }
    end
}
