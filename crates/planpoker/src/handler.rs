//! Per-connection task: read frames, dispatch them, write the outbox.
//!
//! Each accepted connection gets its own Tokio task running
//! [`handle_connection`]. The task owns the socket. Events for the
//! connection, whether replies or room broadcasts, arrive on its inbox and
//! are written in the order they were queued.

use std::sync::Arc;

use planpoker_protocol::{ClientEvent, Codec, Envelope, ServerEvent};
use planpoker_store::Store;
use planpoker_transport::{Connection, ConnectionId, WebSocketConnection};
use tokio::time::Instant;

use crate::PlanpokerError;
use crate::server::ServerState;

/// Drop guard that tells the dispatcher the connection is gone when the
/// handler exits.
///
/// `Drop` is synchronous, so the async cleanup runs on a spawned task.
struct DisconnectGuard<S: Store, C: Codec> {
    conn_id: ConnectionId,
    state: Arc<ServerState<S, C>>,
}

impl<S: Store, C: Codec> Drop for DisconnectGuard<S, C> {
    fn drop(&mut self) {
        let conn_id = self.conn_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            state.dispatcher.disconnect(conn_id).await;
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<S, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<S, C>>,
) -> Result<(), PlanpokerError>
where
    S: Store,
    C: Codec,
{
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = %conn.peer_addr(), "handling new connection");

    let mut inbox = state.dispatcher.connect(conn_id).await?;
    let _guard = DisconnectGuard {
        conn_id,
        state: Arc::clone(&state),
    };

    let idle = tokio::time::sleep(state.idle_timeout);
    tokio::pin!(idle);

    loop {
        tokio::select! {
            biased;

            Some(event) = inbox.recv() => {
                send_event(&conn, &state.codec, &event).await?;
            }
            inbound = conn.recv() => {
                idle.as_mut().reset(Instant::now() + state.idle_timeout);
                match inbound {
                    Ok(Some(data)) => handle_frame(&state, conn_id, &data).await,
                    Ok(None) => {
                        tracing::debug!(%conn_id, "connection closed cleanly");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(%conn_id, error = %e, "recv error");
                        break;
                    }
                }
            }
            () = &mut idle => {
                tracing::info!(%conn_id, "connection idle, closing");
                break;
            }
        }
    }

    if let Err(e) = conn.close().await {
        tracing::debug!(%conn_id, error = %e, "close failed");
    }
    // _guard drops here → dispatcher disconnect fires.
    Ok(())
}

/// Decodes one inbound frame and hands it to the dispatcher.
async fn handle_frame<S, C>(state: &ServerState<S, C>, conn_id: ConnectionId, data: &[u8])
where
    S: Store,
    C: Codec,
{
    let decoded = state
        .codec
        .decode::<Envelope>(data)
        .and_then(ClientEvent::from_envelope);

    match decoded {
        Ok(event) => {
            tracing::debug!(%conn_id, event = event.name(), "event received");
            state.dispatcher.handle(conn_id, event).await;
        }
        Err(e) => state.dispatcher.reject(conn_id, &e).await,
    }
}

async fn send_event(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    event: &ServerEvent,
) -> Result<(), PlanpokerError> {
    let text = codec.encode(event)?;
    conn.send(&text).await?;
    Ok(())
}
