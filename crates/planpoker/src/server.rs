//! `PlanpokerServer` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → dispatcher → room
//! engine → store.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use planpoker_protocol::{Codec, JsonCodec};
use planpoker_room::{RoomConfig, RoomService};
use planpoker_store::Store;
use planpoker_transport::{Transport, WebSocketTransport};

use crate::handler::handle_connection;
use crate::{Dispatcher, PlanpokerError};

/// Shared server state passed to each connection task.
pub(crate) struct ServerState<S: Store, C: Codec> {
    pub(crate) dispatcher: Dispatcher<S>,
    pub(crate) codec: C,
    pub(crate) idle_timeout: Duration,
}

/// Builder for configuring and starting a planpoker server.
///
/// # Example
///
/// ```rust,no_run
/// use planpoker::prelude::*;
///
/// # async fn run() -> Result<(), PlanpokerError> {
/// let server = PlanpokerServerBuilder::new()
///     .bind("0.0.0.0:8000")
///     .build(MemoryStore::new())
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct PlanpokerServerBuilder {
    bind_addr: String,
    room_config: RoomConfig,
    idle_timeout: Duration,
}

impl PlanpokerServerBuilder {
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8000".to_string(),
            room_config: RoomConfig::default(),
            idle_timeout: Duration::from_secs(60),
        }
    }

    /// Sets the WebSocket listen address. Port `0` picks a free port.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    /// Sets how long a connection may stay silent before it is closed.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Binds the listener and assembles the server over `store`.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build<S: Store>(
        self,
        store: S,
    ) -> Result<PlanpokerServer<S, JsonCodec>, PlanpokerError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            dispatcher: Dispatcher::new(RoomService::new(store, self.room_config)),
            codec: JsonCodec,
            idle_timeout: self.idle_timeout,
        });

        Ok(PlanpokerServer { transport, state })
    }
}

impl Default for PlanpokerServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound planpoker server.
///
/// Call [`run()`](Self::run) or [`run_until()`](Self::run_until) to start
/// accepting connections.
pub struct PlanpokerServer<S: Store, C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<S, C>>,
}

impl<S, C> PlanpokerServer<S, C>
where
    S: Store,
    C: Codec,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    pub fn dispatcher(&self) -> &Dispatcher<S> {
        &self.state.dispatcher
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), PlanpokerError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` completes.
    ///
    /// Connection tasks already running are left to finish on their own.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<(), PlanpokerError>
    where
        F: Future<Output = ()>,
    {
        tracing::info!(addr = ?self.local_addr().ok(), "planpoker server running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("shutting down");
                    return Ok(());
                }
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                    }
                }
            }
        }
    }
}
