//! # PubSub Adapter
//!
//! Wires the HTTP listener to the bridge and exposes the consumer side.
//!
//! ```rust,no_run
//! use pubsub_adapter::{AdapterConfig, JsonRegistrationParser, PubSubAdapter};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let adapter = PubSubAdapter::start(AdapterConfig::from_env()?, JsonRegistrationParser::new()).await?;
//!
//! while let Ok((registration, acker)) = adapter.next_registration().await {
//!     println!("registering {}", registration.dev_addr);
//!     acker.ack(200, "registered")?;
//! }
//!
//! adapter.shutdown().await?;
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::bridge::{AckNacker, Bridge, BridgeProcessingStats};
use crate::config::AdapterConfig;
use crate::error::{AdapterResult, BridgeError};
use crate::parser::Parser;
use crate::registration::Registration;
use crate::web::{create_app, state::AppState};

/// How long shutdown waits for in-flight requests before aborting the server
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// HTTP registration adapter with a single-consumer pull interface
pub struct PubSubAdapter {
    bridge: Bridge,
    local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    server_handle: Option<JoinHandle<()>>,
}

impl PubSubAdapter {
    /// Bind the listener and start serving registrations
    pub async fn start<P: Parser>(config: AdapterConfig, parser: P) -> AdapterResult<Self> {
        Self::start_with_bridge(config, Arc::new(parser), Bridge::new()).await
    }

    /// Start serving with a caller-provided bridge and parser
    pub async fn start_with_bridge(
        config: AdapterConfig,
        parser: Arc<dyn Parser>,
        bridge: Bridge,
    ) -> AdapterResult<Self> {
        config.validate()?;
        let socket_addr = config.socket_addr()?;

        let listener = TcpListener::bind(socket_addr).await?;
        let local_addr = listener.local_addr()?;

        let app = create_app(AppState::new(bridge.clone(), parser, config));
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        info!(port = local_addr.port(), address = %local_addr, "Starting Server");

        let server_handle = tokio::spawn(async move {
            let served = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await;

            match served {
                Ok(()) => info!("HTTP server stopped"),
                Err(e) => warn!(error = %e, "HTTP connection lost"),
            }
        });

        Ok(Self {
            bridge,
            local_addr,
            shutdown_tx: Some(shutdown_tx),
            server_handle: Some(server_handle),
        })
    }

    /// Wait for the next registration and the capability to answer it
    pub async fn next_registration(&self) -> Result<(Registration, AckNacker), BridgeError> {
        self.bridge.next_registration().await
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    pub fn stats(&self) -> BridgeProcessingStats {
        self.bridge.stats()
    }

    /// Close the bridge and stop the HTTP server
    ///
    /// Callers still waiting for a consumer receive `503 Core server not
    /// responding`. The server gets a short grace period to flush in-flight
    /// responses before it is aborted.
    pub async fn shutdown(mut self) -> AdapterResult<()> {
        self.bridge.close();

        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }

        if let Some(mut handle) = self.server_handle.take() {
            match tokio::time::timeout(SHUTDOWN_GRACE_PERIOD, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "HTTP server task failed"),
                Err(_) => {
                    warn!(
                        grace_period_ms = SHUTDOWN_GRACE_PERIOD.as_millis() as u64,
                        "HTTP server did not stop in time; aborting"
                    );
                    handle.abort();
                }
            }
        }

        info!(stats = ?self.bridge.stats(), "Adapter shut down");
        Ok(())
    }
}

impl Drop for PubSubAdapter {
    fn drop(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            self.bridge.close();
            let _ = shutdown_tx.send(());
        }
    }
}

impl std::fmt::Debug for PubSubAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PubSubAdapter")
            .field("local_addr", &self.local_addr)
            .field("bridge", &self.bridge)
            .finish_non_exhaustive()
    }
}
