//! `PanelServer`: binds the listeners and owns the shared context.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ctlpanel_core::{AudioDevice, CommandTable};
use metrics_exporter_prometheus::PrometheusHandle;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::ServerConfig;
use crate::context::ServerContext;
use crate::errors::ServerError;
use crate::health;
use crate::listener;
use crate::units::{UnitId, UnitKind};

/// Addresses the server actually bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundAddrs {
    /// WebSocket listener.
    pub ws: SocketAddr,
    /// Health endpoint, if enabled.
    pub health: Option<SocketAddr>,
}

/// The control panel server.
pub struct PanelServer {
    config: ServerConfig,
    ctx: Arc<ServerContext>,
    started: AtomicBool,
    listener_unit: Mutex<Option<UnitId>>,
}

impl PanelServer {
    /// Create a server. Nothing is bound until [`PanelServer::start`].
    pub fn new(
        config: ServerConfig,
        commands: CommandTable,
        audio: Arc<dyn AudioDevice>,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        let mut ctx = ServerContext::new(config.max_sessions, commands, audio);
        ctx.metrics = metrics;
        Self {
            config,
            ctx: Arc::new(ctx),
            started: AtomicBool::new(false),
            listener_unit: Mutex::new(None),
        }
    }

    /// Bind the listeners and spawn their units.
    ///
    /// Both sockets are bound before anything is spawned, so a bind failure
    /// leaves no unit behind.
    pub async fn start(&self) -> Result<BoundAddrs, ServerError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ServerError::AlreadyStarted);
        }

        let ws_listener = listener::bind(&self.config.ws_addr()).await?;
        let health_listener = match self.config.health_addr() {
            Some(addr) => Some(listener::bind(&addr).await?),
            None => None,
        };

        let addrs = BoundAddrs {
            ws: ws_listener.local_addr()?,
            health: health_listener
                .as_ref()
                .map(tokio::net::TcpListener::local_addr)
                .transpose()?,
        };

        let units = self.ctx.shutdown.units();
        let ctx = Arc::clone(&self.ctx);
        let listener_id = units.spawn(UnitKind::Listener, move |stop| {
            listener::accept_loop(ws_listener, ctx, stop)
        });
        *self.listener_unit.lock() = Some(listener_id);

        if let Some(health_listener) = health_listener {
            let ctx = Arc::clone(&self.ctx);
            let _ = units.spawn(UnitKind::Health, move |stop| {
                health::serve(health_listener, ctx, stop)
            });
        }

        info!(
            ws = %addrs.ws,
            health = ?addrs.health,
            capacity = self.config.max_sessions,
            "server started"
        );
        Ok(addrs)
    }

    /// Stop accepting connections. Existing sessions are unaffected.
    ///
    /// Returns `false` if the listener is not running.
    pub fn stop_listener(&self) -> bool {
        self.listener_unit
            .lock()
            .is_some_and(|id| self.ctx.shutdown.units().stop(id))
    }

    /// Set the shutdown signal and join every unit.
    pub async fn stop_all(&self) {
        self.ctx.shutdown.stop_all().await;
        info!("server closed");
    }

    /// Set the shutdown signal only.
    pub fn request_shutdown(&self) {
        self.ctx.shutdown.request_shutdown();
    }

    /// Token cancelled when shutdown is requested.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.ctx.shutdown.token()
    }

    /// Shared state.
    pub fn context(&self) -> &Arc<ServerContext> {
        &self.ctx
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
