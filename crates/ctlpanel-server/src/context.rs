//! Shared state handed to the listener and every worker.

use std::sync::Arc;
use std::time::Instant;

use ctlpanel_core::{AudioDevice, CommandTable};
use metrics_exporter_prometheus::PrometheusHandle;

use crate::registry::SessionRegistry;
use crate::shutdown::ShutdownCoordinator;

/// Everything a unit needs, owned in one place.
///
/// Holds the three locks of the server: the slot table (inside
/// [`SessionRegistry`]), the unit table and the join lock (inside
/// [`ShutdownCoordinator`]).
pub struct ServerContext {
    /// Session slots.
    pub registry: SessionRegistry,
    /// Text command handlers.
    pub commands: CommandTable,
    /// Playback target for binary messages.
    pub audio: Arc<dyn AudioDevice>,
    /// Shutdown signal and tracked units.
    pub shutdown: ShutdownCoordinator,
    /// When the context was created.
    pub started_at: Instant,
    /// Renders `/metrics`; `None` when no recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

impl ServerContext {
    /// Context with `max_sessions` empty slots.
    pub fn new(max_sessions: usize, commands: CommandTable, audio: Arc<dyn AudioDevice>) -> Self {
        Self {
            registry: SessionRegistry::new(max_sessions),
            commands,
            audio,
            shutdown: ShutdownCoordinator::new(),
            started_at: Instant::now(),
            metrics: None,
        }
    }

    /// Attach a Prometheus handle for `/metrics`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}
