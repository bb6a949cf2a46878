//! # ctlpanel-server
//!
//! WebSocket control panel server.
//!
//! - [`registry`]: fixed-capacity session slots
//! - [`listener`]: accept loop spawning one worker per connection
//! - [`websocket`]: text dispatch and the per-connection state machine
//! - [`units`] and [`shutdown`]: tracked tasks and coordinated shutdown
//! - [`health`]: `/health` and `/metrics` over HTTP

#![deny(unsafe_code)]

pub mod config;
pub mod context;
pub mod errors;
pub mod health;
pub mod listener;
pub mod metrics;
pub mod registry;
pub mod server;
pub mod shutdown;
pub mod units;
pub mod websocket;

pub use config::ServerConfig;
pub use context::ServerContext;
pub use errors::{Closure, RegistryError, ServerError, WorkerError};
pub use registry::{Session, SessionRegistry, SessionSummary};
pub use server::{BoundAddrs, PanelServer};
pub use shutdown::ShutdownCoordinator;
pub use units::{UnitId, UnitKind, UnitSet};
