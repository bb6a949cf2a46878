//! WebSocket message dispatch and the per-connection worker.

pub mod handler;
pub mod worker;
