//! Server error types.

use std::net::SocketAddr;

use thiserror::Error;
use tokio_tungstenite::tungstenite;
use uuid::Uuid;

/// Session registry failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Every slot is occupied.
    #[error("all {capacity} session slots are occupied")]
    CapacityExceeded {
        /// Registry capacity.
        capacity: usize,
    },
    /// The session is not in the registry (double release, or never admitted).
    #[error("session {session_id} is not registered")]
    NotFound {
        /// Id of the session that was released.
        session_id: Uuid,
    },
}

/// How the remote end went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Closure {
    /// Close handshake completed or the stream ended normally.
    Clean,
    /// Reset, I/O error or protocol violation.
    Dirty,
}

/// Errors that end a connection worker.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// WebSocket upgrade failed before a session existed.
    #[error("websocket handshake with {peer} failed: {source}")]
    Handshake {
        /// Remote address.
        peer: SocketAddr,
        /// Underlying error.
        #[source]
        source: tungstenite::Error,
    },
    /// A message that is neither text nor binary.
    #[error("unsupported message type: {kind}")]
    UnsupportedMessageType {
        /// Short description of the frame.
        kind: &'static str,
    },
    /// Reading from or writing to the transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] tungstenite::Error),
}

impl WorkerError {
    /// Classify a transport error as a clean or dirty disconnect.
    pub fn closure(err: &tungstenite::Error) -> Closure {
        match err {
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                Closure::Clean
            }
            _ => Closure::Dirty,
        }
    }
}

/// Server startup failures.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A listening socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The server was started twice.
    #[error("server already started")]
    AlreadyStarted,
    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
