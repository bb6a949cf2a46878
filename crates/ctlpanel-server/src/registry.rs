//! Fixed-capacity session registry.
//!
//! One slot per admitted client. Acquire and release each run inside a
//! single critical section, so admission and slot assignment are one
//! decision and a slot is reused only after its holder was released.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use uuid::Uuid;

use crate::errors::RegistryError;

/// An admitted client. Owned by its connection worker.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    slot: usize,
    peer: SocketAddr,
    created_at: DateTime<Utc>,
    opened: Instant,
}

impl Session {
    /// Unique session id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Slot index in the registry.
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Remote address of the transport.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// When the session was admitted.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Time since admission.
    pub fn age(&self) -> Duration {
        self.opened.elapsed()
    }
}

/// What the registry keeps per occupied slot.
#[derive(Debug, Clone)]
struct SlotEntry {
    id: Uuid,
    peer: SocketAddr,
    created_at: DateTime<Utc>,
}

/// Read-only view of an occupied slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    /// Slot index.
    pub slot: usize,
    /// Session id.
    pub id: Uuid,
    /// Remote address.
    pub peer: String,
    /// Admission time.
    pub created_at: DateTime<Utc>,
}

/// Slot table shared by all connection workers.
pub struct SessionRegistry {
    slots: Mutex<Vec<Option<SlotEntry>>>,
}

impl SessionRegistry {
    /// Registry with `capacity` empty slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Mutex::new(vec![None; capacity]),
        }
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.lock().len()
    }

    /// Admit a client into the first free slot.
    pub fn acquire(&self, peer: SocketAddr) -> Result<Session, RegistryError> {
        let mut slots = self.slots.lock();
        let Some(slot) = slots.iter().position(Option::is_none) else {
            return Err(RegistryError::CapacityExceeded {
                capacity: slots.len(),
            });
        };

        let session = Session {
            id: Uuid::now_v7(),
            slot,
            peer,
            created_at: Utc::now(),
            opened: Instant::now(),
        };
        slots[slot] = Some(SlotEntry {
            id: session.id,
            peer,
            created_at: session.created_at,
        });
        Ok(session)
    }

    /// Free the slot held by `session`.
    pub fn release(&self, session: &Session) -> Result<(), RegistryError> {
        let mut slots = self.slots.lock();
        let entry = slots
            .iter_mut()
            .find(|s| s.as_ref().is_some_and(|e| e.id == session.id))
            .ok_or(RegistryError::NotFound {
                session_id: session.id,
            })?;
        *entry = None;
        Ok(())
    }

    /// Number of occupied slots.
    pub fn active_count(&self) -> usize {
        self.slots.lock().iter().flatten().count()
    }

    /// Whether every slot is occupied.
    pub fn is_full(&self) -> bool {
        self.slots.lock().iter().all(Option::is_some)
    }

    /// Occupied slots in slot order.
    pub fn snapshot(&self) -> Vec<SessionSummary> {
        self.slots
            .lock()
            .iter()
            .enumerate()
            .filter_map(|(slot, entry)| {
                entry.as_ref().map(|e| SessionSummary {
                    slot,
                    id: e.id,
                    peer: e.peer.to_string(),
                    created_at: e.created_at,
                })
            })
            .collect()
    }
}
