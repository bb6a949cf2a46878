//! Graceful shutdown coordination via `CancellationToken`.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::units::{StoppedUnit, UnitSet};

/// Pause between rounds when live units have no handle left to join.
const SETTLE_INTERVAL: Duration = Duration::from_millis(10);

/// Owns the shutdown signal and the set of live units.
pub struct ShutdownCoordinator {
    token: CancellationToken,
    units: Arc<UnitSet>,
    join_lock: tokio::sync::Mutex<()>,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator with an empty unit set.
    pub fn new() -> Self {
        let token = CancellationToken::new();
        Self {
            units: Arc::new(UnitSet::new(token.clone())),
            token,
            join_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Get a clone of the cancellation token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// The tracked units.
    pub fn units(&self) -> &Arc<UnitSet> {
        &self.units
    }

    /// Set the shutdown signal without joining anything.
    pub fn request_shutdown(&self) {
        self.token.cancel();
    }

    /// Whether a shutdown has been initiated.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Stop and join every tracked unit.
    ///
    /// 1. Set the shutdown signal
    /// 2. Cancel every unit's stop token and take its join handle
    /// 3. Join the taken handles; repeat until the unit set is empty
    ///
    /// Units spawned while joining are picked up by the next round.
    /// Concurrent callers are serialized; a later caller returns once the
    /// set is empty. There is no timeout.
    pub async fn stop_all(&self) {
        let _join = self.join_lock.lock().await;
        self.request_shutdown();
        info!(unit_count = self.units.len(), "stopping all units");

        let mut rounds = 0_u32;
        loop {
            let stopped = self.units.stop_and_take();
            if stopped.is_empty() {
                if self.units.is_empty() {
                    break;
                }
                tokio::time::sleep(SETTLE_INTERVAL).await;
                continue;
            }
            rounds += 1;
            join_round(stopped).await;
        }

        info!(rounds, "all units joined");
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

async fn join_round(stopped: Vec<StoppedUnit>) {
    let ids: Vec<_> = stopped.iter().map(|u| (u.id, u.kind)).collect();
    let results = futures::future::join_all(stopped.into_iter().map(|u| u.handle)).await;

    for ((id, kind), result) in ids.into_iter().zip(results) {
        match result {
            Ok(()) => debug!(unit = id, ?kind, "unit joined"),
            Err(e) if e.is_panic() => error!(unit = id, ?kind, "unit panicked before join"),
            Err(e) => warn!(unit = id, ?kind, error = %e, "unit aborted"),
        }
    }
}
