//! Set of live, joinable execution units.
//!
//! Every long-running task of the server (listener, health endpoint, one
//! worker per connection) is spawned through [`UnitSet::spawn`]. The task
//! removes its own entry when it ends, panics included, so membership
//! mirrors the tasks that have started and not yet terminated.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Identifier of a tracked unit.
pub type UnitId = u64;

/// What a unit does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    /// Accept loop.
    Listener,
    /// HTTP health endpoint.
    Health,
    /// Per-connection worker.
    Worker,
}

struct TrackedUnit {
    kind: UnitKind,
    stop: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

/// A unit whose stop token has been cancelled and whose handle was taken
/// for joining.
pub struct StoppedUnit {
    /// Unit id.
    pub id: UnitId,
    /// Unit kind.
    pub kind: UnitKind,
    /// Join handle.
    pub handle: JoinHandle<()>,
}

/// Live units, keyed by id.
pub struct UnitSet {
    root: CancellationToken,
    next_id: AtomicU64,
    units: Mutex<HashMap<UnitId, TrackedUnit>>,
}

impl UnitSet {
    /// Empty set whose unit stop tokens are children of `root`.
    pub fn new(root: CancellationToken) -> Self {
        Self {
            root,
            next_id: AtomicU64::new(1),
            units: Mutex::new(HashMap::new()),
        }
    }

    /// Spawn `make(stop)` as a tracked unit.
    ///
    /// `stop` is cancelled by [`UnitSet::stop`], by
    /// [`UnitSet::stop_and_take`], or when the root token is cancelled.
    /// The entry is inserted before the task can observe the set, and
    /// removed by the task itself when it finishes.
    pub fn spawn<F, Fut>(self: &Arc<Self>, kind: UnitKind, make: F) -> UnitId
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let stop = self.root.child_token();
        let fut = make(stop.clone());
        let guard = UnitGuard {
            set: Arc::clone(self),
            id,
            kind,
        };

        let mut units = self.units.lock();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            fut.await;
        });
        let _ = units.insert(
            id,
            TrackedUnit {
                kind,
                stop,
                handle: Some(handle),
            },
        );
        debug!(unit = id, ?kind, "unit spawned");
        id
    }

    /// Cancel one unit's stop token. Returns `false` if the unit is gone.
    pub fn stop(&self, id: UnitId) -> bool {
        match self.units.lock().get(&id) {
            Some(unit) => {
                unit.stop.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every unit's stop token and take the join handles that have
    /// not been taken yet.
    pub fn stop_and_take(&self) -> Vec<StoppedUnit> {
        let mut units = self.units.lock();
        units
            .iter_mut()
            .filter_map(|(&id, unit)| {
                unit.stop.cancel();
                unit.handle.take().map(|handle| StoppedUnit {
                    id,
                    kind: unit.kind,
                    handle,
                })
            })
            .collect()
    }

    /// Number of live units.
    pub fn len(&self) -> usize {
        self.units.lock().len()
    }

    /// Whether no unit is live.
    pub fn is_empty(&self) -> bool {
        self.units.lock().is_empty()
    }

    /// Number of live units of `kind`.
    pub fn count(&self, kind: UnitKind) -> usize {
        self.units.lock().values().filter(|u| u.kind == kind).count()
    }

    /// Whether `id` is still live.
    pub fn contains(&self, id: UnitId) -> bool {
        self.units.lock().contains_key(&id)
    }
}

/// Removes a unit's entry when its task ends.
struct UnitGuard {
    set: Arc<UnitSet>,
    id: UnitId,
    kind: UnitKind,
}

impl Drop for UnitGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            error!(unit = self.id, kind = ?self.kind, "unit panicked");
        }
        let _ = self.set.units.lock().remove(&self.id);
        debug!(unit = self.id, kind = ?self.kind, "unit exited");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn make_set() -> (CancellationToken, Arc<UnitSet>) {
        let root = CancellationToken::new();
        let set = Arc::new(UnitSet::new(root.clone()));
        (root, set)
    }

    async fn wait_until_empty(set: &UnitSet) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !set.is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn spawned_unit_is_tracked_until_it_ends() {
        let (_root, set) = make_set();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let id = set.spawn(UnitKind::Worker, |_stop| async move {
            let _ = rx.await;
        });

        assert!(set.contains(id));
        assert_eq!(set.count(UnitKind::Worker), 1);
        assert_eq!(set.count(UnitKind::Listener), 0);

        tx.send(()).unwrap();
        wait_until_empty(&set).await;
        assert!(!set.contains(id));
    }

    #[tokio::test]
    async fn immediately_finishing_unit_deregisters() {
        let (_root, set) = make_set();
        for _ in 0..50 {
            let _ = set.spawn(UnitKind::Worker, |_stop| async {});
        }
        wait_until_empty(&set).await;
    }

    #[tokio::test]
    async fn panicking_unit_deregisters() {
        let (_root, set) = make_set();
        let _ = set.spawn(UnitKind::Worker, |_stop| async {
            panic!("boom");
        });
        wait_until_empty(&set).await;
    }

    #[tokio::test]
    async fn stop_cancels_only_that_unit() {
        let (_root, set) = make_set();
        let (b_tx, b_rx) = tokio::sync::oneshot::channel();
        let a = set.spawn(UnitKind::Listener, |stop| async move {
            stop.cancelled().await;
        });
        let b = set.spawn(UnitKind::Worker, |stop| async move {
            let _ = b_tx.send(stop.clone());
            stop.cancelled().await;
        });
        let b_stop = b_rx.await.unwrap();

        assert!(set.stop(a));
        tokio::time::timeout(Duration::from_secs(5), async {
            while set.contains(a) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert!(set.contains(b));
        assert!(!b_stop.is_cancelled());

        for unit in set.stop_and_take() {
            unit.handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn stop_unknown_unit_returns_false() {
        let (_root, set) = make_set();
        assert!(!set.stop(999));
    }

    #[tokio::test]
    async fn root_cancel_reaches_unit_tokens() {
        let (root, set) = make_set();
        let _ = set.spawn(UnitKind::Worker, |stop| async move {
            stop.cancelled().await;
        });
        assert_eq!(set.len(), 1);
        root.cancel();
        wait_until_empty(&set).await;
    }

    #[tokio::test]
    async fn stop_and_take_returns_each_handle_once() {
        let (_root, set) = make_set();
        for _ in 0..3 {
            let _ = set.spawn(UnitKind::Worker, |stop| async move {
                stop.cancelled().await;
            });
        }

        let first = set.stop_and_take();
        assert_eq!(first.len(), 3);
        assert!(set.stop_and_take().is_empty());

        for unit in first {
            unit.handle.await.unwrap();
        }
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn ids_are_unique() {
        let (_root, set) = make_set();
        let a = set.spawn(UnitKind::Worker, |stop| async move {
            stop.cancelled().await;
        });
        let b = set.spawn(UnitKind::Worker, |stop| async move {
            stop.cancelled().await;
        });
        assert_ne!(a, b);
        for unit in set.stop_and_take() {
            unit.handle.await.unwrap();
        }
    }

    #[test]
    fn kind_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(UnitKind::Listener).unwrap(),
            serde_json::json!("listener")
        );
    }
}
