//! Connection registry — counts inbound peers and gates the heartbeat.
//!
//! The heartbeat runs if and only if the node is serving and no inbound
//! connection is open. Every change to either input is followed by a
//! re-evaluation; re-evaluations are serialized so the last one always sees
//! the latest count.

use crate::heartbeat::HeartbeatEmitter;

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Server-side bookkeeping of open inbound connections.
pub struct ConnectionRegistry {
    active: AtomicUsize,
    accepted_total: AtomicU64,
    serving: AtomicBool,
    heartbeat: HeartbeatEmitter,
    reconcile_lock: Mutex<()>,
}

impl ConnectionRegistry {
    pub fn new(heartbeat: HeartbeatEmitter) -> Self {
        Self {
            active: AtomicUsize::new(0),
            accepted_total: AtomicU64::new(0),
            serving: AtomicBool::new(false),
            heartbeat,
            reconcile_lock: Mutex::new(()),
        }
    }

    /// Record an accepted connection. The returned guard calls
    /// [`ConnectionRegistry::on_close`] when dropped.
    pub fn on_accept(self: &Arc<Self>) -> ConnectionGuard {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.accepted_total.fetch_add(1, Ordering::Relaxed);
        debug!(active, "connection opened");
        self.reconcile();
        ConnectionGuard {
            registry: Arc::clone(self),
        }
    }

    /// Record a closed connection. The count saturates at zero.
    pub fn on_close(&self) {
        match self
            .active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        {
            Ok(previous) => debug!(active = previous - 1, "connection closed"),
            Err(_) => warn!("connection close with no open connections"),
        }
        self.reconcile();
    }

    /// The listener is up: heartbeats may run.
    pub fn open(&self) {
        self.serving.store(true, Ordering::SeqCst);
        self.reconcile();
    }

    /// The listener is gone: heartbeats must stop.
    pub fn close(&self) {
        self.serving.store(false, Ordering::SeqCst);
        self.reconcile();
    }

    /// Open inbound connections right now.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Connections accepted over the registry's lifetime.
    pub fn accepted_total(&self) -> u64 {
        self.accepted_total.load(Ordering::Relaxed)
    }

    pub fn is_serving(&self) -> bool {
        self.serving.load(Ordering::SeqCst)
    }

    pub fn heartbeat(&self) -> &HeartbeatEmitter {
        &self.heartbeat
    }

    fn reconcile(&self) {
        let _gate = self.reconcile_lock.lock().unwrap_or_else(|e| e.into_inner());
        let idle = self.active.load(Ordering::SeqCst) == 0;
        if self.serving.load(Ordering::SeqCst) && idle {
            if self.heartbeat.start() {
                debug!("heartbeat resumed");
            }
        } else if self.heartbeat.stop() {
            debug!("heartbeat suppressed");
        }
    }
}

/// Holds one slot in [`ConnectionRegistry`]'s count for as long as it lives.
pub struct ConnectionGuard {
    registry: Arc<ConnectionRegistry>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.registry.on_close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::EventBus;
    use std::time::Duration;

    fn registry() -> Arc<ConnectionRegistry> {
        let bus = Arc::new(EventBus::new());
        let heartbeat = HeartbeatEmitter::new(Duration::from_millis(20), bus);
        Arc::new(ConnectionRegistry::new(heartbeat))
    }

    fn heartbeat_matches(registry: &ConnectionRegistry) -> bool {
        registry.heartbeat().is_running() == (registry.is_serving() && registry.active() == 0)
    }

    #[tokio::test]
    async fn test_heartbeat_follows_serving_and_count() {
        let registry = registry();
        assert!(!registry.heartbeat().is_running());

        registry.open();
        assert!(registry.heartbeat().is_running());

        let guard = registry.on_accept();
        assert_eq!(registry.active(), 1);
        assert!(!registry.heartbeat().is_running());

        drop(guard);
        assert_eq!(registry.active(), 0);
        assert!(registry.heartbeat().is_running());

        registry.close();
        assert!(!registry.heartbeat().is_running());
    }

    #[tokio::test]
    async fn test_not_serving_never_beats() {
        let registry = registry();
        let guard = registry.on_accept();
        drop(guard);
        assert!(!registry.heartbeat().is_running());
    }

    #[tokio::test]
    async fn test_close_without_open_saturates() {
        let registry = registry();
        registry.on_close();
        registry.on_close();
        assert_eq!(registry.active(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_accept_close_burst() {
        let registry = registry();
        registry.open();

        let mut tasks = Vec::new();
        for _ in 0..64 {
            let registry = Arc::clone(&registry);
            tasks.push(tokio::spawn(async move {
                let guard = registry.on_accept();
                tokio::task::yield_now().await;
                drop(guard);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(registry.active(), 0);
        assert_eq!(registry.accepted_total(), 64);
        assert!(heartbeat_matches(&registry));
        assert!(registry.heartbeat().is_running());
    }

    #[tokio::test]
    async fn test_burst_of_accepts_then_closes() {
        let registry = registry();
        registry.open();

        let guards: Vec<_> = (0..10).map(|_| registry.on_accept()).collect();
        assert_eq!(registry.active(), 10);
        assert!(heartbeat_matches(&registry));
        assert!(!registry.heartbeat().is_running());

        for guard in guards {
            drop(guard);
            assert!(heartbeat_matches(&registry));
        }
        assert_eq!(registry.active(), 0);
        assert!(registry.heartbeat().is_running());
    }
}
