//! Process supervision — shutdown signaling and role-cycle accounting.

use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::info;

/// Shutdown signal manager with cycle accounting.
pub struct Supervisor {
    /// Send side of the shutdown signal.
    shutdown_tx: watch::Sender<bool>,
    /// Receive side of the shutdown signal (clonable).
    shutdown_rx: watch::Receiver<bool>,
    /// Arbitration steps completed (decisions and role loops).
    cycle_count: AtomicU64,
    /// Role loops that ended in a role change.
    transition_count: AtomicU64,
}

impl Supervisor {
    /// Create a new supervisor.
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            shutdown_tx: tx,
            shutdown_rx: rx,
            cycle_count: AtomicU64::new(0),
            transition_count: AtomicU64::new(0),
        }
    }

    /// Get a receiver that will be notified on shutdown.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    /// Trigger a graceful shutdown.
    pub fn shutdown(&self) {
        info!("Supervisor: initiating graceful shutdown");
        let _ = self.shutdown_tx.send(true);
    }

    /// Check if shutdown has been requested.
    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// Record a completed arbitration step.
    pub fn record_cycle(&self) {
        self.cycle_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a role change.
    pub fn record_transition(&self) {
        self.transition_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycle_count.load(Ordering::Relaxed)
    }

    pub fn transition_count(&self) -> u64 {
        self.transition_count.load(Ordering::Relaxed)
    }

    /// Get a health summary.
    pub fn health(&self) -> SupervisorHealth {
        SupervisorHealth {
            is_shutting_down: self.is_shutting_down(),
            cycle_count: self.cycle_count(),
            transition_count: self.transition_count(),
        }
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

/// Health report from the supervisor.
#[derive(Debug, Clone)]
pub struct SupervisorHealth {
    pub is_shutting_down: bool,
    pub cycle_count: u64,
    pub transition_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown() {
        let supervisor = Supervisor::new();
        assert!(!supervisor.is_shutting_down());
        supervisor.shutdown();
        assert!(supervisor.is_shutting_down());
    }

    #[test]
    fn test_subscribe() {
        let supervisor = Supervisor::new();
        let rx = supervisor.subscribe();
        assert!(!*rx.borrow());
        supervisor.shutdown();
        assert!(rx.has_changed().unwrap());
    }

    #[test]
    fn test_cycle_and_transition_tracking() {
        let supervisor = Supervisor::new();
        supervisor.record_cycle();
        supervisor.record_cycle();
        supervisor.record_transition();

        let health = supervisor.health();
        assert!(!health.is_shutting_down);
        assert_eq!(health.cycle_count, 2);
        assert_eq!(health.transition_count, 1);
    }
}
