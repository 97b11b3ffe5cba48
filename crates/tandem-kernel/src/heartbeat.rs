//! Heartbeat emitter — periodic proof of life while a server sits idle.
//!
//! At most one emission loop exists at a time. The loop emits while holding
//! the slot lock and checks that it still owns the slot, so once
//! [`HeartbeatEmitter::stop`] returns no further heartbeat can be emitted.

use crate::event_bus::EventSink;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tandem_types::event::NodeEvent;
use tandem_types::role::Role;
use tokio::task::JoinHandle;
use tracing::debug;

/// The live emission loop.
struct Running {
    id: u64,
    handle: JoinHandle<()>,
}

/// Emits `Heartbeat` events at a fixed interval while active.
pub struct HeartbeatEmitter {
    interval: Duration,
    events: Arc<dyn EventSink>,
    slot: Arc<Mutex<Option<Running>>>,
    /// Emission loops spawned over the emitter's lifetime.
    loops_started: AtomicU64,
}

impl HeartbeatEmitter {
    pub fn new(interval: Duration, events: Arc<dyn EventSink>) -> Self {
        Self {
            interval,
            events,
            slot: Arc::new(Mutex::new(None)),
            loops_started: AtomicU64::new(0),
        }
    }

    /// Start emitting. A no-op returning `false` if a loop is already running
    /// or there is no tokio runtime to run it on.
    pub fn start(&self) -> bool {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_some() {
            return false;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("no runtime; heartbeat not started");
            return false;
        };

        let id = self.loops_started.fetch_add(1, Ordering::SeqCst) + 1;
        let handle = runtime.spawn(emit_loop(
            id,
            self.interval,
            Arc::clone(&self.slot),
            Arc::clone(&self.events),
        ));
        *slot = Some(Running { id, handle });
        debug!(loop_id = id, "heartbeat started");
        true
    }

    /// Stop emitting. Returns `false` if nothing was running.
    pub fn stop(&self) -> bool {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        match slot.take() {
            Some(running) => {
                running.handle.abort();
                self.events.emit(NodeEvent::HeartbeatStopped);
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Total emission loops ever started.
    pub fn loops_started(&self) -> u64 {
        self.loops_started.load(Ordering::SeqCst)
    }
}

impl Drop for HeartbeatEmitter {
    fn drop(&mut self) {
        if let Some(running) = self.slot.lock().unwrap_or_else(|e| e.into_inner()).take() {
            running.handle.abort();
        }
    }
}

async fn emit_loop(
    id: u64,
    interval: Duration,
    slot: Arc<Mutex<Option<Running>>>,
    events: Arc<dyn EventSink>,
) {
    loop {
        {
            let slot = slot.lock().unwrap_or_else(|e| e.into_inner());
            match slot.as_ref() {
                Some(running) if running.id == id => {
                    events.emit(NodeEvent::Heartbeat { role: Role::Server })
                }
                _ => return,
            }
        }
        tokio::time::sleep(interval).await;
    }
}
