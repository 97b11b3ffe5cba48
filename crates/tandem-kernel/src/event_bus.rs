//! Event bus — the node's event sink.
//!
//! Every event is logged through `tracing`, kept in a bounded history ring and
//! broadcast to subscribers. Core logic only sees the [`EventSink`] trait.

use std::collections::VecDeque;
use std::sync::Mutex;
use tandem_types::event::{Event, NodeEvent};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Maximum events retained in the history ring buffer.
const HISTORY_SIZE: usize = 1000;

/// Destination for node events.
pub trait EventSink: Send + Sync + 'static {
    /// Record one event. Must not block.
    fn emit(&self, event: NodeEvent);
}

/// The node's event bus.
pub struct EventBus {
    /// Broadcast channel for all events.
    sender: broadcast::Sender<Event>,
    /// Event history ring buffer.
    history: Mutex<VecDeque<Event>>,
}

impl EventBus {
    /// Create a new event bus.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1024);
        Self {
            sender,
            history: Mutex::new(VecDeque::with_capacity(HISTORY_SIZE)),
        }
    }

    /// Publish an event: log it, store it, broadcast it.
    pub fn publish(&self, payload: NodeEvent) -> Event {
        log_event(&payload);
        let event = Event::new(payload);

        {
            let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
            if history.len() >= HISTORY_SIZE {
                history.pop_front();
            }
            history.push_back(event.clone());
        }

        let _ = self.sender.send(event.clone());
        event
    }

    /// Subscribe to all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Most recent events, newest first.
    pub fn history(&self, limit: usize) -> Vec<Event> {
        let history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        history.iter().rev().take(limit).cloned().collect()
    }

    /// Number of retained events of the given kind.
    pub fn count(&self, kind: &str) -> usize {
        let history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        history.iter().filter(|e| e.payload.kind() == kind).count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for EventBus {
    fn emit(&self, event: NodeEvent) {
        self.publish(event);
    }
}

fn log_event(event: &NodeEvent) {
    match event {
        NodeEvent::RoleAssumed { role } => info!(role = %role, "role assumed"),
        NodeEvent::ProbeResult { peer, reachable } => {
            if *reachable {
                debug!(peer = %peer, "peer reachable")
            } else {
                warn!(peer = %peer, "peer offline")
            }
        }
        NodeEvent::PeerConnected { peer } => debug!(peer = %peer, "peer connected"),
        NodeEvent::PeerDisconnected { peer } => debug!(peer = %peer, "peer disconnected"),
        NodeEvent::PeerLost { peer } => warn!(peer = %peer, "peer lost"),
        NodeEvent::SwapRequested { origin } => info!(origin = ?origin, "role exchange requested"),
        NodeEvent::SwapSent { peer } => info!(peer = %peer, "role exchange request sent"),
        NodeEvent::SwapNotSent { reason } => {
            warn!(reason = %reason, "role exchange request not sent")
        }
        NodeEvent::SwapReceived { peer } => info!(peer = %peer, "role exchange request received"),
        NodeEvent::ListenerBound { addr } => info!(addr = %addr, "listening"),
        NodeEvent::ListenerBindFailed { addr, error } => {
            error!(addr = %addr, error = %error, "listener bind failed")
        }
        NodeEvent::ListenerClosed { addr } => info!(addr = %addr, "listener closed"),
        NodeEvent::Heartbeat { role } => info!(role = %role, "alive"),
        NodeEvent::HeartbeatStopped => debug!("heartbeat stopped"),
    }
}
