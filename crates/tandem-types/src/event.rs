//! Event types emitted by a node.
//!
//! Every role transition and connectivity change is reported as a
//! [`NodeEvent`]; the kernel's event bus wraps it in an [`Event`] envelope
//! with an id and timestamp.

use crate::role::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
    /// Create a new random EventId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a swap request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapOrigin {
    /// Local operator input.
    Operator,
    /// A `ROLE_SWITCH` control message from the peer.
    Peer,
}

/// Something observable that happened on the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeEvent {
    /// The node took a role.
    RoleAssumed { role: Role },
    /// Result of a liveness probe against the peer address.
    ProbeResult { peer: String, reachable: bool },
    /// Server accepted an inbound connection, or Client connected out.
    PeerConnected { peer: String },
    /// A peer connection closed without a role change.
    PeerDisconnected { peer: String },
    /// The Client's liveness probe failed; the peer is gone.
    PeerLost { peer: String },
    /// A role exchange was requested.
    SwapRequested { origin: SwapOrigin },
    /// `ROLE_SWITCH` was delivered to the peer.
    SwapSent { peer: String },
    /// A swap request could not be delivered.
    SwapNotSent { reason: String },
    /// `ROLE_SWITCH` arrived on an inbound connection.
    SwapReceived { peer: String },
    /// The listener is bound.
    ListenerBound { addr: String },
    /// The listener could not be bound.
    ListenerBindFailed { addr: String, error: String },
    /// The listener was closed.
    ListenerClosed { addr: String },
    /// Periodic proof of life.
    Heartbeat { role: Role },
    /// The server heartbeat stopped because a peer connected or the role changed.
    HeartbeatStopped,
}

impl NodeEvent {
    /// Short machine-readable name of the event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            NodeEvent::RoleAssumed { .. } => "role_assumed",
            NodeEvent::ProbeResult { .. } => "probe_result",
            NodeEvent::PeerConnected { .. } => "peer_connected",
            NodeEvent::PeerDisconnected { .. } => "peer_disconnected",
            NodeEvent::PeerLost { .. } => "peer_lost",
            NodeEvent::SwapRequested { .. } => "swap_requested",
            NodeEvent::SwapSent { .. } => "swap_sent",
            NodeEvent::SwapNotSent { .. } => "swap_not_sent",
            NodeEvent::SwapReceived { .. } => "swap_received",
            NodeEvent::ListenerBound { .. } => "listener_bound",
            NodeEvent::ListenerBindFailed { .. } => "listener_bind_failed",
            NodeEvent::ListenerClosed { .. } => "listener_closed",
            NodeEvent::Heartbeat { .. } => "heartbeat",
            NodeEvent::HeartbeatStopped => "heartbeat_stopped",
        }
    }
}

/// A complete event with id and timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique event ID.
    pub id: EventId,
    /// The event payload.
    pub payload: NodeEvent,
    /// When the event was created.
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// Wrap a payload, stamping it with a fresh id and the current time.
    pub fn new(payload: NodeEvent) -> Self {
        Self {
            id: EventId::new(),
            payload,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_creation() {
        let event = Event::new(NodeEvent::RoleAssumed { role: Role::Server });
        assert_eq!(event.payload.kind(), "role_assumed");
        assert!(event.timestamp <= Utc::now());
    }

    #[test]
    fn test_event_ids_are_unique() {
        let a = Event::new(NodeEvent::HeartbeatStopped);
        let b = Event::new(NodeEvent::HeartbeatStopped);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = Event::new(NodeEvent::SwapNotSent {
            reason: "connection refused".to_string(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["payload"]["type"], "swap_not_sent");
        assert_eq!(json["payload"]["reason"], "connection refused");
    }
}
