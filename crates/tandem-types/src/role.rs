//! Role and arbitration-state enumerations.

use serde::{Deserialize, Serialize};

/// The role a node holds in its pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// No role decided yet (only before the first decision completes).
    #[default]
    Unknown,
    /// Connected to the peer, monitoring its liveness.
    Client,
    /// Accepting connections, emitting heartbeats while idle.
    Server,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Unknown => write!(f, "unknown"),
            Role::Client => write!(f, "client"),
            Role::Server => write!(f, "server"),
        }
    }
}

/// Arbitration state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArbiterState {
    /// Probing the peer to pick an initial role.
    Deciding,
    /// Running the client loop.
    Client,
    /// Running the server loop.
    Server,
    /// Leaving one role for the other.
    Transitioning,
}

impl std::fmt::Display for ArbiterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArbiterState::Deciding => write!(f, "deciding"),
            ArbiterState::Client => write!(f, "client"),
            ArbiterState::Server => write!(f, "server"),
            ArbiterState::Transitioning => write!(f, "transitioning"),
        }
    }
}
