//! Core of the Tandem two-role peer.
//!
//! A [`Node`] repeatedly runs the [`RoleArbitrator`], which probes the peer,
//! takes the Client or Server role, and moves between them when the peer
//! disappears or a `ROLE_SWITCH` control message asks for an exchange.

pub mod arbitrator;
pub mod config;
pub mod error;
pub mod event_bus;
pub mod heartbeat;
pub mod node;
pub mod registry;
pub mod supervisor;
pub mod trigger;

pub use arbitrator::RoleArbitrator;
pub use error::{KernelError, KernelResult};
pub use event_bus::{EventBus, EventSink};
pub use node::{Node, NodeHandle};
