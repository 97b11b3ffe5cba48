//! Tandem wire layer — the control channel and the liveness probe.
//!
//! Two peers share one fixed TCP port. The only content that means anything on
//! a connection is the `ROLE_SWITCH` token; everything else is read and
//! ignored.
//!
//! ## Architecture
//!
//! - **ControlMessage**: the single recognized token and its parser
//! - **channel**: sending `ROLE_SWITCH` on a fresh connection, reading it back
//! - **probe**: connect-and-close reachability checks

pub mod channel;
pub mod message;
pub mod probe;

pub use channel::{ControlEvent, WireError};
pub use message::ControlMessage;
