//! Core types for the Tandem two-role peer.
//!
//! This crate defines the shared data structures used by the wire layer, the
//! role arbitrator and the CLI. It contains no networking and no business logic.

pub mod config;
pub mod event;
pub mod role;
