//! Kernel-specific error types.
//!
//! Only conditions the node cannot heal on its own become errors; connection
//! failures during arbitration are folded into role transitions.

use tandem_types::config::ConfigError;
use thiserror::Error;

/// Exit code for a listener that could not be bound.
pub const EXIT_BIND_FAILED: i32 = 2;

/// Kernel error type.
#[derive(Error, Debug)]
pub enum KernelError {
    /// The configuration cannot be used.
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The listener could not be bound within the retry budget.
    #[error("Cannot bind {addr} after {attempts} attempts: {source}")]
    BindFailed {
        addr: String,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },
}

impl KernelError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            KernelError::BindFailed { .. } => EXIT_BIND_FAILED,
            KernelError::Config(_) => 1,
        }
    }
}

/// Alias for kernel results.
pub type KernelResult<T> = Result<T, KernelError>;
