pub mod config;
pub mod peer;
pub mod run;

/// Build a multi-threaded runtime for one command.
pub(crate) fn runtime() -> Option<tokio::runtime::Runtime> {
    match tokio::runtime::Runtime::new() {
        Ok(rt) => Some(rt),
        Err(e) => {
            crate::ui::error(&format!("Failed to start async runtime: {e}"));
            None
        }
    }
}
