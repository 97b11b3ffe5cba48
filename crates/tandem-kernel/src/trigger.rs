//! Operator trigger — the "swap requested" event stream.
//!
//! Input handling lives outside the kernel. Whatever reads the operator's
//! keyboard holds a [`SwapTrigger`] and calls [`SwapTrigger::request`] once
//! per action; the arbitrator consumes each request exactly once through
//! [`OperatorTrigger::next`].

use tokio::sync::mpsc;

/// Pending operator requests held before the arbitrator consumes them.
const TRIGGER_BUFFER: usize = 4;

/// Producer side, held by the input source.
#[derive(Debug, Clone)]
pub struct SwapTrigger {
    tx: mpsc::Sender<()>,
}

impl SwapTrigger {
    /// Queue one swap request. Returns `false` if the queue is full or the
    /// node is gone.
    pub fn request(&self) -> bool {
        self.tx.try_send(()).is_ok()
    }
}

/// Consumer side, owned by the arbitrator.
#[derive(Debug)]
pub struct OperatorTrigger {
    rx: Option<mpsc::Receiver<()>>,
}

impl OperatorTrigger {
    /// A trigger that never fires.
    pub fn disabled() -> Self {
        Self { rx: None }
    }

    /// Wait for the next operator request. Pends forever once every producer
    /// is dropped.
    pub async fn next(&mut self) {
        if let Some(rx) = self.rx.as_mut() {
            if rx.recv().await.is_some() {
                return;
            }
            self.rx = None;
        }
        std::future::pending::<()>().await
    }
}

/// Create a connected producer/consumer pair.
pub fn channel() -> (SwapTrigger, OperatorTrigger) {
    let (tx, rx) = mpsc::channel(TRIGGER_BUFFER);
    (SwapTrigger { tx }, OperatorTrigger { rx: Some(rx) })
}

/// Whether a line of operator input asks for a role exchange.
pub fn is_swap_command(line: &str) -> bool {
    let line = line.trim();
    ["r", "swap", "role_switch"]
        .iter()
        .any(|cmd| line.eq_ignore_ascii_case(cmd))
}
