use crate::ui;
use std::sync::Arc;
use std::time::Duration;
use tandem_kernel::trigger::{self, OperatorTrigger, SwapTrigger};
use tandem_kernel::{EventBus, Node};
use tandem_types::config::NodeConfig;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

pub fn cmd_run(config: NodeConfig, no_stdin: bool) -> i32 {
    let Some(rt) = super::runtime() else {
        return 1;
    };
    let code = rt.block_on(run_node(config, no_stdin));
    // The stdin reader sits on a blocking thread that never finishes.
    rt.shutdown_timeout(Duration::from_millis(100));
    code
}

async fn run_node(config: NodeConfig, no_stdin: bool) -> i32 {
    let events = Arc::new(EventBus::new());
    let (swap_trigger, operator) = if no_stdin {
        (None, OperatorTrigger::disabled())
    } else {
        let (swap_trigger, operator) = trigger::channel();
        (Some(swap_trigger), operator)
    };

    let node = match Node::new(config, events, operator) {
        Ok(node) => node,
        Err(e) => {
            ui::error_with_fix(
                &e.to_string(),
                "Run `tandem config` to inspect the effective settings",
            );
            return e.exit_code();
        }
    };
    let handle = node.handle();

    if let Some(swap_trigger) = swap_trigger {
        tokio::spawn(read_operator_input(swap_trigger));
        info!("type `r` and press Enter to request a role exchange");
    }

    let ctrl_c_handle = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl+C received");
            ctrl_c_handle.shutdown();
        }
    });

    match node.run().await {
        Ok(()) => 0,
        Err(e) => {
            error!(error = %e, "node stopped with a fatal error");
            e.exit_code()
        }
    }
}

/// Turn swap commands typed on stdin into trigger requests.
async fn read_operator_input(swap_trigger: SwapTrigger) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if trigger::is_swap_command(&line) => {
                if !swap_trigger.request() {
                    warn!("swap request dropped; earlier requests are still pending");
                }
            }
            Ok(Some(line)) if line.trim().is_empty() => {}
            Ok(Some(line)) => {
                warn!(input = %line.trim(), "unknown command; type `r` to request a role exchange");
            }
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "stopped reading operator input");
                break;
            }
        }
    }
}
