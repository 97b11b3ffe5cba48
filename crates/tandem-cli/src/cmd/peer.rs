use crate::ui;
use tandem_types::config::NodeConfig;
use tandem_wire::{channel, probe};

pub fn cmd_probe(config: &NodeConfig) -> i32 {
    let Some(rt) = super::runtime() else {
        return 1;
    };
    let peer = config.peer_addr();
    let result = rt.block_on(probe::probe(&peer, config.probe_timeout()));

    if result.reachable {
        ui::success(&format!("{peer} is listening"));
        ui::kv("Latency", &format!("{} ms", result.latency_ms));
        0
    } else {
        ui::error(&format!("{peer} is not reachable"));
        if let Some(reason) = result.error {
            ui::kv("Reason", &reason);
        }
        ui::hint("A node started with `tandem run` now would become the server.");
        1
    }
}

pub fn cmd_swap(config: &NodeConfig) -> i32 {
    let Some(rt) = super::runtime() else {
        return 1;
    };
    let peer = config.peer_addr();
    match rt.block_on(channel::send(&peer, config.probe_timeout())) {
        Ok(()) => {
            ui::success(&format!("ROLE_SWITCH delivered to {peer}"));
            0
        }
        Err(e) if e.is_refused() => {
            ui::error_with_fix(
                &format!("Nothing is listening at {peer}"),
                "Start the server first with `tandem run`",
            );
            1
        }
        Err(e) => {
            ui::error(&format!("ROLE_SWITCH not sent: {e}"));
            1
        }
    }
}
