//! Node — runs the arbitrator until shutdown.
//!
//! The node owns the [`RoleArbitrator`] and calls it in a loop, so a failed
//! role attempt always falls through to the next step. It stops on a
//! shutdown request or on a fatal error.

use crate::arbitrator::RoleArbitrator;
use crate::error::KernelResult;
use crate::event_bus::EventSink;
use crate::registry::ConnectionRegistry;
use crate::supervisor::Supervisor;
use crate::trigger::OperatorTrigger;

use std::sync::Arc;
use tandem_types::config::NodeConfig;
use tandem_types::role::{ArbiterState, Role};
use tokio::sync::watch;
use tracing::info;

/// A Tandem node.
pub struct Node {
    arbitrator: RoleArbitrator,
    supervisor: Arc<Supervisor>,
}

/// Cheap handle for observing and stopping a running node.
#[derive(Clone)]
pub struct NodeHandle {
    supervisor: Arc<Supervisor>,
    role: watch::Receiver<Role>,
    state: watch::Receiver<ArbiterState>,
    registry: Arc<ConnectionRegistry>,
}

impl Node {
    /// Validate the configuration and build a node.
    pub fn new(
        config: NodeConfig,
        events: Arc<dyn EventSink>,
        trigger: OperatorTrigger,
    ) -> KernelResult<Self> {
        config.validate()?;
        Ok(Self {
            arbitrator: RoleArbitrator::new(config, events, trigger),
            supervisor: Arc::new(Supervisor::new()),
        })
    }

    pub fn handle(&self) -> NodeHandle {
        NodeHandle {
            supervisor: Arc::clone(&self.supervisor),
            role: self.arbitrator.subscribe_role(),
            state: self.arbitrator.subscribe_state(),
            registry: Arc::clone(self.arbitrator.registry()),
        }
    }

    /// Run until shutdown is requested or a fatal error occurs.
    pub async fn run(mut self) -> KernelResult<()> {
        let mut shutdown = self.supervisor.subscribe();
        info!(
            peer = %self.arbitrator.config().peer_addr(),
            listen = %self.arbitrator.config().listen_addr(),
            "node starting"
        );

        let result = loop {
            if self.supervisor.is_shutting_down() {
                break Ok(());
            }
            let before = self.arbitrator.role();
            tokio::select! {
                stepped = self.arbitrator.run() => {
                    if let Err(e) = stepped {
                        break Err(e);
                    }
                    self.supervisor.record_cycle();
                    let after = self.arbitrator.role();
                    if before != Role::Unknown && before != after {
                        self.supervisor.record_transition();
                    }
                }
                _ = shutdown.changed() => {}
            }
        };

        self.arbitrator.stand_down();
        let health = self.supervisor.health();
        info!(
            cycles = health.cycle_count,
            transitions = health.transition_count,
            "node stopped"
        );
        result
    }
}

impl NodeHandle {
    /// Ask the node to stop.
    pub fn shutdown(&self) {
        self.supervisor.shutdown();
    }

    pub fn role(&self) -> Role {
        *self.role.borrow()
    }

    pub fn state(&self) -> ArbiterState {
        *self.state.borrow()
    }

    /// A receiver that sees every role change.
    pub fn subscribe_role(&self) -> watch::Receiver<Role> {
        self.role.clone()
    }

    pub fn active_connections(&self) -> usize {
        self.registry.active()
    }

    pub fn is_serving(&self) -> bool {
        self.registry.is_serving()
    }

    pub fn heartbeat_running(&self) -> bool {
        self.registry.heartbeat().is_running()
    }

    pub fn transitions(&self) -> u64 {
        self.supervisor.transition_count()
    }
}
