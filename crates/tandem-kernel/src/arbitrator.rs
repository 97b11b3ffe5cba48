//! Role arbitrator — decides the node's role and runs it.
//!
//! Each call to [`RoleArbitrator::run`] performs one step: a decision probe,
//! one Client loop or one Server loop. Every step ends in an [`Outcome`] and
//! [`next_step`] maps it to the following step:
//!
//! ```text
//! DECIDING -> CLIENT      : probe succeeds
//! DECIDING -> SERVER      : probe fails
//! CLIENT   -> SERVER      : peer lost, connect failed, or ROLE_SWITCH sent
//! CLIENT   -> DECIDING    : connection closed for another reason
//! SERVER   -> CLIENT      : ROLE_SWITCH received, listener closed
//! SERVER   -> DECIDING    : bind or accept failed
//! ```
//!
//! Role, state and the connection count are owned here. Connection handlers
//! only raise the shared swap flag; the arbitrator applies the transition.

use crate::error::{KernelError, KernelResult};
use crate::event_bus::EventSink;
use crate::heartbeat::HeartbeatEmitter;
use crate::registry::{ConnectionGuard, ConnectionRegistry};
use crate::trigger::OperatorTrigger;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tandem_types::config::NodeConfig;
use tandem_types::event::{NodeEvent, SwapOrigin};
use tandem_types::role::{ArbiterState, Role};
use tandem_wire::{channel, probe, ControlEvent, WireError};
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Notify};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Pause between connect/bind attempts inside a handoff window.
const HANDOFF_RETRY: Duration = Duration::from_millis(100);

/// What the arbitrator does on its next `run`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Decide,
    /// `handoff`: the old server may still be releasing the port.
    Client { handoff: bool },
    /// `handoff`: the old server may still be holding the port.
    Server { handoff: bool },
}

/// How a Client loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientOutcome {
    /// No server accepted the connection.
    ConnectFailed,
    /// The periodic liveness probe failed.
    PeerLost,
    /// `ROLE_SWITCH` was delivered; this node takes over.
    SwapSent,
    /// The connection closed without the peer disappearing.
    Disconnected,
}

/// How a Server loop ended.
#[derive(Debug)]
pub enum ServerOutcome {
    /// A peer asked for a role exchange.
    SwapReceived,
    /// The accept loop failed.
    AcceptFailed,
    /// The listener could not be bound.
    BindFailed(std::io::Error),
}

/// Result of one arbitration step.
#[derive(Debug)]
pub enum Outcome {
    Decided { reachable: bool },
    Client(ClientOutcome),
    Server(ServerOutcome),
}

/// The transition table.
pub fn next_step(outcome: &Outcome) -> Step {
    match outcome {
        Outcome::Decided { reachable: true } => Step::Client { handoff: false },
        Outcome::Decided { reachable: false } => Step::Server { handoff: false },
        Outcome::Client(ClientOutcome::ConnectFailed) => Step::Server { handoff: false },
        Outcome::Client(ClientOutcome::PeerLost) => Step::Server { handoff: false },
        Outcome::Client(ClientOutcome::SwapSent) => Step::Server { handoff: true },
        Outcome::Client(ClientOutcome::Disconnected) => Step::Decide,
        Outcome::Server(ServerOutcome::SwapReceived) => Step::Client { handoff: true },
        Outcome::Server(ServerOutcome::AcceptFailed) => Step::Decide,
        Outcome::Server(ServerOutcome::BindFailed(_)) => Step::Decide,
    }
}

/// Pending-transition flag shared with connection handlers.
#[derive(Default)]
pub(crate) struct SwapSignal {
    pending: AtomicBool,
    notify: Notify,
}

impl SwapSignal {
    /// Raise the flag. Only the first raise before a `take` returns `true`.
    fn raise(&self) -> bool {
        let raised = self
            .pending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if raised {
            self.notify.notify_one();
        }
        raised
    }

    /// Consume the flag.
    fn take(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    async fn raised(&self) {
        while !self.is_pending() {
            self.notify.notified().await;
        }
    }
}

/// The role state machine.
pub struct RoleArbitrator {
    config: NodeConfig,
    events: Arc<dyn EventSink>,
    role_tx: watch::Sender<Role>,
    state_tx: watch::Sender<ArbiterState>,
    registry: Arc<ConnectionRegistry>,
    swap: Arc<SwapSignal>,
    trigger: OperatorTrigger,
    next: Step,
    bind_failures: u32,
}

impl RoleArbitrator {
    pub fn new(config: NodeConfig, events: Arc<dyn EventSink>, trigger: OperatorTrigger) -> Self {
        let heartbeat = HeartbeatEmitter::new(config.heartbeat_interval(), Arc::clone(&events));
        let (role_tx, _) = watch::channel(Role::Unknown);
        let (state_tx, _) = watch::channel(ArbiterState::Deciding);
        Self {
            config,
            events,
            role_tx,
            state_tx,
            registry: Arc::new(ConnectionRegistry::new(heartbeat)),
            swap: Arc::new(SwapSignal::default()),
            trigger,
            next: Step::Decide,
            bind_failures: 0,
        }
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn role(&self) -> Role {
        *self.role_tx.borrow()
    }

    pub fn state(&self) -> ArbiterState {
        *self.state_tx.borrow()
    }

    /// The step the next `run` will perform.
    pub fn pending_step(&self) -> Step {
        self.next
    }

    pub fn subscribe_role(&self) -> watch::Receiver<Role> {
        self.role_tx.subscribe()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ArbiterState> {
        self.state_tx.subscribe()
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Perform one arbitration step.
    ///
    /// Only a listener that keeps failing to bind is returned as an error;
    /// every other failure becomes the next step.
    pub async fn run(&mut self) -> KernelResult<()> {
        let step = self.next;
        let outcome = match step {
            Step::Decide => self.decide_initial_role().await,
            Step::Client { handoff } => {
                let span = info_span!("node", role = "client");
                Outcome::Client(self.run_client_loop(handoff).instrument(span).await)
            }
            Step::Server { handoff } => {
                let span = info_span!("node", role = "server");
                Outcome::Server(self.run_server_loop(handoff).instrument(span).await)
            }
        };

        let next = next_step(&outcome);
        if let Outcome::Server(ServerOutcome::BindFailed(source)) = outcome {
            self.bind_failures += 1;
            let attempts = self.bind_failures;
            if attempts >= self.config.bind_retry_limit.max(1) {
                error!(attempts, "listener cannot be bound; giving up");
                return Err(KernelError::BindFailed {
                    addr: self.config.listen_addr(),
                    attempts,
                    source,
                });
            }
            let backoff = self.config.bind_backoff(attempts);
            warn!(
                attempts,
                backoff_ms = backoff.as_millis() as u64,
                "backing off before deciding again"
            );
            tokio::time::sleep(backoff).await;
        }

        debug!(from = ?step, to = ?next, "arbitration step complete");
        self.next = next;
        Ok(())
    }

    /// Release everything the current role holds. Used when the node stops
    /// mid-step.
    pub fn stand_down(&self) {
        self.registry.close();
        self.state_tx.send_replace(ArbiterState::Transitioning);
    }

    /// Probe the peer and record the intended role.
    async fn decide_initial_role(&self) -> Outcome {
        self.state_tx.send_replace(ArbiterState::Deciding);
        let peer = self.config.peer_addr();
        let result = probe::probe(&peer, self.config.probe_timeout()).await;
        self.events.emit(NodeEvent::ProbeResult {
            peer: peer.clone(),
            reachable: result.reachable,
        });

        let intent = if result.reachable {
            info!(peer = %peer, latency_ms = result.latency_ms, "peer answered; joining as client");
            Role::Client
        } else {
            info!(peer = %peer, "no peer answered; taking server role");
            Role::Server
        };
        self.role_tx.send_replace(intent);
        Outcome::Decided {
            reachable: result.reachable,
        }
    }

    async fn run_client_loop(&mut self, handoff: bool) -> ClientOutcome {
        self.state_tx.send_replace(ArbiterState::Client);
        let peer = self.config.peer_addr();
        let mut stream = match self.connect_peer(&peer, handoff).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(peer = %peer, error = %e, "cannot reach server; taking server role");
                return ClientOutcome::ConnectFailed;
            }
        };
        self.bind_failures = 0;
        self.assume(Role::Client);
        self.events.emit(NodeEvent::PeerConnected { peer: peer.clone() });

        let mut monitor = JoinSet::new();
        monitor.spawn(
            monitor_liveness(
                peer.clone(),
                self.config.liveness_interval(),
                self.config.probe_timeout(),
                Arc::clone(&self.events),
            )
            .in_current_span(),
        );
        let mut ticker = tokio::time::interval(self.config.heartbeat_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut buffer = [0u8; 1024];

        let outcome = loop {
            tokio::select! {
                _ = monitor.join_next() => {
                    self.events.emit(NodeEvent::PeerLost { peer: peer.clone() });
                    break ClientOutcome::PeerLost;
                }
                _ = self.trigger.next() => {
                    if self.request_swap(&peer).await {
                        break ClientOutcome::SwapSent;
                    }
                }
                _ = ticker.tick() => {
                    self.events.emit(NodeEvent::Heartbeat { role: Role::Client });
                }
                read = stream.read(&mut buffer) => match read {
                    Ok(0) => {
                        info!(peer = %peer, "server closed the connection");
                        self.events.emit(NodeEvent::PeerDisconnected { peer: peer.clone() });
                        break ClientOutcome::Disconnected;
                    }
                    Ok(n) => debug!(bytes = n, "ignoring bytes from server"),
                    Err(e) => {
                        warn!(peer = %peer, error = %e, "server connection failed");
                        self.events.emit(NodeEvent::PeerDisconnected { peer: peer.clone() });
                        break ClientOutcome::Disconnected;
                    }
                },
            }
        };

        monitor.shutdown().await;
        self.state_tx.send_replace(ArbiterState::Transitioning);
        outcome
    }

    async fn run_server_loop(&mut self, handoff: bool) -> ServerOutcome {
        self.state_tx.send_replace(ArbiterState::Server);
        let addr = self.config.listen_addr();
        let listener = match self.bind_listener(&addr, handoff).await {
            Ok(listener) => listener,
            Err(e) => {
                self.events.emit(NodeEvent::ListenerBindFailed {
                    addr,
                    error: e.to_string(),
                });
                return ServerOutcome::BindFailed(e);
            }
        };
        self.bind_failures = 0;
        self.events.emit(NodeEvent::ListenerBound { addr: addr.clone() });
        self.assume(Role::Server);
        self.registry.open();

        let mut handlers = JoinSet::new();
        let outcome = loop {
            tokio::select! {
                _ = self.swap.raised() => break ServerOutcome::SwapReceived,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let guard = self.registry.on_accept();
                        self.events.emit(NodeEvent::PeerConnected { peer: peer.to_string() });
                        handlers.spawn(
                            handle_connection(
                                stream,
                                peer,
                                guard,
                                Arc::clone(&self.swap),
                                Arc::clone(&self.events),
                            )
                            .in_current_span(),
                        );
                    }
                    Err(e) => {
                        error!(error = %e, "accept failed");
                        break ServerOutcome::AcceptFailed;
                    }
                },
                Some(joined) = handlers.join_next() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            error!("connection handler panicked");
                        }
                    }
                }
                _ = self.trigger.next() => {
                    self.events.emit(NodeEvent::SwapRequested { origin: SwapOrigin::Operator });
                    self.events.emit(NodeEvent::SwapNotSent {
                        reason: "this node is the server; request the exchange from the client"
                            .to_string(),
                    });
                }
            }
        };

        drop(listener);
        self.state_tx.send_replace(ArbiterState::Transitioning);
        self.registry.close();
        self.events.emit(NodeEvent::ListenerClosed { addr });

        if matches!(outcome, ServerOutcome::SwapReceived) || self.swap.is_pending() {
            tokio::time::sleep(self.config.swap_grace()).await;
        }
        handlers.shutdown().await;
        settle_server_outcome(outcome, self.swap.take())
    }

    /// Publish a role the node now actually holds.
    fn assume(&self, role: Role) {
        self.role_tx.send_replace(role);
        self.events.emit(NodeEvent::RoleAssumed { role });
    }

    /// Deliver an operator swap request. Never retried.
    async fn request_swap(&self, peer: &str) -> bool {
        self.events.emit(NodeEvent::SwapRequested {
            origin: SwapOrigin::Operator,
        });
        match channel::send(peer, self.config.probe_timeout()).await {
            Ok(()) => {
                self.events.emit(NodeEvent::SwapSent {
                    peer: peer.to_string(),
                });
                true
            }
            Err(e) => {
                self.events.emit(NodeEvent::SwapNotSent {
                    reason: e.to_string(),
                });
                false
            }
        }
    }

    async fn connect_peer(&self, peer: &str, handoff: bool) -> Result<TcpStream, WireError> {
        let deadline = handoff.then(|| Instant::now() + self.config.handoff_timeout());
        loop {
            match channel::connect(peer, self.config.probe_timeout()).await {
                Ok(stream) => return Ok(stream),
                Err(e) if deadline.is_some_and(|d| Instant::now() < d) => {
                    debug!(peer = %peer, error = %e, "new server not up yet; retrying");
                    tokio::time::sleep(HANDOFF_RETRY).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn bind_listener(&self, addr: &str, handoff: bool) -> std::io::Result<TcpListener> {
        let deadline = handoff.then(|| Instant::now() + self.config.handoff_timeout());
        loop {
            match TcpListener::bind(addr).await {
                Ok(listener) => return Ok(listener),
                Err(e)
                    if e.kind() == std::io::ErrorKind::AddrInUse
                        && deadline.is_some_and(|d| Instant::now() < d) =>
                {
                    debug!(addr = %addr, "old server still holds the port; retrying");
                    tokio::time::sleep(HANDOFF_RETRY).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Final outcome of a Server loop once the swap flag has been consumed.
///
/// A `ROLE_SWITCH` that arrived while the loop was ending for another reason
/// still turns the node into a Client.
fn settle_server_outcome(outcome: ServerOutcome, swap_pending: bool) -> ServerOutcome {
    match outcome {
        ServerOutcome::SwapReceived => ServerOutcome::SwapReceived,
        other if swap_pending => {
            info!(ended = ?other, "role exchange arrived as the server loop ended");
            ServerOutcome::SwapReceived
        }
        other => other,
    }
}

/// Probe the server every `interval`; return once it stops answering.
async fn monitor_liveness(
    peer: String,
    interval: Duration,
    timeout: Duration,
    events: Arc<dyn EventSink>,
) {
    loop {
        tokio::time::sleep(interval).await;
        if !probe::check(&peer, timeout).await {
            events.emit(NodeEvent::ProbeResult {
                peer,
                reachable: false,
            });
            return;
        }
    }
}

/// Read one inbound connection until it sends `ROLE_SWITCH` or closes.
async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    _guard: ConnectionGuard,
    swap: Arc<SwapSignal>,
    events: Arc<dyn EventSink>,
) {
    match channel::receive(&mut stream).await {
        Ok(ControlEvent::RoleSwitch) => {
            events.emit(NodeEvent::SwapReceived {
                peer: peer.to_string(),
            });
            if swap.raise() {
                events.emit(NodeEvent::SwapRequested {
                    origin: SwapOrigin::Peer,
                });
            } else {
                debug!(peer = %peer, "role exchange already pending");
            }
        }
        Ok(ControlEvent::Closed) => {
            events.emit(NodeEvent::PeerDisconnected {
                peer: peer.to_string(),
            });
        }
        Err(e) => {
            warn!(peer = %peer, error = %e, "peer connection dropped");
            events.emit(NodeEvent::PeerDisconnected {
                peer: peer.to_string(),
            });
        }
    }
}
