//! Liveness probe — is anything listening at the peer address?
//!
//! A probe opens a connection and drops it immediately. It never carries data
//! and never reports an error: every failure is folded into `false`.

use crate::channel;

use std::time::{Duration, Instant};
use tracing::debug;

/// Result of probing a peer address.
#[derive(Debug, Clone, Default)]
pub struct ProbeResult {
    /// Whether the connection was established.
    pub reachable: bool,
    /// Time spent connecting, in milliseconds.
    pub latency_ms: u64,
    /// Error message if the probe failed.
    pub error: Option<String>,
}

/// Probe `addr` and report details.
pub async fn probe(addr: &str, timeout: Duration) -> ProbeResult {
    let start = Instant::now();
    match channel::connect(addr, timeout).await {
        Ok(stream) => {
            drop(stream);
            ProbeResult {
                reachable: true,
                latency_ms: start.elapsed().as_millis() as u64,
                error: None,
            }
        }
        Err(e) => {
            debug!(peer = %addr, error = %e, "probe failed");
            ProbeResult {
                reachable: false,
                latency_ms: start.elapsed().as_millis() as u64,
                error: Some(e.to_string()),
            }
        }
    }
}

/// True only if a connection to `addr` is established within `timeout`.
pub async fn check(addr: &str, timeout: Duration) -> bool {
    probe(addr, timeout).await.reachable
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_check_reachable_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        assert!(check(&addr, Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_check_closed_port_returns_false_quickly() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let timeout = Duration::from_millis(500);
        let start = Instant::now();
        assert!(!check(&addr, timeout).await);
        assert!(start.elapsed() < timeout + Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_probe_unresolvable_host_is_folded() {
        let result = probe("definitely-not-a-host.invalid:5000", Duration::from_millis(500)).await;
        assert!(!result.reachable);
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn test_probe_reports_latency_on_success() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let result = probe(&addr, Duration::from_secs(1)).await;
        assert!(result.reachable);
        assert!(result.error.is_none());
        assert!(result.latency_ms < 1000);
    }

    #[tokio::test]
    async fn test_check_is_bounded_by_timeout_when_peer_stalls() {
        let socket = tokio::net::TcpSocket::new_v4().unwrap();
        socket.bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let listener = socket.listen(1).unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let timeout = Duration::from_millis(200);

        let mut unreachable = 0;
        for _ in 0..16 {
            let start = Instant::now();
            if !check(&addr, timeout).await {
                unreachable += 1;
            }
            assert!(start.elapsed() < timeout + Duration::from_millis(300));
        }
        assert!(unreachable > 0, "stalled listener always answered");
    }
}
