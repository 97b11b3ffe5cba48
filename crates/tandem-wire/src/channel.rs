//! Control channel — delivering and detecting `ROLE_SWITCH`.
//!
//! A swap request always travels on a fresh, short-lived connection: the
//! requester connects, writes the token and closes. The receiving side reads an
//! already-open connection chunk by chunk until it sees the token or the
//! stream ends.

use crate::message::ControlMessage;

use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

/// Read buffer size for inbound connections.
const READ_BUFFER_SIZE: usize = 1024;

/// Errors from the wire layer.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Connect to {addr} timed out after {timeout_ms}ms")]
    ConnectTimeout { addr: String, timeout_ms: u64 },
}

impl WireError {
    /// True when the peer actively refused the connection.
    pub fn is_refused(&self) -> bool {
        matches!(self, WireError::Io(e) if e.kind() == std::io::ErrorKind::ConnectionRefused)
    }
}

/// What a reader saw on an inbound connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// The peer asked for a role exchange. Reading stopped.
    RoleSwitch,
    /// The peer closed the connection (zero-byte read).
    Closed,
}

/// Open a TCP connection, giving up after `timeout`.
pub async fn connect(addr: &str, timeout: Duration) -> Result<TcpStream, WireError> {
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(WireError::Io(e)),
        Err(_) => Err(WireError::ConnectTimeout {
            addr: addr.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}

/// Deliver `ROLE_SWITCH` to `addr` on a new connection, then close it.
///
/// A refused or timed-out connection is returned as an error and never
/// retried here.
pub async fn send(addr: &str, timeout: Duration) -> Result<(), WireError> {
    let mut stream = connect(addr, timeout).await?;
    stream
        .write_all(ControlMessage::RoleSwitch.as_bytes())
        .await?;
    stream.flush().await?;
    stream.shutdown().await?;
    debug!(peer = %addr, "ROLE_SWITCH written");
    Ok(())
}

/// Read an inbound connection until a control message arrives or the peer
/// closes it. Non-control bytes are discarded and reading continues.
pub async fn receive<R>(reader: &mut R) -> Result<ControlEvent, WireError>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = [0u8; READ_BUFFER_SIZE];
    loop {
        let n = reader.read(&mut buffer).await?;
        if n == 0 {
            return Ok(ControlEvent::Closed);
        }
        match ControlMessage::parse(&buffer[..n]) {
            Some(ControlMessage::RoleSwitch) => return Ok(ControlEvent::RoleSwitch),
            None => debug!(bytes = n, "ignoring non-control bytes"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn listener() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        (listener, addr)
    }

    async fn closed_addr() -> String {
        let (listener, addr) = listener().await;
        drop(listener);
        addr
    }

    #[tokio::test]
    async fn test_send_and_receive_role_switch() {
        let (listener, addr) = listener().await;
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            receive(&mut stream).await.unwrap()
        });

        send(&addr, Duration::from_secs(1)).await.unwrap();
        assert_eq!(server.await.unwrap(), ControlEvent::RoleSwitch);
    }

    #[tokio::test]
    async fn test_receive_ignores_other_bytes_then_switches() {
        let (listener, addr) = listener().await;
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            receive(&mut stream).await.unwrap()
        });

        let mut client = TcpStream::connect(&addr).await.unwrap();
        client.write_all(b"hello there").await.unwrap();
        client.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        client.write_all(b"role_switch\0\0").await.unwrap();
        client.flush().await.unwrap();

        assert_eq!(server.await.unwrap(), ControlEvent::RoleSwitch);
    }

    #[tokio::test]
    async fn test_receive_reports_close() {
        let (listener, addr) = listener().await;
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            receive(&mut stream).await.unwrap()
        });

        let mut client = TcpStream::connect(&addr).await.unwrap();
        client.write_all(b"not a control message").await.unwrap();
        drop(client);

        assert_eq!(server.await.unwrap(), ControlEvent::Closed);
    }

    #[tokio::test]
    async fn test_receive_from_in_memory_reader() {
        let mut reader = tokio_test::io::Builder::new()
            .read(b"noise")
            .read(b"ROLE_SWITCH")
            .build();
        assert_eq!(
            receive(&mut reader).await.unwrap(),
            ControlEvent::RoleSwitch
        );
    }

    #[tokio::test]
    async fn test_send_to_closed_port_fails() {
        let addr = closed_addr().await;
        let err = send(&addr, Duration::from_millis(500)).await.unwrap_err();
        assert!(err.is_refused(), "expected refused, got {err}");
    }

    #[tokio::test]
    async fn test_connect_times_out_when_backlog_is_full() {
        let socket = tokio::net::TcpSocket::new_v4().unwrap();
        socket.bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let listener = socket.listen(1).unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let timeout = Duration::from_millis(200);

        // Nothing is accepted, so the queue fills and later SYNs go unanswered.
        let mut held = Vec::new();
        let mut timed_out = None;
        for _ in 0..16 {
            let start = std::time::Instant::now();
            match connect(&addr, timeout).await {
                Ok(stream) => held.push(stream),
                Err(e) => {
                    timed_out = Some((e, start.elapsed()));
                    break;
                }
            }
        }

        let (err, elapsed) = timed_out.expect("accept queue never filled");
        assert!(
            matches!(err, WireError::ConnectTimeout { timeout_ms: 200, .. }),
            "unexpected error: {err}"
        );
        assert!(!err.is_refused());
        assert!(elapsed < timeout + Duration::from_millis(300));
    }
}
