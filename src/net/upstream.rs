//! Upstream connection establishment.
//!
//! Resolves the origin named by a request and connects to the first candidate
//! address that accepts. Resolution is never retried.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpStream;

use crate::config::ProxyConfig;
use crate::resilience::{with_deadline, TimeoutError};

/// Port used when the request does not name one.
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// Error type for upstream connection attempts.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("failed to resolve {host}:{port}: {source}")]
    Resolve {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },
    #[error("{host}:{port} resolved to no usable address")]
    NoAddress { host: String, port: u16 },
    #[error("no address of {host}:{port} accepted a connection ({attempts} tried): {last}")]
    Unreachable {
        host: String,
        port: u16,
        attempts: usize,
        #[source]
        last: ConnectAttemptError,
    },
}

/// Why a single candidate address was rejected.
#[derive(Debug, thiserror::Error)]
pub enum ConnectAttemptError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Timeout(#[from] TimeoutError),
}

/// Opens TCP connections to origin servers.
#[derive(Debug, Clone)]
pub struct Connector {
    connect_timeout: Option<Duration>,
    ipv4_only: bool,
}

impl Connector {
    pub fn new(connect_timeout: Option<Duration>, ipv4_only: bool) -> Self {
        Self {
            connect_timeout,
            ipv4_only,
        }
    }

    pub fn from_config(config: &ProxyConfig) -> Self {
        Self::new(config.timeouts.connect(), config.upstream.ipv4_only)
    }

    /// Resolve `host:port` and connect to the first address that accepts.
    ///
    /// Candidates are tried in resolver order; each attempt gets the full
    /// connect timeout.
    pub async fn connect(
        &self,
        host: &str,
        port: u16,
    ) -> Result<(TcpStream, SocketAddr), ConnectError> {
        let candidates: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
            .await
            .map_err(|source| ConnectError::Resolve {
                host: host.to_string(),
                port,
                source,
            })?
            .filter(|addr| !self.ipv4_only || addr.is_ipv4())
            .collect();

        let mut last = None;
        for addr in &candidates {
            match self.attempt(*addr).await {
                Ok(stream) => {
                    tracing::debug!(upstream = %addr, "Upstream connected");
                    return Ok((stream, *addr));
                }
                Err(e) => {
                    tracing::debug!(upstream = %addr, error = %e, "Upstream candidate failed");
                    last = Some(e);
                }
            }
        }

        match last {
            Some(last) => Err(ConnectError::Unreachable {
                host: host.to_string(),
                port,
                attempts: candidates.len(),
                last,
            }),
            None => Err(ConnectError::NoAddress {
                host: host.to_string(),
                port,
            }),
        }
    }

    async fn attempt(&self, addr: SocketAddr) -> Result<TcpStream, ConnectAttemptError> {
        let stream = with_deadline("upstream connect", self.connect_timeout, TcpStream::connect(addr))
            .await??;
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn connects_to_resolved_host() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let connector = Connector::new(Some(Duration::from_secs(2)), true);
        let (_stream, addr) = connector.connect("localhost", port).await.unwrap();
        assert!(addr.is_ipv4());
        assert_eq!(addr.port(), port);
    }

    #[tokio::test]
    async fn refused_port_is_unreachable() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let err = Connector::new(None, true)
            .connect("127.0.0.1", port)
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectError::Unreachable { attempts: 1, .. }));
    }

    #[tokio::test]
    async fn stalled_handshake_hits_connect_timeout() {
        // A listener that never accepts stops completing handshakes once its
        // backlog is full, so later connects hang until the deadline.
        let socket = tokio::net::TcpSocket::new_v4().unwrap();
        socket.bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let listener = socket.listen(1).unwrap();
        let port = listener.local_addr().unwrap().port();

        let connector = Connector::new(Some(Duration::from_millis(100)), true);
        let mut held = Vec::new();
        let err = loop {
            match connector.connect("127.0.0.1", port).await {
                Ok((stream, _)) if held.len() < 64 => held.push(stream),
                Ok(_) => panic!("backlog never filled"),
                Err(e) => break e,
            }
        };

        match err {
            ConnectError::Unreachable {
                attempts: 1,
                last: ConnectAttemptError::Timeout(timeout),
                ..
            } => {
                assert_eq!(timeout.operation, "upstream connect");
                assert_eq!(timeout.after, Duration::from_millis(100));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn ipv6_literal_filtered_when_ipv4_only() {
        let err = Connector::new(None, true)
            .connect("::1", 80)
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectError::NoAddress { .. }));
    }

    #[tokio::test]
    async fn unresolvable_host_fails_resolution() {
        let err = Connector::new(None, true)
            .connect("no-such-host.invalid", 80)
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectError::Resolve { .. }));
    }
}
