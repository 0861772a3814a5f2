//! TCP listener implementation.
//!
//! # Responsibilities
//! - Bind to the configured IPv4 address with address reuse enabled
//! - Accept incoming TCP connections
//! - Surface bind failures as fatal and accept failures as transient

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use tokio::net::{TcpListener, TcpSocket, TcpStream};

use crate::config::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// Failed to create, configure, bind or listen on the socket.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    /// Failed to accept a connection.
    #[error("Failed to accept: {0}")]
    Accept(#[source] std::io::Error),
}

/// The proxy's listening socket.
pub struct Listener {
    inner: TcpListener,
}

impl Listener {
    /// Bind to `bind_address:port` with `SO_REUSEADDR` so restarts do not fail
    /// on a lingering socket.
    pub fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let display_addr = format!("{}:{}", config.bind_address, config.port);
        let bind_err = |source| ListenerError::Bind {
            addr: display_addr.clone(),
            source,
        };

        let ip: Ipv4Addr = config.bind_address.parse().map_err(|e| {
            bind_err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
        })?;
        let addr = SocketAddr::V4(SocketAddrV4::new(ip, config.port));

        let socket = TcpSocket::new_v4().map_err(bind_err)?;
        socket.set_reuseaddr(true).map_err(bind_err)?;
        socket.bind(addr).map_err(bind_err)?;
        let inner = socket.listen(config.backlog).map_err(bind_err)?;

        let local_addr = inner.local_addr().map_err(bind_err)?;
        tracing::info!(
            address = %local_addr,
            backlog = config.backlog,
            "Listener bound"
        );

        Ok(Self { inner })
    }

    /// Accept the next connection.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), ListenerError> {
        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;
        tracing::debug!(peer_addr = %addr, "Connection accepted");
        Ok((stream, addr))
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }
}
