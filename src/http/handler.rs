//! Per-connection request handling.
//!
//! # State Machine
//! ```text
//! Read → Parse → Validate → Rewrite → Connect → Forward → Relay → Closed
//!   │      │        │          │         │          │
//!   │      │        ├─ 501 ────┤         │          │
//!   │      │        └─ 400 ────┼─ 500 ───┘          │
//!   └──────┴── silent ─────────┴────────────────────┴──→ Closed
//! ```
//!
//! Every path ends in Closed, which writes at most one error response, shuts
//! the client down and drops the upstream stream.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::config::ProxyConfig;
use crate::http::request::{read_head, ParsedRequest};
use crate::http::response::{send_error, ErrorStatus};
use crate::http::rewrite::rewrite;
use crate::net::{relay, Connector, RelayOutcome};

/// Only method the proxy forwards.
const FORWARDED_METHOD: &str = "GET";

/// How a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// Closed without writing anything; carries the reason label.
    Silent(&'static str),
    /// Answered with a proxy-generated error.
    Rejected(ErrorStatus),
    /// The upstream response was relayed (possibly partially).
    Relayed(RelayOutcome),
}

impl HandlerOutcome {
    /// Label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            HandlerOutcome::Silent(_) => "silent",
            HandlerOutcome::Rejected(ErrorStatus::BadRequest) => "400",
            HandlerOutcome::Rejected(ErrorStatus::InternalServerError) => "500",
            HandlerOutcome::Rejected(ErrorStatus::NotImplemented) => "501",
            HandlerOutcome::Relayed(_) => "relayed",
        }
    }

    /// Finer-grained cause under [`label`](Self::label): why a silent close
    /// happened, or how the relay stopped.
    pub fn reason(&self) -> &'static str {
        match self {
            HandlerOutcome::Silent(reason) => reason,
            HandlerOutcome::Rejected(_) => "rejected",
            HandlerOutcome::Relayed(relay) => relay.end.label(),
        }
    }

    pub fn relayed_bytes(&self) -> u64 {
        match self {
            HandlerOutcome::Relayed(relay) => relay.bytes,
            _ => 0,
        }
    }
}

/// Handles one client connection from first byte to close.
///
/// Cheap to clone; settings are shared.
#[derive(Debug, Clone)]
pub struct ConnectionHandler {
    inner: Arc<Settings>,
}

#[derive(Debug)]
struct Settings {
    buffer_capacity: usize,
    client_read_timeout: Option<Duration>,
    upstream_read_timeout: Option<Duration>,
    connector: Connector,
}

impl ConnectionHandler {
    pub fn new(
        buffer_capacity: usize,
        client_read_timeout: Option<Duration>,
        upstream_read_timeout: Option<Duration>,
        connector: Connector,
    ) -> Self {
        Self {
            inner: Arc::new(Settings {
                buffer_capacity,
                client_read_timeout,
                upstream_read_timeout,
                connector,
            }),
        }
    }

    pub fn from_config(config: &ProxyConfig) -> Self {
        Self::new(
            config.limits.buffer_bytes,
            config.timeouts.client_read(),
            config.timeouts.upstream_read(),
            Connector::from_config(config),
        )
    }

    /// Run the connection to completion.
    pub async fn handle<S>(&self, mut client: S) -> HandlerOutcome
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let outcome = self.process(&mut client).await;

        if let HandlerOutcome::Rejected(status) = outcome {
            if let Err(e) = send_error(&mut client, status).await {
                tracing::debug!(status = %status, error = %e, "Failed to send error response");
            }
        }
        if let Err(e) = client.shutdown().await {
            tracing::trace!(error = %e, "Client shutdown failed");
        }
        outcome
    }

    async fn process<S>(&self, client: &mut S) -> HandlerOutcome
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let settings = &self.inner;

        let head = match read_head(client, settings.buffer_capacity, settings.client_read_timeout)
            .await
        {
            Ok(head) => head,
            Err(e) => {
                tracing::debug!(error = %e, "No request head");
                return HandlerOutcome::Silent(e.kind());
            }
        };

        let mut request = match ParsedRequest::parse(&head) {
            Ok(request) => request,
            Err(e) => {
                tracing::info!(error = %e, "Parsing failed");
                return HandlerOutcome::Silent(e.kind());
            }
        };

        if request.method != FORWARDED_METHOD {
            tracing::info!(method = %request.method, "Method not implemented");
            return HandlerOutcome::Rejected(ErrorStatus::NotImplemented);
        }
        let Some(host) = request.host.clone().filter(|_| request.path.is_some()) else {
            tracing::info!(
                host = ?request.host,
                path = ?request.path,
                "Request missing host or path"
            );
            return HandlerOutcome::Rejected(ErrorStatus::BadRequest);
        };
        let port = request.port_or_default();

        let upstream_head = match rewrite(&mut request, settings.buffer_capacity) {
            Ok(head) => head,
            Err(e) => {
                tracing::warn!(error = %e, "Rewrite failed");
                return HandlerOutcome::Rejected(ErrorStatus::InternalServerError);
            }
        };

        let (mut upstream, upstream_addr) = match settings.connector.connect(&host, port).await {
            Ok(connected) => connected,
            Err(e) => {
                tracing::warn!(host = %host, port, error = %e, "Upstream connect failed");
                return HandlerOutcome::Rejected(ErrorStatus::InternalServerError);
            }
        };

        tracing::debug!(
            upstream = %upstream_addr,
            path = request.path.as_deref().unwrap_or_default(),
            "Forwarding request"
        );
        if let Err(e) = upstream.write_all(&upstream_head).await {
            tracing::warn!(upstream = %upstream_addr, error = %e, "Forwarding request failed");
            return HandlerOutcome::Silent("forward");
        }

        let relayed = relay(
            &mut upstream,
            client,
            settings.buffer_capacity,
            settings.upstream_read_timeout,
        )
        .await;
        drop(upstream);

        HandlerOutcome::Relayed(relayed)
    }
}
