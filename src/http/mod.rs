//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted TCP connection + admission slot
//!     → server.rs (accept loop, one task per connection)
//!     → handler.rs (per-connection state machine)
//!         → request.rs (read head, parse)
//!         → rewrite.rs (Connection: close, Host, serialize)
//!         → net::upstream (connect) / net::relay (copy response)
//!         → response.rs (400 / 500 / 501 when the proxy answers itself)
//! ```

pub mod handler;
pub mod request;
pub mod response;
pub mod rewrite;
pub mod server;

pub use handler::{ConnectionHandler, HandlerOutcome};
pub use request::{HeaderField, ParsedRequest, RequestError};
pub use response::ErrorStatus;
pub use rewrite::RewriteError;
pub use server::ProxyServer;
