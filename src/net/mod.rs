//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (bind, accept)
//!     → connection.rs (admission slot, connection ID)
//!     → Hand off to HTTP layer
//!
//! Origin side:
//!     upstream.rs (resolve + connect)
//!     → relay.rs (copy origin bytes back to the client)
//! ```
//!
//! # Design Decisions
//! - A fixed pool of admission slots bounds concurrent connections
//! - Each connection owns its slot; dropping the task releases it
//! - Relay errors end the stream, they are never surfaced to the client

pub mod connection;
pub mod listener;
pub mod relay;
pub mod upstream;

pub use connection::{Admission, AdmissionSlot, ConnectionId};
pub use listener::{Listener, ListenerError};
pub use relay::{relay, RelayEnd, RelayOutcome};
pub use upstream::{ConnectError, Connector, DEFAULT_HTTP_PORT};
