//! Forwarding HTTP/1.0 proxy.
//!
//! Accepts client connections under a fixed concurrency ceiling, reads one
//! request head per connection, rewrites it to `Connection: close`, forwards
//! it to the origin named in the request and relays the response verbatim.

pub mod cli;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod resilience;

pub use config::schema::ProxyConfig;
pub use http::ProxyServer;
pub use lifecycle::Shutdown;
