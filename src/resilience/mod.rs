//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Client head read / upstream connect / upstream read:
//!     → timeouts.rs (enforce the configured deadline, if any)
//!     → On timeout: the handler closes the connection
//! ```
//!
//! # Design Decisions
//! - Nothing is retried except the outer accept call
//! - Deadlines are opt-in; the default is to block like the underlying socket

pub mod timeouts;

pub use timeouts::{with_deadline, TimeoutError};
