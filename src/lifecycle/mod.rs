//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Parse CLI → Load config file → Apply overrides → Validate
//!     → Init logging/metrics → Bind listener → Accept
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGTERM/SIGINT → Stop accepting → Exit
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal and exits non-zero
//! - No drain: in-flight connections are abandoned on shutdown

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{resolve_config, StartupError};
