//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Accept loop and connection handlers produce:
//!     → logging.rs (structured log events, one span per connection)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```

pub mod logging;
pub mod metrics;
