//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Engine and processors produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (execution times over bounded channels)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → pull accessors on MetricsCollector
//!     → metrics facade → Prometheus scrape (optional)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Metrics never block a walk; saturation drops events
//! - The Prometheus exporter is installed only by the binary

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::{metrics_facade_observer, MetricsCollector, MetricsObserver, MetricsUpdate};
