//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → shutdown_signal() resolves
//!
//! Shutdown (shutdown.rs):
//!     trigger() → every subscriber (reload loop, metrics workers) stops
//! ```
//!
//! # Design Decisions
//! - One broadcast channel fans the stop out to every background task
//! - In-flight executions are not cancelled here; callers own their streams

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::shutdown_signal;
