//! Flow graph composition and execution engine for an API gateway.
//!
//! Declarative flows (processor graphs keyed by a URL/method/header filter)
//! are compiled into an immutable snapshot, spliced with system flows around
//! them, and walked once per transaction direction.

pub mod clock;
pub mod config;
pub mod context;
pub mod flow;
pub mod lifecycle;
pub mod observability;
pub mod processors;
pub mod resources;
pub mod runtime;
pub mod selector;
pub mod system_flow;

pub use config::GatewayConfig;
pub use lifecycle::Shutdown;
pub use runtime::{ApiStream, Runtime, StreamActions};
