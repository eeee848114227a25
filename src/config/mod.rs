//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → runtime builds a FlowSnapshot from it
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → runtime builds a new snapshot
//!     → atomic swap of Arc<FlowSnapshot>
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Graph structure errors surface when the snapshot is built

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    ConnectionConfig, EndpointConfig, FlowConfig, GatewayConfig, LogFormat, LoggingConfig, MetricsConfig,
    QuotaConfig, ResourceConfig,
};
pub use watcher::ConfigWatcher;
