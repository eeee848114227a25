//! Scoped key/value context shared between processors.
//!
//! # Data Flow
//! ```text
//! ContextManager (one per engine)
//!     ├── global            → Arc<ContextStore>, engine lifetime
//!     ├── flow(name)        → Arc<ContextStore>, created on first use
//!     └── TransactionalContext (fresh per walk)
//!
//! ExecutionContext bundles the three scopes handed to a processor.
//! ```
//!
//! # Design Decisions
//! - Reading an absent key is an error (`ContextError::NotFound`), never a default
//! - Values are opaque `serde_json::Value`; callers do their own casting
//! - Only single-key operations are atomic

pub mod manager;
pub mod store;

pub use manager::{ContextManager, ExecutionContext, TransactionalContext};
pub use store::{ContextError, ContextStore};
