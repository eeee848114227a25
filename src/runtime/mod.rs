//! Flow graph execution subsystem.
//!
//! # Data Flow
//! ```text
//! GatewayConfig
//!     → engine.rs (quotas → Resources, flows/resources → representations)
//!     → graph.rs (validate, splice, build processors, compile arenas, selector)
//!     → FlowSnapshot stored in ArcSwap
//!
//! Per stream:
//!     ApiStream (from the transport)
//!     → selector (user / system-start / system-end flows)
//!     → engine.rs walks each flow's direction graph
//!     → StreamActions returned to the transport
//! ```
//!
//! # Design Decisions
//! - Compiled graphs are immutable; reload swaps a whole snapshot
//! - Request and response are independent walks sharing only flow and global scopes
//! - The engine never talks to peers; it only returns actions

pub mod actions;
pub mod engine;
pub mod graph;
pub mod stream;

pub use actions::{Action, EarlyResponse, GeneratedRequest, Modification, StreamActions};
pub use engine::Runtime;
pub use graph::{BuildError, DirectionGraph, Edge, FlowGraph, FlowSnapshot, Node, NodeId, Target};
pub use stream::ApiStream;
