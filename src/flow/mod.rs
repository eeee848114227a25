//! Flow representation: the declarative graph a configuration describes.
//!
//! # Data Flow
//! ```text
//! GatewayConfig.flows
//!     → FlowRepresentation (name, type, filter, processors, edges)
//!     → validation.rs (structural checks)
//!     → system_flow splicing
//!     → runtime::FlowGraph (compiled arena)
//! ```
//!
//! # Design Decisions
//! - Edge endpoints are a closed enum; every traversal matches exhaustively
//! - A representation is only mutated while building a configuration version
//! - Processors are kept in a `BTreeMap` so iteration order is stable

pub mod connection;
pub mod error;
pub mod representation;
pub mod validation;

pub use connection::{Anchor, Connection, Direction, Endpoint};
pub use error::FlowError;
pub use representation::{FlowRepresentation, FlowType, ProcessorConfig};
pub use validation::validate_flow;
