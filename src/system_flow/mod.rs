//! System flows: reusable fragments spliced into user flows.
//!
//! # Data Flow
//! ```text
//! [[resources]] (filter + processors + anchor lists)
//!     → SystemFlowRepresentation (merged per comparable filter)
//!     → attach_system_flows
//!         ├── splice into every user flow with the same filter
//!         └── unreferenced fragments → standalone SystemFlowStart / SystemFlowEnd
//! ```
//!
//! # Design Decisions
//! - Processor key collisions fail the whole build; nothing is overwritten
//! - Every declared fragment ends up reachable from a stream anchor somewhere

pub mod representation;
pub mod splicer;

pub use representation::{AnchorProcessors, ResourceFlow, SystemFlowRepresentation, TEMPLATE_FLOW_PREFIX};
pub use splicer::{attach_system_flows, merge_by_filter, prune_trivial_response, splice, SplicePosition};
