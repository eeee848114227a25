//! Flow selection by filter.
//!
//! # Data Flow
//! ```text
//! Snapshot build:
//!     FlowRepresentation[] (user + system)
//!     → lookup.rs (compile filter into matchers, bucket by flow type)
//!     → Sort by specificity, then name
//!     → Freeze inside the snapshot
//!
//! Request time:
//!     ApiStream (method, url, headers)
//!     → matcher.rs (evaluate each filter)
//!     → SelectorResult { user, system_start, system_end }
//! ```
//!
//! # Design Decisions
//! - Immutable after construction; rebuilt with every snapshot
//! - No regex in hot path (segment matching only)
//! - Deterministic: same input always yields the same ordered flows

pub mod filter;
pub mod lookup;
pub mod matcher;

pub use filter::{ComparableFilter, Filter};
pub use lookup::{FlowSelector, SelectorError, SelectorResult};
pub use matcher::{AndMatcher, HeaderMatcher, Matcher, MethodMatcher, UrlMatcher};
