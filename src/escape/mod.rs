//! Escape planning and the protocol catalog.
//!
//! When flexibility runs low the planner answers "how do we get out?":
//!
//! 1. [`analyze_constraints`] combines constraints per category
//! 2. [`assess_resources`] estimates what the session can still spend
//! 3. [`ProtocolCatalog::recommend`] picks a protocol for the flexibility band
//! 4. [`synthesize_trajectory`] and [`build_execution_plan`] lay out the phases
//!
//! [`EscapePlanner::plan`] runs all four and adds feasibility, success odds
//! and warnings.

mod constraints;
mod planner;
mod protocols;
mod resources;
mod trajectory;

pub use constraints::*;
pub use planner::*;
pub use protocols::*;
pub use resources::*;
pub use trajectory::*;
