//! Background threads.
//!
//! A single planning thread owns the search state; callers talk to it only
//! through [`crate::shared`].

mod planner;

pub use planner::{PlanningThread, PlanningThreadConfig};
