//! Incremental anytime path planning.
//!
//! - [`search`]: per-episode tables (`g`, `rhs`, open, incons, closed)
//! - [`adstar`]: the anytime search over those tables
//! - [`smoother`]: cost field → cell path → bezier curve
//! - [`path`]: the path value handed to the trajectory layer

pub mod adstar;
pub mod path;
pub mod search;
pub mod smoother;

pub use adstar::{AdStarConfig, AdStarPlanner, PassStats};
pub use path::{GoalEndState, PathConstraints, PathPoint, PlannerPath};
pub use search::{OpenList, SearchKey, SearchState};
pub use smoother::{PathSmoother, SmoothedPath, SmootherConfig};
