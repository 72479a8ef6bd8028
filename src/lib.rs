//! Marga - incremental anytime grid pathfinding
//!
//! Keeps an occupancy grid of the field, runs an AD*-style anytime search on
//! a dedicated planning thread, and publishes a smoothed path whenever the
//! start, the goal, or the obstacle set changes.
//!
//! ## Threads
//!
//! - **Caller**: sets start, goal, and obstacles, polls for new paths. Never
//!   blocks on search progress.
//! - **Planning thread**: owns the search state, services requests, and
//!   publishes results. Sleeps for a short poll interval when idle.
//!
//! ## Example
//!
//! ```no_run
//! use std::time::Duration;
//! use marga::{GoalEndState, PathConstraints, PathfindingEngine, WorldPoint};
//!
//! let engine = PathfindingEngine::with_defaults();
//! engine.set_start_position(WorldPoint::new(1.0, 1.0));
//! engine.set_goal_position(WorldPoint::new(12.0, 6.0));
//! engine.wait_until_idle(Duration::from_secs(1));
//!
//! if let Some(path) = engine.current_path(PathConstraints::default(), GoalEndState::default()) {
//!     println!("{} points, {:.2} m", path.len(), path.length());
//! }
//! ```

pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod grid;
pub mod pathfinder;
pub mod planning;
pub mod shared;
pub mod threads;

pub use config::MargaConfig;
pub use core::{GridCoord, WorldPoint};
pub use engine::PathfindingEngine;
pub use error::{MargaError, Result};
pub use grid::{GridGeometry, NavGrid, ObstacleBox, ObstacleMap, OccupancyGrid};
pub use pathfinder::Pathfinder;
pub use planning::{GoalEndState, PathConstraints, PathPoint, PlannerPath};
pub use shared::{PlannerStatus, PublishedPath, RequestFlags};
