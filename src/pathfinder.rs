//! The pathfinding capability seen by the trajectory and command layers.

use crate::core::WorldPoint;
use crate::grid::ObstacleBox;
use crate::planning::{GoalEndState, PathConstraints, PlannerPath};

/// Source of continuously replanned paths.
///
/// Every method is non-blocking: setters record intent and return, readers
/// return the latest published result. Implementations may plan locally on
/// a background thread or delegate to an offboard search.
pub trait Pathfinder: Send + Sync {
    /// Whether a path was published since the last call. Clears the flag.
    fn is_new_path_available(&self) -> bool;

    /// Latest published path, or `None` if it has fewer than two points.
    fn current_path(
        &self,
        constraints: PathConstraints,
        goal_end_state: GoalEndState,
    ) -> Option<PlannerPath>;

    /// Move the start. Positions inside obstacles snap to the nearest free cell.
    fn set_start_position(&self, position: WorldPoint);

    /// Move the goal. Positions inside obstacles snap to the nearest free cell.
    fn set_goal_position(&self, position: WorldPoint);

    /// Replace the dynamic obstacles. `robot_position` re-seeds the start
    /// when the robot or its current path ends up inside an obstacle.
    fn set_dynamic_obstacles(&self, obstacles: &[ObstacleBox], robot_position: WorldPoint);
}
