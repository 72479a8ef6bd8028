//! Path types handed to the trajectory layer.
//!
//! The planner does not interpret [`PathConstraints`] or [`GoalEndState`];
//! they ride along with the geometry so the downstream generator receives a
//! complete path description in one value.

use serde::{Deserialize, Serialize};

use crate::core::WorldPoint;

/// Kinematic limits the trajectory generator should respect.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PathConstraints {
    /// Maximum linear velocity (m/s)
    pub max_velocity: f64,
    /// Maximum linear acceleration (m/s²)
    pub max_acceleration: f64,
    /// Maximum angular velocity (rad/s)
    pub max_angular_velocity: f64,
    /// Maximum angular acceleration (rad/s²)
    pub max_angular_acceleration: f64,
}

impl Default for PathConstraints {
    fn default() -> Self {
        Self {
            max_velocity: 3.0,
            max_acceleration: 3.0,
            max_angular_velocity: 3.0 * std::f64::consts::PI,
            max_angular_acceleration: 4.0 * std::f64::consts::PI,
        }
    }
}

/// Desired state at the end of the path.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GoalEndState {
    /// Velocity at the goal (m/s)
    pub velocity: f64,
    /// Heading at the goal (radians)
    pub rotation: f64,
}

impl GoalEndState {
    pub fn new(velocity: f64, rotation: f64) -> Self {
        Self { velocity, rotation }
    }
}

/// One sampled point on the smoothed curve.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PathPoint {
    pub position: WorldPoint,
    /// Arc length from the first point (meters)
    pub distance_along_path: f64,
}

/// Geometric path plus the downstream parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlannerPath {
    points: Vec<PathPoint>,
    constraints: PathConstraints,
    goal_end_state: GoalEndState,
}

impl PlannerPath {
    /// Wrap sampled positions, computing cumulative distance along the path.
    ///
    /// Returns `None` for fewer than two points.
    pub fn from_points(
        positions: &[WorldPoint],
        constraints: PathConstraints,
        goal_end_state: GoalEndState,
    ) -> Option<Self> {
        if positions.len() < 2 {
            return None;
        }

        let mut distance = 0.0;
        let mut points = Vec::with_capacity(positions.len());
        for (i, position) in positions.iter().enumerate() {
            if i > 0 {
                distance += positions[i - 1].distance(position);
            }
            points.push(PathPoint {
                position: *position,
                distance_along_path: distance,
            });
        }

        Some(Self {
            points,
            constraints,
            goal_end_state,
        })
    }

    #[inline]
    pub fn points(&self) -> &[PathPoint] {
        &self.points
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Total arc length in meters.
    pub fn length(&self) -> f64 {
        self.points.last().map_or(0.0, |p| p.distance_along_path)
    }

    pub fn start(&self) -> Option<WorldPoint> {
        self.points.first().map(|p| p.position)
    }

    pub fn end(&self) -> Option<WorldPoint> {
        self.points.last().map(|p| p.position)
    }

    #[inline]
    pub fn constraints(&self) -> PathConstraints {
        self.constraints
    }

    #[inline]
    pub fn goal_end_state(&self) -> GoalEndState {
        self.goal_end_state
    }
}
