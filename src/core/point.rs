//! Cell and world coordinate types.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// Grid cell (integer column/row indices).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct GridCoord {
    /// Column index
    pub x: i32,
    /// Row index
    pub y: i32,
}

impl GridCoord {
    /// Create a new grid coordinate
    #[inline]
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chebyshev distance (max of x and y distance)
    #[inline]
    pub fn chebyshev_distance(&self, other: &GridCoord) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    /// Euclidean distance in cell units.
    ///
    /// This is the search heuristic and also the cost of a single move
    /// between adjacent cells (1 or sqrt(2)).
    #[inline]
    pub fn euclidean_distance(&self, other: &GridCoord) -> f64 {
        let dx = (other.x - self.x) as f64;
        let dy = (other.y - self.y) as f64;
        dx.hypot(dy)
    }

    /// Get the 8 neighbors (including diagonals)
    #[inline]
    pub fn neighbors_8(&self) -> [GridCoord; 8] {
        [
            GridCoord::new(self.x, self.y + 1),     // N
            GridCoord::new(self.x + 1, self.y + 1), // NE
            GridCoord::new(self.x + 1, self.y),     // E
            GridCoord::new(self.x + 1, self.y - 1), // SE
            GridCoord::new(self.x, self.y - 1),     // S
            GridCoord::new(self.x - 1, self.y - 1), // SW
            GridCoord::new(self.x - 1, self.y),     // W
            GridCoord::new(self.x - 1, self.y + 1), // NW
        ]
    }
}

impl std::fmt::Display for GridCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// World coordinates on the field (meters).
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldPoint {
    pub x: f64,
    pub y: f64,
}

impl WorldPoint {
    /// Create a new world point
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Field origin
    pub const ZERO: WorldPoint = WorldPoint { x: 0.0, y: 0.0 };

    /// Euclidean distance to another point
    #[inline]
    pub fn distance(&self, other: &WorldPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Angle from this point to another (radians, CCW from +X)
    #[inline]
    pub fn angle_to(&self, other: &WorldPoint) -> f64 {
        (other.y - self.y).atan2(other.x - self.x)
    }

    /// Create a point at a given angle and distance from this point
    #[inline]
    pub fn point_at(&self, angle: f64, distance: f64) -> WorldPoint {
        WorldPoint::new(
            self.x + distance * angle.cos(),
            self.y + distance * angle.sin(),
        )
    }

    /// Linear interpolation toward `other` (`t = 0` is self, `t = 1` is other)
    #[inline]
    pub fn lerp(&self, other: &WorldPoint, t: f64) -> WorldPoint {
        WorldPoint::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }

    /// True if both components are finite
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for WorldPoint {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        WorldPoint::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for WorldPoint {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        WorldPoint::new(self.x - other.x, self.y - other.y)
    }
}

impl Mul<f64> for WorldPoint {
    type Output = Self;

    #[inline]
    fn mul(self, scalar: f64) -> Self {
        WorldPoint::new(self.x * scalar, self.y * scalar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_coord_neighbors() {
        let c = GridCoord::new(5, 5);
        let n8 = c.neighbors_8();
        assert_eq!(n8.len(), 8);
        assert!(!n8.contains(&c));
        assert!(n8.iter().all(|n| n.chebyshev_distance(&c) == 1));
    }

    #[test]
    fn test_euclidean_distance() {
        let a = GridCoord::new(0, 0);
        assert!((a.euclidean_distance(&GridCoord::new(3, 4)) - 5.0).abs() < 1e-12);
        assert!((a.euclidean_distance(&GridCoord::new(1, 1)) - std::f64::consts::SQRT_2).abs() < 1e-12);
    }

    #[test]
    fn test_world_point_lerp() {
        let a = WorldPoint::new(0.0, 0.0);
        let b = WorldPoint::new(2.0, 4.0);
        assert_eq!(a.lerp(&b, 0.5), WorldPoint::new(1.0, 2.0));
        assert_eq!(a.lerp(&b, 0.0), a);
        assert_eq!(a.lerp(&b, 1.0), b);
    }

    #[test]
    fn test_world_point_angle() {
        let origin = WorldPoint::ZERO;
        let north = WorldPoint::new(0.0, 1.0);
        assert!((origin.angle_to(&north) - std::f64::consts::FRAC_PI_2).abs() < 1e-12);

        let p = origin.point_at(std::f64::consts::FRAC_PI_2, 2.0);
        assert!(p.x.abs() < 1e-12);
        assert!((p.y - 2.0).abs() < 1e-12);
    }
}
