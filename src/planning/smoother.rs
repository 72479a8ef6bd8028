//! Path extraction and corner smoothing.
//!
//! Turns the planner's cost field into a curve:
//! - Greedy descent from the start cell to a raw cell path
//! - Line-of-sight simplification down to the corner cells
//! - A cubic bezier chain that rounds every corner
//! - Dense sampling of that chain
//!
//! Raw cells are placed at their centers. The first and last control points
//! are the caller's exact start and goal positions.

use crate::config::SmoothingConfig;
use crate::core::{GridCoord, WorldPoint};
use crate::grid::{GridGeometry, ObstacleMap};

use super::adstar::AdStarPlanner;

/// Configuration for extraction and smoothing.
#[derive(Clone, Debug)]
pub struct SmootherConfig {
    /// Anchor placement along each leg toward the corner
    pub anchor_pct: f64,
    /// Bezier control distance as a fraction of leg or anchor spacing
    pub control_pct: f64,
    /// Bezier parameter step for long segments
    pub sample_resolution: f64,
    /// Bezier parameter step for short segments
    pub short_segment_resolution: f64,
    /// Chord length (meters) at or below which a segment is short
    pub short_segment_length: f64,
    /// Greedy extraction step cap
    pub max_extraction_steps: usize,
}

impl Default for SmootherConfig {
    fn default() -> Self {
        Self::from(&SmoothingConfig::default())
    }
}

impl From<&SmoothingConfig> for SmootherConfig {
    fn from(config: &SmoothingConfig) -> Self {
        Self {
            anchor_pct: config.anchor_pct,
            control_pct: config.control_pct,
            sample_resolution: config.sample_resolution,
            short_segment_resolution: config.short_segment_resolution,
            short_segment_length: config.short_segment_length,
            max_extraction_steps: config.max_extraction_steps,
        }
    }
}

/// Every stage of one extraction.
#[derive(Clone, Debug, Default)]
pub struct SmoothedPath {
    /// Cell path from greedy descent
    pub raw: Vec<GridCoord>,
    /// Corner cells kept by line-of-sight simplification
    pub simplified: Vec<GridCoord>,
    /// Bezier chain (1 + 3 per segment points)
    pub control_points: Vec<WorldPoint>,
    /// Sampled curve
    pub points: Vec<WorldPoint>,
}

/// Path extractor and smoother.
pub struct PathSmoother {
    config: SmootherConfig,
}

impl PathSmoother {
    pub fn new(config: SmootherConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(SmootherConfig::default())
    }

    /// Run every stage against the planner's current tables.
    pub fn smooth(
        &self,
        planner: &AdStarPlanner,
        obstacles: &ObstacleMap,
        real_start: WorldPoint,
        real_goal: WorldPoint,
    ) -> SmoothedPath {
        let raw = self.extract(planner, obstacles);
        let simplified = self.simplify(&raw, obstacles);
        let control_points =
            self.control_points(&simplified, obstacles.geometry(), real_start, real_goal);
        let points = self.sample(&control_points);

        SmoothedPath {
            raw,
            simplified,
            control_points,
            points,
        }
    }

    /// Greedy descent from start to goal over `g + edge cost`.
    ///
    /// When no neighbor has a finite cost (goal unreachable from here) the
    /// goal itself is appended, so the path still heads toward it.
    pub fn extract(&self, planner: &AdStarPlanner, obstacles: &ObstacleMap) -> Vec<GridCoord> {
        let start = planner.start();
        let goal = planner.goal();
        if start == goal {
            return vec![goal];
        }

        let mut path = vec![start];
        let mut current = start;

        for _ in 0..self.config.max_extraction_steps {
            let next = obstacles
                .free_neighbors(current)
                .map(|n| (n, planner.g(n) + obstacles.edge_cost(current, n)))
                .filter(|(_, cost)| cost.is_finite())
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(n, _)| n);

            let Some(next) = next else {
                tracing::debug!("No finite descent from {}, jumping to goal {}", current, goal);
                path.push(goal);
                return path;
            };

            path.push(next);
            if next == goal {
                return path;
            }
            current = next;
        }

        tracing::warn!(
            "Path extraction stopped after {} steps short of goal {}",
            self.config.max_extraction_steps,
            goal
        );
        path
    }

    /// Keep only the cells where a straight segment from the last kept cell
    /// would cross an obstacle.
    pub fn simplify(&self, raw: &[GridCoord], obstacles: &ObstacleMap) -> Vec<GridCoord> {
        if raw.len() <= 2 {
            return raw.to_vec();
        }

        let mut simplified = vec![raw[0]];
        for i in 1..raw.len() - 1 {
            let last = simplified[simplified.len() - 1];
            if !obstacles.line_of_sight(last, raw[i + 1]) {
                simplified.push(raw[i]);
            }
        }
        simplified.push(raw[raw.len() - 1]);
        simplified
    }

    /// Bezier chain through the simplified cells with rounded corners.
    ///
    /// Each interior corner contributes two anchors pulled toward it from
    /// its neighbors, each with a control point on either side.
    pub fn control_points(
        &self,
        simplified: &[GridCoord],
        geometry: GridGeometry,
        real_start: WorldPoint,
        real_goal: WorldPoint,
    ) -> Vec<WorldPoint> {
        let mut field: Vec<WorldPoint> = simplified
            .iter()
            .map(|cell| geometry.cell_center(*cell))
            .collect();

        match field.len() {
            0 => return Vec::new(),
            1 => return vec![real_goal],
            _ => {}
        }

        let n = field.len();
        field[0] = real_start;
        field[n - 1] = real_goal;

        let anchor_pct = self.config.anchor_pct;
        let control_pct = self.config.control_pct;

        let mut bezier = Vec::with_capacity(4 + 6 * (n - 2));
        bezier.push(field[0]);
        bezier.push(field[0].lerp(&field[1], control_pct));

        for i in 1..n - 1 {
            let last = field[i - 1];
            let current = field[i];
            let next = field[i + 1];

            let anchor1 = last.lerp(&current, anchor_pct);
            let anchor2 = next.lerp(&current, anchor_pct);
            let control_dist = anchor1.distance(&anchor2) * control_pct;

            let prev_control1 = anchor1.lerp(&last, control_pct);
            let next_control1 = anchor1.point_at(prev_control1.angle_to(&anchor1), control_dist);

            let prev_control2 = anchor2.point_at(next.angle_to(&anchor2), control_dist);
            let next_control2 = anchor2.lerp(&next, control_pct);

            bezier.extend([
                prev_control1,
                anchor1,
                next_control1,
                prev_control2,
                anchor2,
                next_control2,
            ]);
        }

        bezier.push(field[n - 1].lerp(&field[n - 2], control_pct));
        bezier.push(field[n - 1]);
        bezier
    }

    /// Sample the bezier chain. The last control point is always included.
    pub fn sample(&self, control_points: &[WorldPoint]) -> Vec<WorldPoint> {
        if control_points.len() < 4 {
            return control_points.to_vec();
        }

        let segments = (control_points.len() - 1) / 3;
        let mut points = Vec::new();

        for segment in control_points.windows(4).step_by(3).take(segments) {
            let (p1, p2, p3, p4) = (segment[0], segment[1], segment[2], segment[3]);

            let resolution = if p1.distance(&p4) <= self.config.short_segment_length {
                self.config.short_segment_resolution
            } else {
                self.config.sample_resolution
            };
            let steps = (1.0 / resolution).round().max(1.0) as usize;

            for k in 0..steps {
                let t = k as f64 / steps as f64;
                points.push(cubic_lerp(p1, p2, p3, p4, t));
            }
        }

        if let Some(last) = control_points.last() {
            points.push(*last);
        }
        points
    }
}

/// Point on a cubic bezier by repeated linear interpolation.
fn cubic_lerp(p1: WorldPoint, p2: WorldPoint, p3: WorldPoint, p4: WorldPoint, t: f64) -> WorldPoint {
    let a = p1.lerp(&p2, t);
    let b = p2.lerp(&p3, t);
    let c = p3.lerp(&p4, t);
    let d = a.lerp(&b, t);
    let e = b.lerp(&c, t);
    d.lerp(&e, t)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solved(map: &ObstacleMap, start: GridCoord, goal: GridCoord) -> AdStarPlanner {
        let mut planner = AdStarPlanner::with_defaults(map.geometry());
        planner.reset(start, goal).unwrap();
        planner.improve(start, map).unwrap();
        while planner.refine(start, map).unwrap().is_some() {}
        planner
    }

    #[test]
    fn test_extract_straight_line() {
        let map = ObstacleMap::empty(GridGeometry::new(1.0, 10, 10));
        let planner = solved(&map, GridCoord::new(0, 0), GridCoord::new(5, 0));
        let raw = PathSmoother::with_defaults().extract(&planner, &map);

        let expected: Vec<_> = (0..=5).map(|x| GridCoord::new(x, 0)).collect();
        assert_eq!(raw, expected);
    }

    #[test]
    fn test_extract_start_is_goal() {
        let map = ObstacleMap::empty(GridGeometry::new(1.0, 4, 4));
        let planner = solved(&map, GridCoord::new(2, 2), GridCoord::new(2, 2));
        let raw = PathSmoother::with_defaults().extract(&planner, &map);
        assert_eq!(raw, vec![GridCoord::new(2, 2)]);
    }

    #[test]
    fn test_extract_unreachable_heads_to_goal() {
        let geometry = GridGeometry::new(1.0, 10, 10);
        let wall = (0..10).map(|y| GridCoord::new(5, y));
        let map = ObstacleMap::new(geometry, wall);
        let planner = solved(&map, GridCoord::new(0, 0), GridCoord::new(9, 9));

        let raw = PathSmoother::with_defaults().extract(&planner, &map);
        assert_eq!(raw, vec![GridCoord::new(0, 0), GridCoord::new(9, 9)]);
    }

    #[test]
    fn test_simplify_around_block() {
        let geometry = GridGeometry::new(1.0, 10, 10);
        let block = [(3, 0), (3, 1), (3, 2)].map(|(x, y)| GridCoord::new(x, y));
        let map = ObstacleMap::new(geometry, block);
        let planner = solved(&map, GridCoord::new(0, 0), GridCoord::new(6, 0));

        let smoother = PathSmoother::with_defaults();
        let raw = smoother.extract(&planner, &map);
        let simplified = smoother.simplify(&raw, &map);

        assert_eq!(raw.last(), Some(&GridCoord::new(6, 0)));
        assert!(simplified.len() >= 3, "must bend around the block: {:?}", simplified);
        assert!(simplified.len() < raw.len());
        for pair in simplified.windows(2) {
            assert!(map.line_of_sight(pair[0], pair[1]), "segment {:?} is blocked", pair);
        }
    }

    #[test]
    fn test_control_points_use_real_endpoints() {
        let smoother = PathSmoother::with_defaults();
        let geometry = GridGeometry::new(0.5, 20, 20);
        let simplified = [
            GridCoord::new(0, 0),
            GridCoord::new(6, 0),
            GridCoord::new(6, 6),
        ];
        let start = WorldPoint::new(0.1, 0.05);
        let goal = WorldPoint::new(3.3, 3.4);

        let control = smoother.control_points(&simplified, geometry, start, goal);
        assert_eq!(control.len(), 4 + 6);
        assert_eq!(control[0], start);
        assert_eq!(*control.last().unwrap(), goal);

        let points = smoother.sample(&control);
        assert_eq!(points[0], start);
        assert_eq!(*points.last().unwrap(), goal);
    }

    #[test]
    fn test_single_cell_path_has_only_goal() {
        let smoother = PathSmoother::with_defaults();
        let geometry = GridGeometry::new(1.0, 4, 4);
        let goal = WorldPoint::new(1.2, 1.7);
        let control = smoother.control_points(&[GridCoord::new(1, 1)], geometry, WorldPoint::ZERO, goal);
        assert_eq!(control, vec![goal]);
        assert_eq!(smoother.sample(&control), vec![goal]);
    }

    #[test]
    fn test_sample_resolution_by_chord() {
        let smoother = PathSmoother::with_defaults();
        let short = [
            WorldPoint::new(0.0, 0.0),
            WorldPoint::new(0.2, 0.0),
            WorldPoint::new(0.6, 0.0),
            WorldPoint::new(0.8, 0.0),
        ];
        // 5 samples at t = 0.0..0.8 plus the final point
        assert_eq!(smoother.sample(&short).len(), 6);

        let long = short.map(|p| p * 10.0);
        assert_eq!(smoother.sample(&long).len(), 21);
    }

    #[test]
    fn test_cubic_lerp_endpoints() {
        let p1 = WorldPoint::new(0.0, 0.0);
        let p2 = WorldPoint::new(1.0, 2.0);
        let p3 = WorldPoint::new(3.0, 2.0);
        let p4 = WorldPoint::new(4.0, 0.0);
        assert_eq!(cubic_lerp(p1, p2, p3, p4, 0.0), p1);
        assert_eq!(cubic_lerp(p1, p2, p3, p4, 1.0), p4);
        let mid = cubic_lerp(p1, p2, p3, p4, 0.5);
        assert!((mid.x - 2.0).abs() < 1e-12);
        assert!((mid.y - 1.5).abs() < 1e-12);
    }
}
