//! Obstacle membership for the search.
//!
//! [`OccupancyGrid`] owns the static cells (loaded once) and the dynamic
//! cells (replaced wholesale on every obstacle update). The effective union
//! is materialized into an immutable [`ObstacleMap`] shared by `Arc`, so the
//! planning worker can hold a snapshot while callers install the next one.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use super::geometry::GridGeometry;
use super::navgrid::NavGrid;
use crate::core::{GridCoord, WorldPoint};

/// Axis-aligned obstacle box given by two opposite corners (meters).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ObstacleBox {
    pub corner_a: WorldPoint,
    pub corner_b: WorldPoint,
}

impl ObstacleBox {
    pub fn new(corner_a: WorldPoint, corner_b: WorldPoint) -> Self {
        Self { corner_a, corner_b }
    }
}

/// Effective blocked set (static ∪ dynamic) plus the grid extents.
#[derive(Clone, Debug)]
pub struct ObstacleMap {
    geometry: GridGeometry,
    blocked: HashSet<GridCoord>,
}

impl ObstacleMap {
    /// Build from any set of cells. Cells outside the extents are dropped.
    pub fn new(geometry: GridGeometry, blocked: impl IntoIterator<Item = GridCoord>) -> Self {
        Self {
            geometry,
            blocked: blocked
                .into_iter()
                .filter(|cell| geometry.in_bounds(*cell))
                .collect(),
        }
    }

    /// Map with no blocked cells.
    pub fn empty(geometry: GridGeometry) -> Self {
        Self {
            geometry,
            blocked: HashSet::new(),
        }
    }

    #[inline]
    pub fn geometry(&self) -> GridGeometry {
        self.geometry
    }

    /// Number of blocked cells.
    #[inline]
    pub fn len(&self) -> usize {
        self.blocked.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.blocked.is_empty()
    }

    /// Iterate blocked cells.
    pub fn iter(&self) -> impl Iterator<Item = &GridCoord> {
        self.blocked.iter()
    }

    /// Obstacle membership. Cells outside the extents are always blocked.
    #[inline]
    pub fn is_blocked(&self, cell: GridCoord) -> bool {
        !self.geometry.in_bounds(cell) || self.blocked.contains(&cell)
    }

    #[inline]
    pub fn is_free(&self, cell: GridCoord) -> bool {
        !self.is_blocked(cell)
    }

    /// Free 8-connected neighbors of a cell.
    pub fn free_neighbors(&self, cell: GridCoord) -> impl Iterator<Item = GridCoord> + '_ {
        cell.neighbors_8()
            .into_iter()
            .filter(move |n| self.is_free(*n))
    }

    /// Cost of moving between two adjacent cells.
    ///
    /// Infinite when either endpoint is blocked, or when a diagonal move
    /// would clip a blocked corner cell. Otherwise the Euclidean step length.
    pub fn edge_cost(&self, from: GridCoord, to: GridCoord) -> f64 {
        if self.is_blocked(from) || self.is_blocked(to) {
            return f64::INFINITY;
        }

        if from.x != to.x && from.y != to.y {
            let corner_a = GridCoord::new(to.x, from.y);
            let corner_b = GridCoord::new(from.x, to.y);
            if self.is_blocked(corner_a) || self.is_blocked(corner_b) {
                return f64::INFINITY;
            }
        }

        from.euclidean_distance(&to)
    }

    /// Check that every cell crossed by the segment between two cell
    /// centers is free.
    ///
    /// Uses an all-cells grid traversal: when the segment passes exactly
    /// through a cell corner, both side cells are checked as well, so a
    /// segment can never squeeze diagonally between two blocked cells.
    pub fn line_of_sight(&self, from: GridCoord, to: GridCoord) -> bool {
        let mut dx = (to.x - from.x).abs();
        let mut dy = (to.y - from.y).abs();
        let sx = if to.x > from.x { 1 } else { -1 };
        let sy = if to.y > from.y { 1 } else { -1 };

        let mut x = from.x;
        let mut y = from.y;
        let mut error = dx - dy;
        let mut remaining = 1 + dx + dy;
        dx *= 2;
        dy *= 2;

        while remaining > 0 {
            if self.is_blocked(GridCoord::new(x, y)) {
                return false;
            }

            if error > 0 {
                x += sx;
                error -= dy;
            } else if error < 0 {
                y += sy;
                error += dx;
            } else {
                if remaining > 1
                    && (self.is_blocked(GridCoord::new(x + sx, y))
                        || self.is_blocked(GridCoord::new(x, y + sy)))
                {
                    return false;
                }
                x += sx;
                y += sy;
                error -= dy;
                error += dx;
                remaining -= 1;
            }
            remaining -= 1;
        }

        true
    }

    /// Nearest free cell by breadth-first expansion (8-connected).
    ///
    /// The cell is first clamped into the grid extents. A free cell is
    /// returned unchanged. If no free cell exists anywhere, the clamped cell
    /// is returned as-is.
    pub fn nearest_free(&self, cell: GridCoord) -> GridCoord {
        let origin = self.geometry.clamp(cell);
        if self.is_free(origin) {
            return origin;
        }

        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        visited.insert(origin);
        queue.push_back(origin);

        while let Some(current) = queue.pop_front() {
            if self.is_free(current) {
                return current;
            }
            for neighbor in current.neighbors_8() {
                if self.geometry.in_bounds(neighbor) && visited.insert(neighbor) {
                    queue.push_back(neighbor);
                }
            }
        }

        tracing::warn!("No free cell reachable from {}, keeping it", origin);
        origin
    }
}

/// Static map plus the replaceable dynamic obstacle layer.
#[derive(Debug)]
pub struct OccupancyGrid {
    geometry: GridGeometry,
    static_cells: HashSet<GridCoord>,
    dynamic_cells: HashSet<GridCoord>,
    effective: Arc<ObstacleMap>,
}

impl OccupancyGrid {
    /// Create from a loaded field map with an empty dynamic layer.
    pub fn new(navgrid: &NavGrid) -> Self {
        let geometry = navgrid.geometry();
        let static_cells = navgrid.blocked().clone();
        let effective = Arc::new(ObstacleMap::new(geometry, static_cells.iter().copied()));
        Self {
            geometry,
            static_cells,
            dynamic_cells: HashSet::new(),
            effective,
        }
    }

    #[inline]
    pub fn geometry(&self) -> GridGeometry {
        self.geometry
    }

    /// Current effective obstacle snapshot.
    #[inline]
    pub fn effective(&self) -> Arc<ObstacleMap> {
        Arc::clone(&self.effective)
    }

    #[inline]
    pub fn static_count(&self) -> usize {
        self.static_cells.len()
    }

    #[inline]
    pub fn dynamic_cells(&self) -> &HashSet<GridCoord> {
        &self.dynamic_cells
    }

    /// Rasterize obstacle boxes into cells.
    ///
    /// Both corners are converted to cells and every cell in the inclusive
    /// rectangle between them is blocked, clipped to the grid extents.
    pub fn rasterize(&self, boxes: &[ObstacleBox]) -> HashSet<GridCoord> {
        let mut cells = HashSet::new();
        let max_x = self.geometry.width() as i32 - 1;
        let max_y = self.geometry.height() as i32 - 1;

        for obstacle in boxes {
            if !(obstacle.corner_a.is_finite() && obstacle.corner_b.is_finite()) {
                tracing::warn!("Ignoring obstacle box with non-finite corner: {:?}", obstacle);
                continue;
            }

            let a = self.geometry.to_cell(obstacle.corner_a);
            let b = self.geometry.to_cell(obstacle.corner_b);

            let min_x = a.x.min(b.x).max(0);
            let min_y = a.y.min(b.y).max(0);
            let hi_x = a.x.max(b.x).min(max_x);
            let hi_y = a.y.max(b.y).min(max_y);

            for x in min_x..=hi_x {
                for y in min_y..=hi_y {
                    cells.insert(GridCoord::new(x, y));
                }
            }
        }

        cells
    }

    /// Replace the dynamic layer and rebuild the effective map.
    ///
    /// Returns `false` and leaves everything untouched when the new set
    /// equals the current one.
    pub fn set_dynamic_cells(&mut self, cells: HashSet<GridCoord>) -> bool {
        if cells == self.dynamic_cells {
            return false;
        }

        self.dynamic_cells = cells;
        let union = self.static_cells.union(&self.dynamic_cells).copied();
        self.effective = Arc::new(ObstacleMap::new(self.geometry, union));

        tracing::debug!(
            "Obstacle map rebuilt: {} static + {} dynamic = {} blocked",
            self.static_cells.len(),
            self.dynamic_cells.len(),
            self.effective.len()
        );
        true
    }
}
