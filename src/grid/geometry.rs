//! World ↔ cell conversion.
//!
//! Every other module converts through [`GridGeometry`], so cell size and
//! extents live in exactly one place.

use crate::core::{GridCoord, WorldPoint};

/// Cell size and extents of the field grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridGeometry {
    /// Cell edge length in meters
    cell_size: f64,
    /// Number of columns
    width: usize,
    /// Number of rows
    height: usize,
}

impl GridGeometry {
    /// Create a geometry from cell size (meters) and extents (cells).
    pub fn new(cell_size: f64, width: usize, height: usize) -> Self {
        Self {
            cell_size,
            width,
            height,
        }
    }

    /// Geometry covering a field of the given size, rounding extents up.
    pub fn from_field_size(field_x: f64, field_y: f64, cell_size: f64) -> Self {
        let width = (field_x / cell_size).ceil().max(1.0) as usize;
        let height = (field_y / cell_size).ceil().max(1.0) as usize;
        Self::new(cell_size, width, height)
    }

    #[inline]
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Total number of cells.
    #[inline]
    pub fn cell_count(&self) -> usize {
        self.width * self.height
    }

    /// Check whether a cell lies within the grid extents.
    #[inline]
    pub fn in_bounds(&self, cell: GridCoord) -> bool {
        cell.x >= 0 && cell.y >= 0 && (cell.x as usize) < self.width && (cell.y as usize) < self.height
    }

    /// Row-major index of a cell, `None` outside the extents.
    #[inline]
    pub fn index(&self, cell: GridCoord) -> Option<usize> {
        if self.in_bounds(cell) {
            Some(cell.y as usize * self.width + cell.x as usize)
        } else {
            None
        }
    }

    /// Clamp a cell into the grid extents.
    #[inline]
    pub fn clamp(&self, cell: GridCoord) -> GridCoord {
        GridCoord::new(
            cell.x.clamp(0, self.width.saturating_sub(1) as i32),
            cell.y.clamp(0, self.height.saturating_sub(1) as i32),
        )
    }

    /// Convert world coordinates to the containing cell (floor division).
    #[inline]
    pub fn to_cell(&self, point: WorldPoint) -> GridCoord {
        GridCoord::new(
            (point.x / self.cell_size).floor() as i32,
            (point.y / self.cell_size).floor() as i32,
        )
    }

    /// Convert a cell to world coordinates of its lower-left corner (no centering).
    #[inline]
    pub fn to_world(&self, cell: GridCoord) -> WorldPoint {
        WorldPoint::new(
            cell.x as f64 * self.cell_size,
            cell.y as f64 * self.cell_size,
        )
    }

    /// Convert a cell to world coordinates of its center.
    ///
    /// Path extraction emits cell centers; the search itself never leaves
    /// cell space.
    #[inline]
    pub fn cell_center(&self, cell: GridCoord) -> WorldPoint {
        let half = 0.5 * self.cell_size;
        self.to_world(cell) + WorldPoint::new(half, half)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_field_size_rounds_up() {
        let geometry = GridGeometry::from_field_size(16.54, 8.02, 0.2);
        assert_eq!(geometry.width(), 83);
        assert_eq!(geometry.height(), 41);
    }

    #[test]
    fn test_to_cell_floors() {
        let geometry = GridGeometry::new(0.2, 10, 10);
        assert_eq!(geometry.to_cell(WorldPoint::new(0.19, 0.21)), GridCoord::new(0, 1));
        assert_eq!(geometry.to_cell(WorldPoint::new(-0.01, 0.0)), GridCoord::new(-1, 0));
    }

    #[test]
    fn test_world_conversions() {
        let geometry = GridGeometry::new(0.5, 10, 10);
        let cell = GridCoord::new(3, 4);
        assert_eq!(geometry.to_world(cell), WorldPoint::new(1.5, 2.0));
        assert_eq!(geometry.cell_center(cell), WorldPoint::new(1.75, 2.25));
        assert_eq!(geometry.to_cell(geometry.cell_center(cell)), cell);
        assert_eq!(geometry.to_cell(geometry.to_world(cell)), cell);
    }

    #[test]
    fn test_cell_center_inside_footprint() {
        let geometry = GridGeometry::new(0.2, 83, 41);
        for cell in [GridCoord::new(0, 0), GridCoord::new(41, 20), GridCoord::new(82, 40)] {
            let corner = geometry.to_world(cell);
            let center = geometry.cell_center(cell);
            assert!((center.x - corner.x - 0.1).abs() < 1e-12);
            assert!((center.y - corner.y - 0.1).abs() < 1e-12);
            assert_eq!(geometry.to_cell(center), cell);
        }
    }

    #[test]
    fn test_bounds_and_index() {
        let geometry = GridGeometry::new(1.0, 4, 3);
        assert!(geometry.in_bounds(GridCoord::new(3, 2)));
        assert!(!geometry.in_bounds(GridCoord::new(4, 0)));
        assert!(!geometry.in_bounds(GridCoord::new(0, -1)));
        assert_eq!(geometry.index(GridCoord::new(1, 2)), Some(9));
        assert_eq!(geometry.index(GridCoord::new(-1, 2)), None);
        assert_eq!(geometry.clamp(GridCoord::new(9, -3)), GridCoord::new(3, 0));
    }
}
