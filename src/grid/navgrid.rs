//! Field map loading.
//!
//! The field map is a JSON document produced by the field tooling:
//!
//! ```json
//! {
//!   "field_size": { "x": 16.54, "y": 8.02 },
//!   "nodeSizeMeters": 0.2,
//!   "grid": [[false, true, ...], ...]
//! }
//! ```
//!
//! `grid[row][col] == true` marks cell `(col, row)` as a static obstacle.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::geometry::GridGeometry;
use crate::core::GridCoord;
use crate::error::{MargaError, Result};

/// Default field length (x) in meters.
pub const DEFAULT_FIELD_LENGTH: f64 = 16.54;
/// Default field width (y) in meters.
pub const DEFAULT_FIELD_WIDTH: f64 = 8.02;
/// Default cell size in meters.
pub const DEFAULT_NODE_SIZE: f64 = 0.2;

/// Field size section of the map file.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct FieldSize {
    pub x: f64,
    pub y: f64,
}

/// On-disk map document.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct NavGridFile {
    #[serde(rename = "nodeSizeMeters")]
    node_size_meters: f64,
    grid: Vec<Vec<bool>>,
    #[serde(default)]
    field_size: Option<FieldSize>,
}

/// Static field map: geometry plus statically blocked cells.
#[derive(Clone, Debug)]
pub struct NavGrid {
    geometry: GridGeometry,
    field_size: FieldSize,
    blocked: HashSet<GridCoord>,
}

impl Default for NavGrid {
    /// Nominal field with no static obstacles.
    fn default() -> Self {
        let geometry =
            GridGeometry::from_field_size(DEFAULT_FIELD_LENGTH, DEFAULT_FIELD_WIDTH, DEFAULT_NODE_SIZE);
        Self {
            geometry,
            field_size: FieldSize {
                x: DEFAULT_FIELD_LENGTH,
                y: DEFAULT_FIELD_WIDTH,
            },
            blocked: HashSet::new(),
        }
    }
}

impl NavGrid {
    /// Build a map programmatically. Cells outside the extents are dropped.
    pub fn new(geometry: GridGeometry, blocked: impl IntoIterator<Item = GridCoord>) -> Self {
        let blocked = blocked
            .into_iter()
            .filter(|cell| geometry.in_bounds(*cell))
            .collect();
        Self {
            geometry,
            field_size: FieldSize {
                x: geometry.width() as f64 * geometry.cell_size(),
                y: geometry.height() as f64 * geometry.cell_size(),
            },
            blocked,
        }
    }

    /// Parse a map document.
    pub fn from_json(content: &str) -> Result<Self> {
        let file: NavGridFile = serde_json::from_str(content)?;

        if !(file.node_size_meters.is_finite() && file.node_size_meters > 0.0) {
            return Err(MargaError::NavGrid(format!(
                "nodeSizeMeters must be positive, got {}",
                file.node_size_meters
            )));
        }

        let height = file.grid.len();
        let width = file.grid.first().map(Vec::len).unwrap_or(0);
        if width == 0 || height == 0 {
            return Err(MargaError::NavGrid("grid is empty".to_string()));
        }
        if let Some((row, cells)) = file
            .grid
            .iter()
            .enumerate()
            .find(|(_, cells)| cells.len() != width)
        {
            return Err(MargaError::NavGrid(format!(
                "row {} has {} columns, expected {}",
                row,
                cells.len(),
                width
            )));
        }

        let geometry = GridGeometry::new(file.node_size_meters, width, height);

        let mut blocked = HashSet::new();
        for (row, cells) in file.grid.iter().enumerate() {
            for (col, &is_obstacle) in cells.iter().enumerate() {
                if is_obstacle {
                    blocked.insert(GridCoord::new(col as i32, row as i32));
                }
            }
        }

        let field_size = file.field_size.unwrap_or(FieldSize {
            x: width as f64 * file.node_size_meters,
            y: height as f64 * file.node_size_meters,
        });

        Ok(Self {
            geometry,
            field_size,
            blocked,
        })
    }

    /// Load a map document from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MargaError::NavGrid(format!("Failed to read {:?}: {}", path, e)))?;
        Self::from_json(&content)
    }

    /// Load a map, falling back to the default field on any failure.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            tracing::info!("No navigation grid configured, using default field");
            return Self::default();
        };

        match Self::load(path) {
            Ok(grid) => {
                tracing::info!(
                    "Loaded navigation grid {:?}: {}x{} cells @ {:.2}m, {} static obstacles",
                    path,
                    grid.geometry.width(),
                    grid.geometry.height(),
                    grid.geometry.cell_size(),
                    grid.blocked.len()
                );
                grid
            }
            Err(e) => {
                tracing::warn!("{}; using default field with no obstacles", e);
                Self::default()
            }
        }
    }

    /// Serialize back to the map document format.
    pub fn to_json(&self) -> Result<String> {
        let grid = (0..self.geometry.height() as i32)
            .map(|row| {
                (0..self.geometry.width() as i32)
                    .map(|col| self.blocked.contains(&GridCoord::new(col, row)))
                    .collect()
            })
            .collect();

        let file = NavGridFile {
            node_size_meters: self.geometry.cell_size(),
            grid,
            field_size: Some(self.field_size),
        };
        Ok(serde_json::to_string(&file)?)
    }

    #[inline]
    pub fn geometry(&self) -> GridGeometry {
        self.geometry
    }

    #[inline]
    pub fn field_size(&self) -> FieldSize {
        self.field_size
    }

    /// Statically blocked cells.
    #[inline]
    pub fn blocked(&self) -> &HashSet<GridCoord> {
        &self.blocked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_navgrid() {
        let json = r#"{
            "field_size": {"x": 0.6, "y": 0.4},
            "nodeSizeMeters": 0.2,
            "grid": [[false, true, false], [false, false, true]]
        }"#;
        let grid = NavGrid::from_json(json).unwrap();

        assert_eq!(grid.geometry().width(), 3);
        assert_eq!(grid.geometry().height(), 2);
        assert!((grid.geometry().cell_size() - 0.2).abs() < 1e-12);
        assert_eq!(grid.blocked().len(), 2);
        assert!(grid.blocked().contains(&GridCoord::new(1, 0)));
        assert!(grid.blocked().contains(&GridCoord::new(2, 1)));
    }

    #[test]
    fn test_missing_field_size_uses_extents() {
        let json = r#"{"nodeSizeMeters": 0.5, "grid": [[false, false], [false, false]]}"#;
        let grid = NavGrid::from_json(json).unwrap();
        assert!((grid.field_size().x - 1.0).abs() < 1e-12);
        assert!((grid.field_size().y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_reject_ragged_grid() {
        let json = r#"{"nodeSizeMeters": 0.2, "grid": [[false, false], [false]]}"#;
        assert!(matches!(NavGrid::from_json(json), Err(MargaError::NavGrid(_))));
    }

    #[test]
    fn test_reject_bad_node_size() {
        let json = r#"{"nodeSizeMeters": 0.0, "grid": [[false]]}"#;
        assert!(NavGrid::from_json(json).is_err());
    }

    #[test]
    fn test_default_field() {
        let grid = NavGrid::default();
        assert_eq!(grid.geometry().width(), 83);
        assert_eq!(grid.geometry().height(), 41);
        assert!(grid.blocked().is_empty());
    }

    #[test]
    fn test_load_or_default_falls_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();

        let grid = NavGrid::load_or_default(Some(file.path()));
        assert_eq!(grid.geometry(), NavGrid::default().geometry());

        let missing = NavGrid::load_or_default(Some(Path::new("/nonexistent/navgrid.json")));
        assert!(missing.blocked().is_empty());
    }

    #[test]
    fn test_json_round_trip_preserves_obstacles() {
        let geometry = GridGeometry::new(0.25, 4, 3);
        let grid = NavGrid::new(geometry, [GridCoord::new(1, 1), GridCoord::new(3, 2)]);
        let parsed = NavGrid::from_json(&grid.to_json().unwrap()).unwrap();
        assert_eq!(parsed.geometry(), geometry);
        assert_eq!(parsed.blocked(), grid.blocked());
    }
}
