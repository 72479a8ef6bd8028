//! Field discretization: geometry, the static map file, and obstacle layers.

mod geometry;
mod navgrid;
mod occupancy;

pub use geometry::GridGeometry;
pub use navgrid::{
    DEFAULT_FIELD_LENGTH, DEFAULT_FIELD_WIDTH, DEFAULT_NODE_SIZE, FieldSize, NavGrid,
};
pub use occupancy::{ObstacleBox, ObstacleMap, OccupancyGrid};
