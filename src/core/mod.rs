//! Fundamental coordinate types shared by every other module.

mod point;

pub use point::{GridCoord, WorldPoint};
