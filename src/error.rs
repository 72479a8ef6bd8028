//! Error types for Marga

use thiserror::Error;

use crate::core::GridCoord;

/// Marga error type
#[derive(Error, Debug)]
pub enum MargaError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Navigation grid error: {0}")]
    NavGrid(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Cell {0} is outside the grid extents")]
    OutOfBounds(GridCoord),
}

impl From<toml::de::Error> for MargaError {
    fn from(e: toml::de::Error) -> Self {
        MargaError::Config(e.to_string())
    }
}

impl From<serde_json::Error> for MargaError {
    fn from(e: serde_json::Error) -> Self {
        MargaError::NavGrid(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MargaError>;
