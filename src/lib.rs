//! Aerial survey coverage analysis over Terrain-RGB tiles.
//!
//! For every terrain pixel inside the polygons of interest, computes how many
//! camera poses image it and the best ground sample distance achieved, then
//! aggregates both per polygon across tiles.

pub mod camera;
pub mod config;
pub mod core;
pub mod coverage;
pub mod loader;
pub mod run;
pub mod stats;
pub mod tiling;
pub mod utils;

pub use camera::{CameraAssignment, CameraModel, CameraSet, Pose};
pub use config::{AnalysisOptions, HistogramConfig, RunConfig};
pub use crate::core::polygon::PolygonWithId;
pub use crate::core::spatial::TileKey;
pub use crate::core::terrain::TerrainTile;
pub use coverage::{TileResult, compute_tile};
pub use loader::{FlatTerrain, TerrainCache, TerrainProvider};
pub use run::{AnalysisRun, CancelFlag, RunReport};
pub use stats::{GSDStats, PolygonSummary, PolygonTileStats};
