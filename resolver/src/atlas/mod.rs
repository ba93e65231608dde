//! Atlas module for loading labelled reference volumes and looking up regions
//!
//! This module provides:
//! - `AtlasService` trait for abstracting atlas sources
//! - `LocalAtlasService` for reading installed BrainGlobe-style atlas directories
//! - `AtlasVolume` for voxel lookups returning region id and acronym together
//! - HTTP routes for listing atlases and single-point lookups

mod cache;
mod local;
pub mod reader;
pub mod routes;
mod service;
mod structures;
mod types;
mod volume;

pub use local::LocalAtlasService;
pub use reader::AtlasReader;
pub use routes::{AtlasAppState, atlas_routes};
pub use service::AtlasService;
pub use structures::{Structure, StructureTree};
pub use types::{
    AnnotationDtype, AtlasError, AtlasInfo, AtlasListItem, AtlasMetadata, AtlasResolution,
    RegionResult, VoxelIndex,
};
pub use volume::{AtlasVolume, Labels};
