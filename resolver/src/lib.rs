//! CCF Resolver Library
//!
//! Maps reference-space coordinates to anatomical regions across several
//! atlases and resolutions. This module exports the components used by the
//! binary, integration tests and benchmarks.

pub mod atlas;
pub mod config;
pub mod pipeline;
pub mod resolve;
pub mod server;
pub mod table;

mod test_utils;

// Re-export commonly used types
pub use atlas::{AtlasError, AtlasResolution, AtlasService, LocalAtlasService, RegionResult};
pub use config::Config;
pub use pipeline::{JobReport, PipelineError, ResolveJob};
pub use resolve::{Point3D, ResolveError, Resolver, ResolverConfig, ResultTable, RoundingMode};
pub use server::{AppState, app};
