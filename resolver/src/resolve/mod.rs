//! Coordinate resolver: maps reference-space points onto atlas regions
//! across atlases, resolutions and naming conventions.

mod resolver;
mod scale;
mod types;

pub use resolver::Resolver;
pub use scale::{RoundingMode, to_voxel_index};
pub use types::{InputRow, Point3D, ResolveError, ResolverConfig, ResultRow, ResultTable};
