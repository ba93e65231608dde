//! Resolver input/output types and error definitions

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::scale::RoundingMode;
use crate::atlas::{AtlasError, AtlasResolution, RegionResult};

/// Errors that abort a resolution run
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("No points to resolve")]
    EmptyPoints,

    #[error("No atlases requested")]
    EmptyAtlases,

    #[error("Atlas requested more than once: {0}")]
    DuplicateAtlas(AtlasResolution),

    #[error("Invalid source resolution: {0} um")]
    InvalidSourceResolution(f64),

    #[error("Atlas {atlas} unavailable: {source}")]
    AtlasUnavailable {
        atlas: AtlasResolution,
        source: AtlasError,
    },
}

/// A location in reference space along (AP, DV, ML)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point3D {
    pub ap: f64,
    pub dv: f64,
    pub ml: f64,
}

impl Point3D {
    pub fn new(ap: f64, dv: f64, ml: f64) -> Self {
        Self { ap, dv, ml }
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.ap, self.dv, self.ml]
    }

    pub fn is_finite(&self) -> bool {
        self.ap.is_finite() && self.dv.is_finite() && self.ml.is_finite()
    }
}

/// One point read from a source table, keeping its original row index
#[derive(Debug, Clone, PartialEq)]
pub struct InputRow {
    pub index: usize,
    /// Value of the optional passthrough id column
    pub label: Option<String>,
    pub point: Point3D,
}

impl InputRow {
    /// Wrap bare points, numbering rows by position
    pub fn from_points(points: &[Point3D]) -> Vec<InputRow> {
        points
            .iter()
            .enumerate()
            .map(|(index, point)| InputRow {
                index,
                label: None,
                point: *point,
            })
            .collect()
    }
}

/// Voxel size (um) of the CCF coordinates in cell tables
pub const DEFAULT_SOURCE_RESOLUTION_UM: f64 = 10.0;

fn default_source_resolution_um() -> f64 {
    DEFAULT_SOURCE_RESOLUTION_UM
}

/// Settings for a resolution run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Voxel size (um) the input coordinates are expressed in, whatever atlases
    /// are queried; 1.0 means microns.
    #[serde(default = "default_source_resolution_um")]
    pub source_resolution_um: f64,
    #[serde(default)]
    pub rounding: RoundingMode,
    /// Report the ancestor at this depth of the ontology instead of the leaf
    #[serde(default)]
    pub hierarchy_level: Option<usize>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            source_resolution_um: DEFAULT_SOURCE_RESOLUTION_UM,
            rounding: RoundingMode::default(),
            hierarchy_level: None,
        }
    }
}

/// Regions for one input row, one entry per atlas column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub regions: Vec<RegionResult>,
}

/// Output of a resolution run: input rows in order, atlases as column pairs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    pub atlases: Vec<AtlasResolution>,
    pub rows: Vec<ResultRow>,
}

impl ResultTable {
    /// Look up the result for input row position `row` and `atlas`
    pub fn get(&self, row: usize, atlas: &AtlasResolution) -> Option<&RegionResult> {
        let column = self.atlases.iter().position(|a| a == atlas)?;
        self.rows.get(row).and_then(|r| r.regions.get(column))
    }

    /// Column names after the index (and id) columns
    pub fn region_columns(&self) -> Vec<String> {
        self.atlases
            .iter()
            .flat_map(|a| [a.id_column(), a.acronym_column()])
            .collect()
    }

    /// Number of cells without a region (out of bounds or unlabeled)
    pub fn empty_cells(&self) -> usize {
        self.rows
            .iter()
            .flat_map(|r| r.regions.iter())
            .filter(|r| r.is_empty())
            .count()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
