//! Atlas-related types and error definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur when working with atlases
#[derive(Debug, Error)]
pub enum AtlasError {
    #[error("Atlas not found: {0}")]
    NotFound(String),

    #[error("Invalid atlas identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Failed to load atlas {atlas}: {reason}")]
    LoadError { atlas: String, reason: String },

    #[error("Invalid atlas metadata: {0}")]
    InvalidMetadata(String),

    #[error("Annotation size mismatch: expected {expected} voxels, found {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("Unsupported annotation format: {0}")]
    UnsupportedFormat(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Integer voxel index along (AP, DV, ML). Signed so that coordinates left of
/// the origin stay representable and are reported as out of bounds.
pub type VoxelIndex = [i64; 3];

/// An atlas reference image at a given voxel size, e.g. `allen_mouse_25um`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AtlasResolution {
    /// Atlas name without the resolution suffix (`allen_mouse`, `kim_mouse`)
    pub atlas: String,
    /// Voxel edge length in microns
    pub resolution_um: u32,
}

impl AtlasResolution {
    pub fn new(atlas: impl Into<String>, resolution_um: u32) -> Self {
        Self {
            atlas: atlas.into(),
            resolution_um,
        }
    }

    /// Identifier in BrainGlobe form, e.g. `allen_mouse_25um`
    pub fn id(&self) -> String {
        format!("{}_{}um", self.atlas, self.resolution_um)
    }

    /// Prefix used for output table columns, e.g. `allen_mouse_25`
    pub fn column_prefix(&self) -> String {
        format!("{}_{}", self.atlas, self.resolution_um)
    }

    pub fn id_column(&self) -> String {
        format!("{}_id", self.column_prefix())
    }

    pub fn acronym_column(&self) -> String {
        format!("{}_acronym", self.column_prefix())
    }

    /// Parse an installed atlas directory name such as `allen_mouse_25um_v1.2`.
    ///
    /// Returns the atlas and its version suffix, if any.
    pub fn from_dir_name(name: &str) -> Option<(Self, Option<String>)> {
        if let Some((head, version)) = name.rsplit_once("_v")
            && let Ok(atlas) = head.parse::<Self>()
        {
            return Some((atlas, Some(version.to_string())));
        }
        name.parse::<Self>().ok().map(|atlas| (atlas, None))
    }
}

impl fmt::Display for AtlasResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}um", self.atlas, self.resolution_um)
    }
}

impl FromStr for AtlasResolution {
    type Err = AtlasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AtlasError::InvalidIdentifier(s.to_string());

        let (atlas, suffix) = s.trim().rsplit_once('_').ok_or_else(invalid)?;
        let resolution_um = suffix
            .strip_suffix("um")
            .and_then(|r| r.parse::<u32>().ok())
            .filter(|r| *r > 0)
            .ok_or_else(invalid)?;

        if atlas.is_empty() {
            return Err(invalid());
        }

        Ok(Self::new(atlas, resolution_um))
    }
}

impl TryFrom<String> for AtlasResolution {
    type Error = AtlasError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AtlasResolution> for String {
    fn from(value: AtlasResolution) -> Self {
        value.id()
    }
}

/// Voxel storage type of the annotation volume
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationDtype {
    Uint16,
    #[default]
    Uint32,
}

impl AnnotationDtype {
    /// Bytes per voxel
    pub fn width(self) -> usize {
        match self {
            AnnotationDtype::Uint16 => 2,
            AnnotationDtype::Uint32 => 4,
        }
    }
}

/// Contents of an atlas directory's `metadata.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtlasMetadata {
    /// Atlas name (`allen_mouse`)
    pub name: String,
    /// Voxel size in microns along (AP, DV, ML)
    pub resolution: [f64; 3],
    /// Volume shape in voxels along (AP, DV, ML)
    pub shape: [usize; 3],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub species: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub atlas_link: Option<String>,
    #[serde(default)]
    pub symmetric: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orientation: Option<String>,
    #[serde(default)]
    pub annotation_dtype: AnnotationDtype,
}

impl AtlasMetadata {
    /// Total number of voxels in the volume
    pub fn voxel_count(&self) -> Result<usize, AtlasError> {
        self.shape
            .iter()
            .try_fold(1usize, |count, &dim| count.checked_mul(dim))
            .ok_or_else(|| {
                AtlasError::InvalidMetadata(format!("shape {:?} is too large", self.shape))
            })
    }

    /// Check that the metadata describes a usable volume for `atlas`
    pub fn validate(&self, atlas: &AtlasResolution) -> Result<(), AtlasError> {
        if self.name != atlas.atlas {
            return Err(AtlasError::InvalidMetadata(format!(
                "name '{}' does not match atlas {}",
                self.name, atlas
            )));
        }
        if self.shape.contains(&0) {
            return Err(AtlasError::InvalidMetadata(format!(
                "empty shape {:?}",
                self.shape
            )));
        }
        self.voxel_count()?;
        if self.resolution.iter().any(|r| !r.is_finite() || *r <= 0.0) {
            return Err(AtlasError::InvalidMetadata(format!(
                "invalid resolution {:?}",
                self.resolution
            )));
        }
        if self.resolution[0] != f64::from(atlas.resolution_um) {
            return Err(AtlasError::InvalidMetadata(format!(
                "resolution {:?} does not match atlas {}",
                self.resolution, atlas
            )));
        }
        Ok(())
    }
}

/// Outcome of resolving one coordinate against one atlas.
///
/// Both fields are `None` when the coordinate lies outside the volume or on an
/// unlabeled voxel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionResult {
    pub id: Option<u32>,
    pub acronym: Option<String>,
}

impl RegionResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_none()
    }
}

/// Summary info for an installed atlas (does not require loading the volume)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtlasListItem {
    pub id: String,
    pub atlas: String,
    pub resolution_um: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub path: PathBuf,
}

/// Details of a loaded atlas volume
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtlasInfo {
    pub id: String,
    pub atlas: String,
    pub resolution_um: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub species: Option<String>,
    pub shape: [usize; 3],
    pub voxel_size: [f64; 3],
    pub structure_count: usize,
    /// SHA-256 of the decoded annotation bytes
    pub content_sha256: String,
}
