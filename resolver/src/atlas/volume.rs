//! In-memory annotation volume and voxel lookup

use metrics::counter;

use super::structures::StructureTree;
use super::types::{AtlasError, AtlasInfo, AtlasMetadata, AtlasResolution, RegionResult, VoxelIndex};
use crate::resolve::{Point3D, RoundingMode, to_voxel_index};

/// Voxel labels in C order (AP slowest, ML fastest)
#[derive(Debug, Clone)]
pub enum Labels {
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl Labels {
    pub fn len(&self) -> usize {
        match self {
            Labels::U16(v) => v.len(),
            Labels::U32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, offset: usize) -> u32 {
        match self {
            Labels::U16(v) => u32::from(v[offset]),
            Labels::U32(v) => v[offset],
        }
    }
}

/// A loaded atlas: metadata, ontology and labelled voxels. Immutable once built.
#[derive(Debug)]
pub struct AtlasVolume {
    resolution: AtlasResolution,
    metadata: AtlasMetadata,
    structures: StructureTree,
    labels: Labels,
    content_sha256: String,
}

impl AtlasVolume {
    pub fn new(
        resolution: AtlasResolution,
        metadata: AtlasMetadata,
        structures: StructureTree,
        labels: Labels,
        content_sha256: String,
    ) -> Result<Self, AtlasError> {
        let expected = metadata.voxel_count()?;
        if labels.len() != expected {
            return Err(AtlasError::ShapeMismatch {
                expected,
                actual: labels.len(),
            });
        }

        Ok(Self {
            resolution,
            metadata,
            structures,
            labels,
            content_sha256,
        })
    }

    pub fn resolution(&self) -> &AtlasResolution {
        &self.resolution
    }

    pub fn metadata(&self) -> &AtlasMetadata {
        &self.metadata
    }

    pub fn structures(&self) -> &StructureTree {
        &self.structures
    }

    pub fn shape(&self) -> [usize; 3] {
        self.metadata.shape
    }

    /// Voxel edge length in microns along (AP, DV, ML)
    pub fn voxel_size(&self) -> [f64; 3] {
        self.metadata.resolution
    }

    /// Raw label at `index`, or `None` if the index lies outside the volume
    pub fn label_at(&self, index: VoxelIndex) -> Option<u32> {
        let [d0, d1, d2] = self.metadata.shape;
        let [i, j, k] = index;
        if i < 0 || j < 0 || k < 0 {
            return None;
        }
        let (i, j, k) = (i as usize, j as usize, k as usize);
        if i >= d0 || j >= d1 || k >= d2 {
            return None;
        }
        Some(self.labels.get((i * d1 + j) * d2 + k))
    }

    /// Region id and acronym at a voxel index in one pass.
    ///
    /// Out-of-bounds and unlabeled (0) voxels give an empty result.
    pub fn lookup(&self, index: VoxelIndex, hierarchy_level: Option<usize>) -> RegionResult {
        counter!("ccf_lookups_total").increment(1);

        let id = match self.label_at(index) {
            Some(0) => {
                counter!("ccf_lookups_unlabeled_total").increment(1);
                return RegionResult::empty();
            }
            Some(id) => id,
            None => {
                counter!("ccf_lookups_out_of_bounds_total").increment(1);
                return RegionResult::empty();
            }
        };

        let id = match hierarchy_level {
            Some(level) => self.structures.ancestor_at_level(id, level),
            None => id,
        };

        RegionResult {
            id: Some(id),
            acronym: self.structures.acronym(id).map(str::to_string),
        }
    }

    /// Look up a coordinate given either in this atlas's voxels or in microns
    pub fn structure_from_coords(
        &self,
        point: &Point3D,
        microns: bool,
        rounding: RoundingMode,
        hierarchy_level: Option<usize>,
    ) -> RegionResult {
        let source_um = if microns {
            1.0
        } else {
            f64::from(self.resolution.resolution_um)
        };
        match to_voxel_index(point, source_um, self.voxel_size(), rounding) {
            Some(index) => self.lookup(index, hierarchy_level),
            None => {
                counter!("ccf_lookups_out_of_bounds_total").increment(1);
                RegionResult::empty()
            }
        }
    }

    pub fn info(&self) -> AtlasInfo {
        AtlasInfo {
            id: self.resolution.id(),
            atlas: self.resolution.atlas.clone(),
            resolution_um: self.resolution.resolution_um,
            version: self.metadata.version.clone(),
            species: self.metadata.species.clone(),
            shape: self.metadata.shape,
            voxel_size: self.metadata.resolution,
            structure_count: self.structures.len(),
            content_sha256: self.content_sha256.clone(),
        }
    }
}
