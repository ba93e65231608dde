//! Test Utilities Module
//!
//! Synthetic atlases and an in-memory atlas service for unit tests.
//! This module is only compiled when running tests.

#![cfg(test)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::atlas::{
    AtlasError, AtlasListItem, AtlasMetadata, AtlasResolution, AtlasService, AtlasVolume,
    Labels, Structure, StructureTree,
};

// ============================================================================
// Synthetic atlas
// ============================================================================

// Same ids, ontology and layout as tests/common/mod.rs; keep the two in sync.
pub const ROOT: u32 = 997;
pub const GREY: u32 = 8;
pub const MB: u32 = 313;
pub const PAG: u32 = 795;
pub const MRN: u32 = 128;
pub const PAG_DL: u32 = 2001;
pub const PAG_VL: u32 = 2002;

/// Physical extent of the synthetic volume in microns (AP, DV, ML)
pub const EXTENT_UM: [usize; 3] = [800, 600, 600];

fn structure(id: u32, acronym: &str, name: &str, path: &[u32]) -> Structure {
    Structure {
        id,
        acronym: acronym.to_string(),
        name: name.to_string(),
        structure_id_path: path.to_vec(),
        rgb_triplet: [128, 128, 128],
    }
}

/// Ontology shared by the synthetic atlases; `kim_mouse` adds PAG subdivisions
pub fn synthetic_structures(atlas: &str) -> Vec<Structure> {
    let mut structures = vec![
        structure(ROOT, "root", "root", &[ROOT]),
        structure(GREY, "grey", "Basic cell groups and regions", &[ROOT, GREY]),
        structure(MB, "MB", "Midbrain", &[ROOT, GREY, MB]),
        structure(PAG, "PAG", "Periaqueductal gray", &[ROOT, GREY, MB, PAG]),
        structure(MRN, "MRN", "Midbrain reticular nucleus", &[ROOT, GREY, MB, MRN]),
    ];
    if atlas == "kim_mouse" {
        structures.push(structure(
            PAG_DL,
            "PAGdl",
            "Periaqueductal gray, dorsolateral",
            &[ROOT, GREY, MB, PAG, PAG_DL],
        ));
        structures.push(structure(
            PAG_VL,
            "PAGvl",
            "Periaqueductal gray, ventrolateral",
            &[ROOT, GREY, MB, PAG, PAG_VL],
        ));
    }
    structures
}

/// Region at a voxel whose origin sits at the given physical position
pub fn region_at(atlas: &str, ap_um: usize, dv_um: usize, ml_um: usize) -> u32 {
    if dv_um < 100 {
        0
    } else if ap_um < 300 {
        match (atlas, ml_um < 300) {
            ("kim_mouse", true) => PAG_DL,
            ("kim_mouse", false) => PAG_VL,
            _ => PAG,
        }
    } else if ap_um < 550 {
        MRN
    } else {
        MB
    }
}

/// Build a synthetic atlas volume at `resolution_um` (must divide 800 and 600
/// evenly enough for the shape to be `EXTENT_UM / resolution_um`)
pub fn synthetic_volume(atlas: &str, resolution_um: u32) -> AtlasVolume {
    let res = resolution_um as usize;
    let shape = EXTENT_UM.map(|e| e / res);

    let mut labels = Vec::with_capacity(shape.iter().product());
    for i in 0..shape[0] {
        for j in 0..shape[1] {
            for k in 0..shape[2] {
                labels.push(region_at(atlas, i * res, j * res, k * res));
            }
        }
    }

    let labels = if atlas == "kim_mouse" {
        Labels::U16(labels.into_iter().map(|l| l as u16).collect())
    } else {
        Labels::U32(labels)
    };

    let metadata = AtlasMetadata {
        name: atlas.to_string(),
        resolution: [f64::from(resolution_um); 3],
        shape,
        version: Some("1.0".to_string()),
        species: Some("Mus musculus".to_string()),
        citation: None,
        atlas_link: None,
        symmetric: false,
        orientation: Some("asr".to_string()),
        annotation_dtype: Default::default(),
    };

    AtlasVolume::new(
        AtlasResolution::new(atlas, resolution_um),
        metadata,
        StructureTree::new(synthetic_structures(atlas)),
        labels,
        format!("synthetic-{}-{}", atlas, resolution_um),
    )
    .expect("synthetic volume has a consistent shape")
}

// ============================================================================
// In-memory atlas service
// ============================================================================

/// Atlas service over prebuilt volumes; unknown atlases are `NotFound`
pub struct StaticAtlasService {
    volumes: HashMap<AtlasResolution, Arc<AtlasVolume>>,
}

impl StaticAtlasService {
    pub fn new(volumes: Vec<AtlasVolume>) -> Self {
        Self {
            volumes: volumes
                .into_iter()
                .map(|v| (v.resolution().clone(), Arc::new(v)))
                .collect(),
        }
    }

    /// allen_mouse at 10 and 25 um plus kim_mouse at 25 um
    pub fn standard() -> Self {
        Self::new(vec![
            synthetic_volume("allen_mouse", 10),
            synthetic_volume("allen_mouse", 25),
            synthetic_volume("kim_mouse", 25),
        ])
    }
}

#[async_trait]
impl AtlasService for StaticAtlasService {
    async fn list_atlases(&self) -> Result<Vec<AtlasListItem>, AtlasError> {
        let mut items: Vec<AtlasListItem> = self
            .volumes
            .keys()
            .map(|atlas| AtlasListItem {
                id: atlas.id(),
                atlas: atlas.atlas.clone(),
                resolution_um: atlas.resolution_um,
                version: Some("1.0".to_string()),
                path: PathBuf::from(atlas.id()),
            })
            .collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(items)
    }

    async fn load(&self, atlas: &AtlasResolution) -> Result<Arc<AtlasVolume>, AtlasError> {
        self.volumes
            .get(atlas)
            .cloned()
            .ok_or_else(|| AtlasError::NotFound(atlas.id()))
    }
}
