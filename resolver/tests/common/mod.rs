//! Common Test Utilities for Integration Tests
//!
//! Writes synthetic atlases to a temporary atlas directory in the on-disk
//! layout read by `LocalAtlasService`.

#![allow(dead_code)]

use axum::Router;
use ccf_resolver::atlas::{AnnotationDtype, AtlasMetadata, Structure};
use ccf_resolver::config::AtlasConfig;
use ccf_resolver::{AppState, LocalAtlasService, ResolverConfig, app};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

// Same ids, ontology and layout as src/test_utils.rs; keep the two in sync.
pub const ROOT: u32 = 997;
pub const GREY: u32 = 8;
pub const MB: u32 = 313;
pub const PAG: u32 = 795;
pub const MRN: u32 = 128;
pub const PAG_DL: u32 = 2001;
pub const PAG_VL: u32 = 2002;

/// Physical extent of every synthetic atlas in microns (AP, DV, ML)
pub const EXTENT_UM: [usize; 3] = [800, 600, 600];

/// Region at a voxel whose origin sits at the given physical position.
///
/// Unlabeled above DV 100 um; PAG (split dorsolateral/ventrolateral in
/// `kim_mouse`) before AP 300 um; MRN before AP 550 um; midbrain after.
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

fn structure(id: u32, acronym: &str, name: &str, path: &[u32]) -> Structure {
    Structure {
        id,
        acronym: acronym.to_string(),
        name: name.to_string(),
        structure_id_path: path.to_vec(),
        rgb_triplet: [128, 128, 128],
    }
}

pub fn structures(atlas: &str) -> Vec<Structure> {
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

/// How the annotation volume is stored on disk
#[derive(Debug, Clone, Copy)]
pub enum Encoding {
    Raw,
    Gzip,
}

/// A temporary atlas directory populated with synthetic atlases
pub struct TestAtlasDir {
    pub dir: TempDir,
}

impl TestAtlasDir {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    /// `allen_mouse` at 10 and 25 um, `kim_mouse` at 25 um (gzipped, uint16)
    pub fn standard() -> Self {
        let atlases = Self::new();
        atlases.add("allen_mouse", 10, Some("1.2"), Encoding::Raw);
        atlases.add("allen_mouse", 25, Some("1.2"), Encoding::Raw);
        atlases.add("kim_mouse", 25, Some("0.3"), Encoding::Gzip);
        atlases
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write one synthetic atlas and return its directory
    pub fn add(
        &self,
        atlas: &str,
        resolution_um: u32,
        version: Option<&str>,
        encoding: Encoding,
    ) -> PathBuf {
        let dir_name = match version {
            Some(v) => format!("{}_{}um_v{}", atlas, resolution_um, v),
            None => format!("{}_{}um", atlas, resolution_um),
        };
        let dir = self.path().join(dir_name);
        std::fs::create_dir_all(&dir).unwrap();

        let res = resolution_um as usize;
        let shape = EXTENT_UM.map(|e| e / res);
        let dtype = if atlas == "kim_mouse" {
            AnnotationDtype::Uint16
        } else {
            AnnotationDtype::Uint32
        };

        let metadata = AtlasMetadata {
            name: atlas.to_string(),
            resolution: [f64::from(resolution_um); 3],
            shape,
            version: version.map(str::to_string),
            species: Some("Mus musculus".to_string()),
            citation: None,
            atlas_link: None,
            symmetric: false,
            orientation: Some("asr".to_string()),
            annotation_dtype: dtype,
        };
        std::fs::write(
            dir.join("metadata.json"),
            serde_json::to_vec_pretty(&metadata).unwrap(),
        )
        .unwrap();
        std::fs::write(
            dir.join("structures.json"),
            serde_json::to_vec(&structures(atlas)).unwrap(),
        )
        .unwrap();

        let mut bytes = Vec::new();
        for i in 0..shape[0] {
            for j in 0..shape[1] {
                for k in 0..shape[2] {
                    let label = region_at(atlas, i * res, j * res, k * res);
                    match dtype {
                        AnnotationDtype::Uint16 => {
                            bytes.extend_from_slice(&(label as u16).to_le_bytes())
                        }
                        AnnotationDtype::Uint32 => bytes.extend_from_slice(&label.to_le_bytes()),
                    }
                }
            }
        }

        match encoding {
            Encoding::Raw => std::fs::write(dir.join("annotation.bin"), &bytes).unwrap(),
            Encoding::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
                encoder.write_all(&bytes).unwrap();
                std::fs::write(dir.join("annotation.bin.gz"), encoder.finish().unwrap()).unwrap();
            }
        }

        dir
    }

    pub fn config(&self) -> AtlasConfig {
        AtlasConfig {
            atlas_dir: self.path().to_path_buf(),
            max_cached_atlases: 4,
        }
    }

    pub fn service(&self) -> LocalAtlasService {
        LocalAtlasService::new(&self.config()).unwrap()
    }
}

/// Create a test application router over `atlases`
pub fn create_test_app(atlases: &TestAtlasDir) -> Router {
    app(AppState::new(
        Arc::new(atlases.service()),
        ResolverConfig::default(),
    ))
}

/// Write a cell table with the default coordinate column names
pub fn write_cells(dir: &Path, rows: &[(&str, &str, &str, &str)]) -> PathBuf {
    let path = dir.join("cells.csv");
    let mut text = String::from("cell.id,cell.type,CCF.AllenAP,CCF.AllenDV,CCF.AllenML\n");
    for (id, ap, dv, ml) in rows {
        text.push_str(&format!("{},VGAT,{},{},{}\n", id, ap, dv, ml));
    }
    std::fs::write(&path, text).unwrap();
    path
}
