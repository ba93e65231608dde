//! Readers for installed atlas directories and their annotation volumes

use flate2::read::GzDecoder;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::structures::StructureTree;
use super::types::{AnnotationDtype, AtlasError, AtlasMetadata, AtlasResolution};
use super::volume::{AtlasVolume, Labels};

pub const METADATA_FILE: &str = "metadata.json";
pub const STRUCTURES_FILE: &str = "structures.json";

/// Annotation file names, in lookup order
pub const ANNOTATION_FILES: &[&str] = &["annotation.bin", "annotation.raw", "annotation.bin.gz"];

/// Trait for reading annotation volumes stored in different encodings
pub trait AnnotationReader: Send + Sync {
    /// Check if this reader can handle the given file
    fn can_read(&self, path: &Path) -> bool;

    /// Read the file and return the decoded little-endian voxel bytes
    fn read(&self, path: &Path) -> Result<Vec<u8>, AtlasError>;
}

/// Uncompressed `.bin` / `.raw` volumes
pub struct RawReader;

impl AnnotationReader for RawReader {
    fn can_read(&self, path: &Path) -> bool {
        matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("bin" | "raw")
        )
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>, AtlasError> {
        Ok(std::fs::read(path)?)
    }
}

/// Gzip-compressed `.gz` volumes
pub struct GzipReader;

impl AnnotationReader for GzipReader {
    fn can_read(&self, path: &Path) -> bool {
        matches!(path.extension().and_then(|e| e.to_str()), Some("gz"))
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>, AtlasError> {
        let file = File::open(path)?;
        let mut decoder = GzDecoder::new(BufReader::new(file));
        let mut data = Vec::new();
        decoder.read_to_end(&mut data)?;
        Ok(data)
    }
}

/// Composite reader that tries multiple readers in sequence
pub struct CompositeReader {
    readers: Vec<Box<dyn AnnotationReader>>,
}

impl CompositeReader {
    pub fn new() -> Self {
        Self {
            readers: vec![Box::new(RawReader), Box::new(GzipReader)],
        }
    }

    /// Find a reader that can handle the given file
    pub fn find_reader(&self, path: &Path) -> Option<&dyn AnnotationReader> {
        self.readers.iter().find(|r| r.can_read(path)).map(|r| &**r)
    }
}

impl Default for CompositeReader {
    fn default() -> Self {
        Self::new()
    }
}

impl AnnotationReader for CompositeReader {
    fn can_read(&self, path: &Path) -> bool {
        self.readers.iter().any(|r| r.can_read(path))
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>, AtlasError> {
        self.find_reader(path)
            .ok_or_else(|| {
                AtlasError::UnsupportedFormat(format!(
                    "No reader available for file: {}",
                    path.display()
                ))
            })?
            .read(path)
    }
}

/// Decode little-endian voxel bytes
pub fn decode_labels(bytes: &[u8], dtype: AnnotationDtype) -> Result<Labels, AtlasError> {
    let width = dtype.width();
    if bytes.len() % width != 0 {
        return Err(AtlasError::UnsupportedFormat(format!(
            "{} bytes is not a whole number of {}-byte voxels",
            bytes.len(),
            width
        )));
    }

    let labels = match dtype {
        AnnotationDtype::Uint16 => Labels::U16(
            bytes
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]))
                .collect(),
        ),
        AnnotationDtype::Uint32 => Labels::U32(
            bytes
                .chunks_exact(4)
                .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        ),
    };
    Ok(labels)
}

/// Loads a complete atlas volume from its directory
#[derive(Default)]
pub struct AtlasReader {
    reader: CompositeReader,
}

impl AtlasReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locate the annotation file inside an atlas directory
    pub fn find_annotation(&self, dir: &Path) -> Option<PathBuf> {
        ANNOTATION_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file() && self.reader.can_read(path))
    }

    pub fn read_metadata(dir: &Path) -> Result<AtlasMetadata, AtlasError> {
        let bytes = std::fs::read(dir.join(METADATA_FILE))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Read metadata, ontology and annotation of `atlas` from `dir`
    pub fn read_dir(&self, atlas: &AtlasResolution, dir: &Path) -> Result<AtlasVolume, AtlasError> {
        let metadata = Self::read_metadata(dir)?;
        metadata.validate(atlas)?;

        let structures = StructureTree::from_json(&std::fs::read(dir.join(STRUCTURES_FILE))?)?;

        let annotation_path = self.find_annotation(dir).ok_or_else(|| AtlasError::LoadError {
            atlas: atlas.id(),
            reason: format!("no annotation volume in {}", dir.display()),
        })?;

        debug!("Reading annotation for {} from {:?}", atlas, annotation_path);
        let data = self.reader.read(&annotation_path)?;

        let mut hasher = Sha256::new();
        hasher.update(&data);
        let content_sha256 = hex::encode(hasher.finalize());
        let hash_prefix = content_sha256[..16].to_string();

        let labels = decode_labels(&data, metadata.annotation_dtype)?;
        let volume = AtlasVolume::new(atlas.clone(), metadata, structures, labels, content_sha256)?;

        info!(
            "Read atlas {}: shape {:?}, {} structures, hash={}",
            atlas,
            volume.shape(),
            volume.structures().len(),
            hash_prefix
        );

        Ok(volume)
    }
}

/// Simple hex encoding for SHA256 hashes
mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes
            .as_ref()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }
}
