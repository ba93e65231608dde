//! AtlasService trait definition

use async_trait::async_trait;
use std::sync::Arc;

use super::types::{AtlasError, AtlasListItem, AtlasResolution};
use super::volume::AtlasVolume;

/// Trait for atlas sources (installed atlas directories, in-memory fixtures)
#[async_trait]
pub trait AtlasService: Send + Sync {
    /// List the available atlases without loading their volumes
    async fn list_atlases(&self) -> Result<Vec<AtlasListItem>, AtlasError>;

    /// Load an atlas volume; fails with `NotFound` for unknown atlases
    async fn load(&self, atlas: &AtlasResolution) -> Result<Arc<AtlasVolume>, AtlasError>;
}
