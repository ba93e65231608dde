//! Local atlas service reading installed atlas directories

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use metrics::histogram;
use tracing::{debug, error, info, warn};

use crate::config::AtlasConfig;

use super::cache::AtlasCache;
use super::reader::{AtlasReader, METADATA_FILE};
use super::service::AtlasService;
use super::types::{AtlasError, AtlasListItem, AtlasResolution};
use super::volume::AtlasVolume;

/// Atlas service over a directory of installed atlases, e.g. `~/.brainglobe`
pub struct LocalAtlasService {
    atlas_dir: PathBuf,
    cache: AtlasCache,
    reader: Arc<AtlasReader>,
}

impl LocalAtlasService {
    /// Create a new local atlas service
    pub fn new(config: &AtlasConfig) -> Result<Self, AtlasError> {
        let atlas_dir = &config.atlas_dir;

        if !atlas_dir.exists() {
            return Err(AtlasError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Atlas directory not found: {:?}", atlas_dir),
            )));
        }

        if !atlas_dir.is_dir() {
            return Err(AtlasError::IoError(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("Atlas path is not a directory: {:?}", atlas_dir),
            )));
        }

        info!(
            "Initialized local atlas service with directory: {:?}",
            atlas_dir
        );

        Ok(Self {
            atlas_dir: atlas_dir.clone(),
            cache: AtlasCache::new(config.max_cached_atlases),
            reader: Arc::new(AtlasReader::new()),
        })
    }

    pub fn atlas_dir(&self) -> &Path {
        &self.atlas_dir
    }

    /// Scan the atlas directory for installed atlases
    fn scan_atlases(&self) -> Vec<AtlasListItem> {
        let mut atlases = Vec::new();

        let entries = match std::fs::read_dir(&self.atlas_dir) {
            Ok(entries) => entries,
            Err(e) => {
                error!("Failed to read atlas directory: {}", e);
                return atlases;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() || !path.join(METADATA_FILE).is_file() {
                continue;
            }

            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            match AtlasResolution::from_dir_name(name) {
                Some((atlas, version)) => {
                    debug!("Found atlas: {} at {:?}", atlas, path);
                    atlases.push(AtlasListItem {
                        id: atlas.id(),
                        atlas: atlas.atlas.clone(),
                        resolution_um: atlas.resolution_um,
                        version,
                        path,
                    });
                }
                None => {
                    debug!("Skipping directory with unrecognised name: {:?}", path);
                }
            }
        }

        atlases.sort_by(|a, b| {
            a.id
                .cmp(&b.id)
                .then_with(|| version_key(&a.version).cmp(&version_key(&b.version)))
        });

        info!("Found {} atlases in {:?}", atlases.len(), self.atlas_dir);
        atlases
    }

    async fn cached_atlas_list(&self) -> Vec<AtlasListItem> {
        if let Some(list) = self.cache.get_atlas_list().await {
            return list;
        }
        let list = self.scan_atlases();
        self.cache.set_atlas_list(list.clone()).await;
        list
    }

    /// Find the directory of an atlas, preferring the newest installed version
    async fn find_atlas_dir(&self, atlas: &AtlasResolution) -> Option<PathBuf> {
        let id = atlas.id();
        self.cached_atlas_list()
            .await
            .into_iter()
            .rev()
            .find(|item| item.id == id)
            .map(|item| item.path)
    }
}

/// Numeric ordering for version strings such as `1.2` and `1.10`
fn version_key(version: &Option<String>) -> Vec<u32> {
    version
        .as_deref()
        .map(|v| v.split('.').map(|p| p.parse().unwrap_or(0)).collect())
        .unwrap_or_default()
}

#[async_trait]
impl AtlasService for LocalAtlasService {
    async fn list_atlases(&self) -> Result<Vec<AtlasListItem>, AtlasError> {
        Ok(self.cached_atlas_list().await)
    }

    async fn load(&self, atlas: &AtlasResolution) -> Result<Arc<AtlasVolume>, AtlasError> {
        self.cache
            .get_or_load(atlas, async {
                let dir = match self.find_atlas_dir(atlas).await {
                    Some(dir) => dir,
                    None => {
                        warn!(
                            "Atlas {} is not installed in {:?} (downloading is not supported)",
                            atlas, self.atlas_dir
                        );
                        return Err(AtlasError::NotFound(atlas.id()));
                    }
                };

                info!("Loading atlas {} from {:?}", atlas, dir);
                let start = Instant::now();

                let reader = Arc::clone(&self.reader);
                let target = atlas.clone();
                let volume = tokio::task::spawn_blocking(move || reader.read_dir(&target, &dir))
                    .await
                    .map_err(|e| AtlasError::LoadError {
                        atlas: atlas.id(),
                        reason: format!("load task failed: {}", e),
                    })??;

                histogram!("ccf_atlas_load_duration_seconds").record(start.elapsed());
                info!("Loaded atlas {} in {:?}", atlas, start.elapsed());
                Ok(volume)
            })
            .await
    }
}
