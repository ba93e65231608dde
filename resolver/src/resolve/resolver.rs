//! Batch resolution of points against one or more atlases

use metrics::counter;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info};

use super::scale::to_voxel_index;
use super::types::{InputRow, Point3D, ResolveError, ResolverConfig, ResultRow, ResultTable};
use crate::atlas::{AtlasResolution, AtlasService, AtlasVolume, RegionResult};

/// Maps reference-space points to region ids and acronyms.
///
/// Every atlas is loaded before the first lookup, so an unavailable atlas
/// fails the whole batch and no partial table is produced.
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    config: ResolverConfig,
}

impl Resolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve bare points; output rows are numbered by position
    pub async fn resolve(
        &self,
        service: &dyn AtlasService,
        points: &[Point3D],
        atlases: &[AtlasResolution],
    ) -> Result<ResultTable, ResolveError> {
        self.resolve_rows(service, &InputRow::from_points(points), atlases)
            .await
    }

    /// Resolve rows read from a table, keeping their original indices
    pub async fn resolve_rows(
        &self,
        service: &dyn AtlasService,
        rows: &[InputRow],
        atlases: &[AtlasResolution],
    ) -> Result<ResultTable, ResolveError> {
        validate_atlases(atlases)?;
        if rows.is_empty() {
            return Err(ResolveError::EmptyPoints);
        }

        let volumes = load_all(service, atlases).await?;
        self.resolve_loaded(rows, &volumes)
    }

    /// Resolve against volumes that are already loaded
    pub fn resolve_loaded(
        &self,
        rows: &[InputRow],
        volumes: &[Arc<AtlasVolume>],
    ) -> Result<ResultTable, ResolveError> {
        let atlases: Vec<AtlasResolution> =
            volumes.iter().map(|v| v.resolution().clone()).collect();
        validate_atlases(&atlases)?;
        if rows.is_empty() {
            return Err(ResolveError::EmptyPoints);
        }

        let source_um = self.source_resolution()?;
        info!(
            "Resolving {} points against {} atlases (source {} um, rounding {})",
            rows.len(),
            volumes.len(),
            source_um,
            self.config.rounding
        );

        let mut table = ResultTable {
            atlases,
            rows: Vec::with_capacity(rows.len()),
        };

        for row in rows {
            let regions = volumes
                .iter()
                .map(|volume| {
                    match to_voxel_index(
                        &row.point,
                        source_um,
                        volume.voxel_size(),
                        self.config.rounding,
                    ) {
                        Some(index) => volume.lookup(index, self.config.hierarchy_level),
                        None => {
                            counter!("ccf_lookups_out_of_bounds_total").increment(1);
                            RegionResult::empty()
                        }
                    }
                })
                .collect();

            table.rows.push(ResultRow {
                index: row.index,
                label: row.label.clone(),
                regions,
            });
        }

        counter!("ccf_resolve_rows_total").increment(rows.len() as u64);
        debug!(
            "Resolved {} rows, {} cells without a region",
            table.len(),
            table.empty_cells()
        );

        Ok(table)
    }

    /// Voxel size the input coordinates are expressed in
    fn source_resolution(&self) -> Result<f64, ResolveError> {
        let um = self.config.source_resolution_um;
        if um.is_finite() && um > 0.0 {
            Ok(um)
        } else {
            Err(ResolveError::InvalidSourceResolution(um))
        }
    }
}

fn validate_atlases(atlases: &[AtlasResolution]) -> Result<(), ResolveError> {
    if atlases.is_empty() {
        return Err(ResolveError::EmptyAtlases);
    }
    let mut seen = HashSet::with_capacity(atlases.len());
    for atlas in atlases {
        if !seen.insert(atlas) {
            return Err(ResolveError::DuplicateAtlas(atlas.clone()));
        }
    }
    Ok(())
}

/// Load every atlas up front; the first failure aborts the batch
async fn load_all(
    service: &dyn AtlasService,
    atlases: &[AtlasResolution],
) -> Result<Vec<Arc<AtlasVolume>>, ResolveError> {
    let mut volumes = Vec::with_capacity(atlases.len());
    for atlas in atlases {
        let volume = service.load(atlas).await.map_err(|source| {
            error!("Atlas {} unavailable, aborting batch: {}", atlas, source);
            ResolveError::AtlasUnavailable {
                atlas: atlas.clone(),
                source,
            }
        })?;
        volumes.push(volume);
    }
    Ok(volumes)
}
