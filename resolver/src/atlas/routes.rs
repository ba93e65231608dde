//! HTTP route handlers for atlas API

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::service::AtlasService;
use super::structures::Structure;
use super::types::{AtlasError, AtlasInfo, AtlasListItem, AtlasResolution, RegionResult};
use crate::resolve::{Point3D, RoundingMode};

/// Application state containing the atlas service
#[derive(Clone)]
pub struct AtlasAppState {
    pub atlas_service: Arc<dyn AtlasService>,
    pub rounding: RoundingMode,
}

/// Error response for atlas API
#[derive(Debug, Serialize)]
pub struct AtlasErrorResponse {
    pub error: String,
    pub code: String,
}

impl From<AtlasError> for AtlasErrorResponse {
    fn from(e: AtlasError) -> Self {
        let code = match &e {
            AtlasError::NotFound(_) => "not_found",
            AtlasError::InvalidIdentifier(_) => "invalid_identifier",
            AtlasError::LoadError { .. } => "load_error",
            AtlasError::InvalidMetadata(_) => "invalid_metadata",
            AtlasError::ShapeMismatch { .. } => "shape_mismatch",
            AtlasError::UnsupportedFormat(_) => "unsupported_format",
            AtlasError::Json(_) => "json_error",
            AtlasError::IoError(_) => "io_error",
        };
        Self {
            error: e.to_string(),
            code: code.to_string(),
        }
    }
}

impl IntoResponse for AtlasErrorResponse {
    fn into_response(self) -> Response {
        let status = match self.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "invalid_identifier" | "invalid_coordinates" => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

/// Query parameters for single-point lookups
#[derive(Debug, Deserialize)]
pub struct StructureQueryParams {
    pub ap: f64,
    pub dv: f64,
    pub ml: f64,
    /// Coordinates are in microns rather than atlas voxels
    #[serde(default)]
    pub microns: bool,
    pub hierarchy_level: Option<usize>,
}

/// Response for GET /api/atlas/:id/structure
#[derive(Debug, Serialize, Deserialize)]
pub struct StructureLookupResponse {
    pub atlas: String,
    pub point: Point3D,
    pub microns: bool,
    #[serde(flatten)]
    pub region: RegionResult,
}

async fn load_atlas(
    state: &AtlasAppState,
    id: &str,
) -> Result<Arc<super::volume::AtlasVolume>, AtlasErrorResponse> {
    let atlas: AtlasResolution = id.parse().map_err(AtlasErrorResponse::from)?;
    state.atlas_service.load(&atlas).await.map_err(|e| {
        match &e {
            AtlasError::NotFound(_) => tracing::debug!("Atlas not found: {}", id),
            _ => tracing::error!("Failed to load atlas {}: {}", id, e),
        }
        AtlasErrorResponse::from(e)
    })
}

/// GET /api/atlases - List installed atlases
pub async fn list_atlases(
    State(state): State<AtlasAppState>,
) -> Result<Json<Vec<AtlasListItem>>, AtlasErrorResponse> {
    let atlases = state.atlas_service.list_atlases().await.map_err(|e| {
        tracing::error!("Failed to list atlases: {}", e);
        AtlasErrorResponse::from(e)
    })?;

    Ok(Json(atlases))
}

/// GET /api/atlas/:id - Get details of an atlas (loads its volume)
pub async fn get_atlas(
    State(state): State<AtlasAppState>,
    Path(id): Path<String>,
) -> Result<Json<AtlasInfo>, AtlasErrorResponse> {
    let volume = load_atlas(&state, &id).await?;
    Ok(Json(volume.info()))
}

/// GET /api/atlas/:id/structures - Get the atlas ontology
pub async fn get_structures(
    State(state): State<AtlasAppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Structure>>, AtlasErrorResponse> {
    let volume = load_atlas(&state, &id).await?;
    Ok(Json(volume.structures().iter().cloned().collect()))
}

/// GET /api/atlas/:id/structure - Get the region at a coordinate
pub async fn get_structure(
    State(state): State<AtlasAppState>,
    Path(id): Path<String>,
    Query(params): Query<StructureQueryParams>,
) -> Result<Json<StructureLookupResponse>, AtlasErrorResponse> {
    let volume = load_atlas(&state, &id).await?;

    let point = Point3D::new(params.ap, params.dv, params.ml);
    if !point.is_finite() {
        return Err(AtlasErrorResponse {
            error: "Coordinates must be finite numbers".to_string(),
            code: "invalid_coordinates".to_string(),
        });
    }

    let region = volume.structure_from_coords(
        &point,
        params.microns,
        state.rounding,
        params.hierarchy_level,
    );

    tracing::debug!("Lookup {} {:?} -> {:?}", id, point, region);

    Ok(Json(StructureLookupResponse {
        atlas: volume.resolution().id(),
        point,
        microns: params.microns,
        region,
    }))
}

/// Build atlas API routes
pub fn atlas_routes(state: AtlasAppState) -> Router {
    Router::new()
        .route("/atlases", get(list_atlases))
        .route("/atlas/:id", get(get_atlas))
        .route("/atlas/:id/structures", get(get_structures))
        .route("/atlas/:id/structure", get(get_structure))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_map_to_status() {
        let not_found = AtlasErrorResponse::from(AtlasError::NotFound("x_10um".into()));
        assert_eq!(not_found.code, "not_found");
        assert_eq!(not_found.into_response().status(), StatusCode::NOT_FOUND);

        let invalid = AtlasErrorResponse::from(AtlasError::InvalidIdentifier("x".into()));
        assert_eq!(invalid.into_response().status(), StatusCode::BAD_REQUEST);

        let coordinates = AtlasErrorResponse {
            error: "Coordinates must be finite numbers".into(),
            code: "invalid_coordinates".into(),
        };
        assert_eq!(coordinates.into_response().status(), StatusCode::BAD_REQUEST);

        let shape = AtlasErrorResponse::from(AtlasError::ShapeMismatch {
            expected: 1,
            actual: 2,
        });
        assert_eq!(
            shape.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
