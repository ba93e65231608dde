//! HTTP routes for health and batch resolution

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::atlas::{AtlasAppState, AtlasError, AtlasResolution, AtlasService, atlas_routes};
use crate::resolve::{Point3D, ResolveError, Resolver, ResolverConfig, ResultTable, RoundingMode};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub atlas_service: Arc<dyn AtlasService>,
    /// Defaults applied to requests that do not override them
    pub resolver: ResolverConfig,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(atlas_service: Arc<dyn AtlasService>, resolver: ResolverConfig) -> Self {
        Self {
            atlas_service,
            resolver,
            started_at: Instant::now(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub atlas_service: &'static str,
    pub uptime_seconds: u64,
}

/// GET /health - Healthy when the atlas directory can be listed
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let ready = state.atlas_service.list_atlases().await.is_ok();

    let (status, atlas_status, http_status) = if ready {
        ("healthy", "ready", StatusCode::OK)
    } else {
        ("degraded", "unavailable", StatusCode::SERVICE_UNAVAILABLE)
    };

    (
        http_status,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            atlas_service: atlas_status,
            uptime_seconds: state.started_at.elapsed().as_secs(),
        }),
    )
}

/// Body of POST /api/resolve
#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub points: Vec<Point3D>,
    pub atlases: Vec<AtlasResolution>,
    pub source_resolution_um: Option<f64>,
    pub rounding: Option<RoundingMode>,
    pub hierarchy_level: Option<usize>,
}

impl ResolveRequest {
    fn config(&self, defaults: &ResolverConfig) -> ResolverConfig {
        ResolverConfig {
            source_resolution_um: self
                .source_resolution_um
                .unwrap_or(defaults.source_resolution_um),
            rounding: self.rounding.unwrap_or(defaults.rounding),
            hierarchy_level: self.hierarchy_level.or(defaults.hierarchy_level),
        }
    }
}

/// Error response for resolution requests
#[derive(Debug, Serialize)]
pub struct ResolveErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip)]
    status: StatusCode,
}

impl ResolveErrorResponse {
    fn new(status: StatusCode, code: &str, error: String) -> Self {
        Self {
            error,
            code: code.to_string(),
            status,
        }
    }
}

impl From<ResolveError> for ResolveErrorResponse {
    fn from(e: ResolveError) -> Self {
        let (status, code) = match &e {
            ResolveError::EmptyPoints => (StatusCode::BAD_REQUEST, "empty_points"),
            ResolveError::EmptyAtlases => (StatusCode::BAD_REQUEST, "empty_atlases"),
            ResolveError::DuplicateAtlas(_) => (StatusCode::BAD_REQUEST, "duplicate_atlas"),
            ResolveError::InvalidSourceResolution(_) => {
                (StatusCode::BAD_REQUEST, "invalid_source_resolution")
            }
            ResolveError::AtlasUnavailable {
                source: AtlasError::NotFound(_),
                ..
            } => (StatusCode::NOT_FOUND, "atlas_not_found"),
            ResolveError::AtlasUnavailable { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "atlas_unavailable")
            }
        };
        Self::new(status, code, e.to_string())
    }
}

impl IntoResponse for ResolveErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// POST /api/resolve - Resolve a batch of points against several atlases
pub async fn resolve(
    State(state): State<AppState>,
    Json(request): Json<ResolveRequest>,
) -> Result<Json<ResultTable>, ResolveErrorResponse> {
    if let Some(position) = request.points.iter().position(|p| !p.is_finite()) {
        return Err(ResolveErrorResponse::new(
            StatusCode::BAD_REQUEST,
            "invalid_coordinates",
            format!("Point {} has non-finite coordinates", position),
        ));
    }

    let resolver = Resolver::new(request.config(&state.resolver));
    let table = resolver
        .resolve(state.atlas_service.as_ref(), &request.points, &request.atlases)
        .await
        .map_err(|e| {
            tracing::warn!("Resolve request failed: {}", e);
            ResolveErrorResponse::from(e)
        })?;

    Ok(Json(table))
}

/// Build the application router: health, batch resolution and the atlas API
pub fn app(state: AppState) -> Router {
    let atlas_state = AtlasAppState {
        atlas_service: state.atlas_service.clone(),
        rounding: state.resolver.rounding,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/resolve", post(resolve))
        .with_state(state)
        .merge(Router::new().nest("/api", atlas_routes(atlas_state)))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_overrides_defaults() {
        let defaults = ResolverConfig {
            source_resolution_um: 25.0,
            rounding: RoundingMode::HalfEven,
            hierarchy_level: Some(2),
        };
        let request: ResolveRequest = serde_json::from_str(
            r#"{"points": [], "atlases": ["allen_mouse_10um"], "rounding": "half-up"}"#,
        )
        .unwrap();

        let config = request.config(&defaults);
        assert_eq!(config.rounding, RoundingMode::HalfUp);
        assert_eq!(config.source_resolution_um, 25.0);
        assert_eq!(config.hierarchy_level, Some(2));
    }

    #[test]
    fn test_resolve_errors_map_to_status() {
        let missing = ResolveErrorResponse::from(ResolveError::AtlasUnavailable {
            atlas: AtlasResolution::new("kim_mouse", 50),
            source: AtlasError::NotFound("kim_mouse_50um".into()),
        });
        assert_eq!(missing.code, "atlas_not_found");
        assert_eq!(missing.into_response().status(), StatusCode::NOT_FOUND);

        let empty = ResolveErrorResponse::from(ResolveError::EmptyAtlases);
        assert_eq!(empty.into_response().status(), StatusCode::BAD_REQUEST);

        let broken = ResolveErrorResponse::from(ResolveError::AtlasUnavailable {
            atlas: AtlasResolution::new("kim_mouse", 25),
            source: AtlasError::ShapeMismatch {
                expected: 8,
                actual: 4,
            },
        });
        assert_eq!(
            broken.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
