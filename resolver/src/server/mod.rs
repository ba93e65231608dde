mod routes;

pub use routes::{AppState, HealthResponse, ResolveErrorResponse, ResolveRequest, app};
