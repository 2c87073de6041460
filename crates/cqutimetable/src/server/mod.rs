use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowHeaders, CorsLayer};
use tracing::warn;

use crate::config::ServerConfig;
use crate::server::endpoints::{status, upload};
use crate::types::AppState;

mod endpoints;
mod types;
pub mod validation;

pub use endpoints::upload::FileResponse;

/// Room for the multipart framing and the other form fields on top of the file.
const FORM_OVERHEAD: usize = 64 * 1024;

/// Creates a router that can be used by `axum`.
///
/// # Parameters
/// - `app_state`: The app server state.
///
/// # Returns
/// The router.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let body_limit = app_state.server.max_file_size + FORM_OVERHEAD;
    let cors = cors_layer(&app_state.server);

    Router::new()
        .route("/health", get(status::get_health))
        .route("/upload", post(upload::post_upload))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(app_state)
}

/// Allows the configured frontend to POST uploads with credentials.
fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::POST])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true);

    match config.frontend_url.parse::<HeaderValue>() {
        Ok(origin) => layer.allow_origin(origin),
        Err(e) => {
            warn!(
                frontend_url = %config.frontend_url,
                error = %e,
                "Invalid frontend URL, cross-origin requests will be refused"
            );
            layer
        }
    }
}
