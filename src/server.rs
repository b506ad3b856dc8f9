//! Read-only status API: axum router and handler.
//!
//! The panel loop publishes a `PanelStatus` after every render; this server
//! only ever reads it. There is no display control over HTTP.

use crate::render::{PanelStatus, SharedStatus};
use axum::Router;
use axum::extract::State;
use axum::response::Json;
use axum::routing::get;
use std::sync::PoisonError;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Shared application state, passed to every handler via axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub status: SharedStatus,
}

#[derive(OpenApi)]
#[openapi(
    paths(get_status),
    components(schemas(PanelStatus)),
    tags((name = "system", description = "Panel status")),
    info(
        title = "Tide Panel API",
        version = env!("CARGO_PKG_VERSION"),
        description = "Read-only status of the tide LED panel"
    )
)]
pub struct ApiDoc;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(
            SwaggerUi::new("/docs")
                .url("/api-docs/openapi.json", ApiDoc::openapi())
                .config(utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"]).validator_url("none")),
        )
        .route("/api/v1/status", get(get_status))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `addr` and serve until the process exits.
pub async fn serve(addr: &str, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Status API on http://{}/api/v1/status", listener.local_addr()?);
    tracing::info!("API Documentation: http://{}/docs", listener.local_addr()?);
    axum::serve(listener, create_router(state)).await
}

/// GET /api/v1/status — what the panel is currently showing
#[utoipa::path(
    get,
    path = "/api/v1/status",
    tag = "system",
    responses(
        (status = 200, description = "Current panel status", body = PanelStatus)
    )
)]
async fn get_status(State(state): State<AppState>) -> Json<PanelStatus> {
    let status = state
        .status
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    Json(status)
}
