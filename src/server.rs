/// HTTP server setup and routing
use crate::{
    context::{PortalContext, RelayContext},
    error::{BridgeError, BridgeResult},
};
use axum::{
    http::{header, Method, StatusCode},
    response::Json,
    Router,
};
use serde_json::json;
use std::net::SocketAddr;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

/// Build the public portal router
pub fn portal_router(ctx: PortalContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    crate::api::portal::routes(ctx.clone())
        .with_state(ctx)
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .fallback(not_found)
}

/// Build the LAN-side relay router
pub fn relay_router(ctx: RelayContext) -> Router {
    crate::api::gateway::routes()
        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        .fallback(not_found)
}

/// 404 handler
async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "endpoint not found"
        })),
    )
}

/// Start an HTTP server with peer-address tracking for the session layer
pub async fn serve(app: Router, bind_host: &str, port: u16) -> BridgeResult<()> {
    let addr = format!("{}:{}", bind_host, port);
    info!(addr = %addr, "listening");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| BridgeError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|e| BridgeError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}
