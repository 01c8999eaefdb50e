/// Portal HTTP surface: credential ceremonies, bypass checks, and the
/// guarded command endpoints
///
/// Protected routes share one guard composed at route-registration time;
/// every denial is a 401 with a redirect hint back to the credential
/// prompt.
use crate::{
    api::{BeginRequest, CommandResponse, CompleteRequest},
    auth::{bypass::client_ip, session::AuthorizedSession},
    context::PortalContext,
    error::{BridgeError, BridgeResult},
};
use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::{self, Next},
    response::{Json, Response},
    routing::{get, post},
    Extension, Router,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use tracing::warn;

/// Build the portal routes; the guard wraps only the protected subset
pub fn routes(ctx: PortalContext) -> Router<PortalContext> {
    let protected = Router::new()
        .route("/wake", post(wake))
        .route("/sleep", post(sleep))
        .route("/status", get(status))
        .route("/win_status", get(win_status))
        .route("/user_info", get(user_info))
        .route_layer(middleware::from_fn_with_state(ctx, require_session));

    Router::new()
        .route("/register/begin", post(register_begin))
        .route("/register/complete", post(register_complete))
        .route("/authenticate/begin", post(authenticate_begin))
        .route("/authenticate/complete", post(authenticate_complete))
        .route("/logout", post(logout))
        .route("/check_ip_bypass", post(check_ip_bypass))
        .route("/quick_ip_check", get(quick_ip_check))
        .merge(protected)
}

/// Authorization guard for every protected handler
async fn require_session(
    State(ctx): State<PortalContext>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    mut request: Request,
    next: Next,
) -> Result<Response, BridgeError> {
    let client = client_ip(request.headers(), peer);
    match ctx.sessions.authorize(client).await {
        Ok(session) => {
            request.extensions_mut().insert(session);
            Ok(next.run(request).await)
        }
        Err(denial) => {
            warn!(client = %client, reason = %denial, "unauthorized request");
            Err(BridgeError::Auth(denial.to_string()))
        }
    }
}

async fn register_begin(
    State(ctx): State<PortalContext>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(request): Json<BeginRequest>,
) -> BridgeResult<Json<Value>> {
    let client = client_ip(&headers, peer);
    let options = ctx.auth.begin_register(&request.username, client).await?;
    Ok(Json(options))
}

async fn register_complete(
    State(ctx): State<PortalContext>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(request): Json<CompleteRequest>,
) -> BridgeResult<Json<CommandResponse>> {
    let client = client_ip(&headers, peer);
    ctx.auth
        .complete_register(&request.username, request.credential, client)
        .await?;
    Ok(Json(CommandResponse::ok("credential enrolled")))
}

async fn authenticate_begin(
    State(ctx): State<PortalContext>,
    Json(request): Json<BeginRequest>,
) -> BridgeResult<Json<Value>> {
    let options = ctx.auth.begin_authenticate(&request.username).await?;
    Ok(Json(options))
}

async fn authenticate_complete(
    State(ctx): State<PortalContext>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(request): Json<CompleteRequest>,
) -> BridgeResult<Json<Value>> {
    let client = client_ip(&headers, peer);
    ctx.auth
        .complete_authenticate(&request.username, &request.credential, client)
        .await?;
    Ok(Json(json!({
        "success": true,
        "message": "authentication succeeded",
        "redirect": "/",
    })))
}

async fn logout(
    State(ctx): State<PortalContext>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Json<Value> {
    let client = client_ip(&headers, peer);
    ctx.sessions.logout(client);
    Json(json!({
        "success": true,
        "message": "logged out",
        "redirect": "/",
    }))
}

/// Establish a bypass session when the caller sits on the trusted network
async fn check_ip_bypass(
    State(ctx): State<PortalContext>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Json<Value> {
    let client = client_ip(&headers, peer);
    let matched = ctx.sessions.establish_by_bypass(client).await;
    let resolved = ctx.resolver.resolve_trusted().await;
    Json(json!({
        "bypass": matched,
        "client_ip": client.to_string(),
        "trusted_domain": ctx.resolver.domain(),
        "resolved": resolved.map(|a| a.to_string()),
    }))
}

/// Read-only variant of the bypass check, for the front end's quick poll
async fn quick_ip_check(
    State(ctx): State<PortalContext>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Json<Value> {
    let client = client_ip(&headers, peer);
    let matched = ctx
        .resolver
        .matches(client, ctx.resolver.domain())
        .await;
    Json(json!({
        "bypass": matched,
        "client_ip": client.to_string(),
    }))
}

/// Forward the configured target MAC to the relay
async fn wake(State(ctx): State<PortalContext>) -> BridgeResult<Json<CommandResponse>> {
    let response = ctx.relay.wake(&ctx.config.target_mac).await?;
    Ok(Json(response))
}

async fn sleep(State(ctx): State<PortalContext>) -> BridgeResult<Json<CommandResponse>> {
    let response = ctx.relay.sleep().await?;
    Ok(Json(response))
}

/// Relay reachability; transport failure is a benign "offline"
async fn status(State(ctx): State<PortalContext>) -> Json<Value> {
    let health = ctx.relay.health().await;
    Json(json!({ "relay": health.as_str() }))
}

/// Target reachability proxied through the relay; failure maps to "unknown"
async fn win_status(State(ctx): State<PortalContext>) -> Json<Value> {
    Json(json!({ "win_status": ctx.relay.win_status().await }))
}

async fn user_info(
    State(ctx): State<PortalContext>,
    Extension(session): Extension<AuthorizedSession>,
) -> BridgeResult<Json<Value>> {
    let info = ctx
        .auth
        .user_info(session.identity.as_deref(), session.method.as_str())
        .await?;
    Ok(Json(info))
}
