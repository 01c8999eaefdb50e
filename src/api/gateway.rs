/// Relay gateway HTTP surface: wake, sleep, health, win_status
///
/// This service has no authorization logic of its own; by deployment
/// convention it is reachable only from the portal's network and trusts
/// its caller.
use crate::{
    api::{CommandResponse, WakeRequest},
    context::RelayContext,
    relay::{probe::LivenessProbe, shell::SleepCommander},
};
use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::net::IpAddr;
use tracing::{info, warn};

/// Build the relay gateway routes
pub fn routes() -> Router<RelayContext> {
    Router::new()
        .route("/wake", post(wake))
        .route("/sleep", post(sleep))
        .route("/health", get(health))
        .route("/win_status", get(win_status))
}

/// Broadcast a magic packet for the requested hardware address
async fn wake(
    State(ctx): State<RelayContext>,
    Json(request): Json<WakeRequest>,
) -> Json<CommandResponse> {
    match ctx.transmitter.wake(&request.mac_address).await {
        Ok(()) => Json(CommandResponse::ok("Magic packet sent successfully")),
        Err(e) => {
            warn!(mac = %request.mac_address, error = %e, "wake failed");
            Json(CommandResponse::failed(e.to_string()))
        }
    }
}

/// Probe the target, then dispatch the sleep command chain
async fn sleep(State(ctx): State<RelayContext>) -> Json<CommandResponse> {
    Json(
        dispatch_sleep(
            ctx.prober.as_ref(),
            ctx.commander.as_ref(),
            ctx.config.target.host,
        )
        .await,
    )
}

/// The sleep precondition and command dispatch, separated from the route
/// so the gating can be exercised directly
pub(crate) async fn dispatch_sleep(
    prober: &dyn LivenessProbe,
    commander: &dyn SleepCommander,
    host: IpAddr,
) -> CommandResponse {
    if !prober.is_online(host).await {
        info!(target = %host, "sleep refused, target already offline");
        return CommandResponse::failed("target is offline or unreachable");
    }

    match commander.sleep().await {
        Ok(outcome) => CommandResponse::ok(outcome.message()),
        Err(e) => {
            warn!(target = %host, error = %e, "sleep dispatch failed");
            CommandResponse::failed(e.to_string())
        }
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

/// Target reachability for status reporting
async fn win_status(State(ctx): State<RelayContext>) -> Json<serde_json::Value> {
    let online = ctx.prober.is_online(ctx.config.target.host).await;
    Json(json!({
        "win_status": if online { "online" } else { "offline" }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::shell::{SleepError, SleepOutcome};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct FixedProbe(bool);

    #[async_trait]
    impl LivenessProbe for FixedProbe {
        async fn is_online(&self, _addr: IpAddr) -> bool {
            self.0
        }
    }

    #[derive(Default)]
    struct RecordingCommander {
        called: AtomicBool,
        fail: AtomicUsize,
    }

    #[async_trait]
    impl SleepCommander for RecordingCommander {
        async fn sleep(&self) -> Result<SleepOutcome, SleepError> {
            self.called.store(true, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) != 0 {
                Err(SleepError::Connect("target vanished".to_string()))
            } else {
                Ok(SleepOutcome::Primary)
            }
        }
    }

    fn host() -> IpAddr {
        "192.168.1.50".parse().unwrap()
    }

    #[tokio::test]
    async fn offline_target_short_circuits_sleep() {
        let commander = RecordingCommander::default();
        let response = dispatch_sleep(&FixedProbe(false), &commander, host()).await;

        assert!(!response.success);
        assert!(response.message.contains("offline"));
        // The commander must never have been invoked
        assert!(!commander.called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn online_target_dispatches_sleep() {
        let commander = RecordingCommander::default();
        let response = dispatch_sleep(&FixedProbe(true), &commander, host()).await;

        assert!(response.success);
        assert!(commander.called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn dispatch_failure_is_reported_not_propagated() {
        let commander = RecordingCommander::default();
        commander.fail.store(1, Ordering::SeqCst);
        let response = dispatch_sleep(&FixedProbe(true), &commander, host()).await;

        assert!(!response.success);
        assert!(response.message.contains("target vanished"));
    }
}
