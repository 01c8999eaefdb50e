/// Relay client - the portal's only path to the target machine
///
/// Wraps the relay gateway's HTTP surface with per-call timeouts. Transport
/// failures on the status paths are expected steady-state conditions and
/// collapse to "offline"/"unknown"; on the command paths they surface as
/// upstream errors.
use crate::{
    api::CommandResponse,
    error::{BridgeError, BridgeResult},
};
use std::time::Duration;
use tracing::{debug, warn};

const WAKE_TIMEOUT: Duration = Duration::from_secs(10);
const SLEEP_TIMEOUT: Duration = Duration::from_secs(15);
const STATUS_TIMEOUT: Duration = Duration::from_secs(5);

/// Relay health as seen from the portal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayHealth {
    Online,
    Error,
    Offline,
}

impl RelayHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayHealth::Online => "online",
            RelayHealth::Error => "error",
            RelayHealth::Offline => "offline",
        }
    }
}

/// HTTP client for the relay gateway
pub struct RelayClient {
    http: reqwest::Client,
    base: String,
}

impl RelayClient {
    pub fn new(host: &str, port: u16) -> BridgeResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("wolbridge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BridgeError::Internal(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base: format!("http://{}:{}", host, port),
        })
    }

    /// Ask the relay to broadcast a magic packet for this address
    pub async fn wake(&self, mac: &str) -> BridgeResult<CommandResponse> {
        let response = self
            .http
            .post(format!("{}/wake", self.base))
            .timeout(WAKE_TIMEOUT)
            .json(&serde_json::json!({ "mac_address": mac }))
            .send()
            .await
            .map_err(upstream)?;
        parse_command_response(response).await
    }

    /// Ask the relay to put the target to sleep
    pub async fn sleep(&self) -> BridgeResult<CommandResponse> {
        let response = self
            .http
            .post(format!("{}/sleep", self.base))
            .timeout(SLEEP_TIMEOUT)
            .send()
            .await
            .map_err(upstream)?;
        parse_command_response(response).await
    }

    /// Probe the relay itself; transport failure means offline, a
    /// non-success status means error
    pub async fn health(&self) -> RelayHealth {
        let result = self
            .http
            .get(format!("{}/health", self.base))
            .timeout(STATUS_TIMEOUT)
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => RelayHealth::Online,
            Ok(response) => {
                warn!(status = %response.status(), "relay health returned non-success");
                RelayHealth::Error
            }
            Err(e) => {
                debug!(error = %e, "relay unreachable");
                RelayHealth::Offline
            }
        }
    }

    /// Fetch the target's online state via the relay; any failure maps to
    /// "unknown" rather than an error
    pub async fn win_status(&self) -> String {
        let result = self
            .http
            .get(format!("{}/win_status", self.base))
            .timeout(STATUS_TIMEOUT)
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => {
                match response.json::<serde_json::Value>().await {
                    Ok(body) => body["win_status"]
                        .as_str()
                        .unwrap_or("unknown")
                        .to_string(),
                    Err(e) => {
                        warn!(error = %e, "relay returned malformed win_status");
                        "unknown".to_string()
                    }
                }
            }
            Ok(response) => {
                warn!(status = %response.status(), "relay win_status returned non-success");
                "unknown".to_string()
            }
            Err(e) => {
                debug!(error = %e, "relay unreachable for win_status");
                "unknown".to_string()
            }
        }
    }
}

fn upstream(e: reqwest::Error) -> BridgeError {
    if e.is_timeout() {
        BridgeError::Upstream("timeout connecting to relay".to_string())
    } else if e.is_connect() {
        BridgeError::Upstream("cannot connect to relay".to_string())
    } else {
        BridgeError::Upstream(format!("relay request failed: {}", e))
    }
}

async fn parse_command_response(response: reqwest::Response) -> BridgeResult<CommandResponse> {
    let status = response.status();
    if !status.is_success() {
        return Err(BridgeError::Upstream(format!(
            "relay returned status {}",
            status
        )));
    }
    response
        .json()
        .await
        .map_err(|e| BridgeError::Upstream(format!("malformed relay response: {}", e)))
}
