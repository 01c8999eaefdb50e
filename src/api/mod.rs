/// API routes and shared payload types
pub mod gateway;
pub mod portal;

use serde::{Deserialize, Serialize};

/// Uniform command result body for wake/sleep operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    pub success: bool,
    pub message: String,
}

impl CommandResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Wake request body on the relay gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WakeRequest {
    pub mac_address: String,
}

/// Credential assertion as presented by the client, validated at the
/// boundary instead of trusted ad hoc
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialPayload {
    pub id: String,
    #[serde(rename = "rawId")]
    pub raw_id: String,
    pub response: serde_json::Value,
    #[serde(rename = "type")]
    pub cred_type: String,
}

fn default_identity() -> String {
    "wol_user".to_string()
}

/// Ceremony start request
#[derive(Debug, Clone, Deserialize)]
pub struct BeginRequest {
    #[serde(default = "default_identity")]
    pub username: String,
}

/// Ceremony completion request
#[derive(Debug, Clone, Deserialize)]
pub struct CompleteRequest {
    #[serde(default = "default_identity")]
    pub username: String,
    pub credential: CredentialPayload,
}
