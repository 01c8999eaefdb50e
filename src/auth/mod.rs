/// Authorization layer: credential ceremonies, sessions, network bypass
pub mod bypass;
pub mod challenge;
pub mod credential;
pub mod session;

use crate::{
    api::CredentialPayload,
    config::PortalConfig,
    error::{BridgeError, BridgeResult},
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use challenge::{ChallengeError, ChallengeRegistry};
use chrono::Utc;
use credential::{CredentialRecord, CredentialStore};
use serde_json::{json, Value};
use session::SessionAuthority;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{info, warn};

/// Drives the enrollment and authentication ceremonies end to end
pub struct Authenticator {
    config: Arc<PortalConfig>,
    store: Arc<CredentialStore>,
    challenges: Arc<ChallengeRegistry>,
    sessions: Arc<SessionAuthority>,
}

impl Authenticator {
    pub fn new(
        config: Arc<PortalConfig>,
        store: Arc<CredentialStore>,
        challenges: Arc<ChallengeRegistry>,
        sessions: Arc<SessionAuthority>,
    ) -> Self {
        Self {
            config,
            store,
            challenges,
            sessions,
        }
    }

    fn valid_identity(identity: &str) -> BridgeResult<&str> {
        let trimmed = identity.trim();
        if trimmed.is_empty() {
            return Err(BridgeError::Validation(
                "username cannot be empty".to_string(),
            ));
        }
        Ok(trimmed)
    }

    /// Start enrollment: issue a challenge and return WebAuthn-shaped
    /// credential creation options
    pub async fn begin_register(&self, identity: &str, client: IpAddr) -> BridgeResult<Value> {
        self.challenges.sweep();
        let identity = Self::valid_identity(identity)?;

        let challenge = self.challenges.issue(identity);
        info!(identity = %identity, client = %client, "enrollment started");

        Ok(json!({
            "challenge": URL_SAFE_NO_PAD.encode(challenge),
            "rp": {
                "name": self.config.rp_name,
                "id": self.config.trusted_domain,
            },
            "user": {
                "id": URL_SAFE_NO_PAD.encode(identity.as_bytes()),
                "name": identity,
                "displayName": identity,
            },
            "pubKeyCredParams": [
                {"alg": -7, "type": "public-key"},
                {"alg": -257, "type": "public-key"},
            ],
            "authenticatorSelection": {
                "authenticatorAttachment": "platform",
                "userVerification": "preferred",
                "requireResidentKey": false,
            },
            "timeout": 60000,
            "attestation": "none",
        }))
    }

    /// Complete enrollment: verify the outstanding challenge and persist
    /// the credential. The challenge is consumed only after a successful
    /// save, so a store failure lets the operator retry the ceremony.
    pub async fn complete_register(
        &self,
        identity: &str,
        credential: CredentialPayload,
        client: IpAddr,
    ) -> BridgeResult<()> {
        self.challenges.sweep();
        let identity = Self::valid_identity(identity)?;
        self.challenges
            .verify(identity)
            .map_err(challenge_denied)?;

        let mut credentials = self.store.load().await;
        credentials.insert(
            identity.to_string(),
            CredentialRecord {
                id: credential.id,
                raw_id: credential.raw_id,
                response: credential.response,
                cred_type: credential.cred_type,
                registered_at: Utc::now(),
                registered_ip: client.to_string(),
                last_used: None,
                last_used_ip: None,
            },
        );
        self.store.save(&credentials).await?;

        let _ = self.challenges.consume(identity);
        info!(identity = %identity, client = %client, "credential enrolled");
        Ok(())
    }

    /// Start authentication: issue a challenge and return request options
    /// referencing the enrolled credential
    pub async fn begin_authenticate(&self, identity: &str) -> BridgeResult<Value> {
        self.challenges.sweep();
        let identity = Self::valid_identity(identity)?;

        let credentials = self.store.load().await;
        let record = credentials.get(identity).ok_or_else(|| {
            warn!(identity = %identity, "authentication attempt for unenrolled identity");
            BridgeError::Validation("identity is not enrolled".to_string())
        })?;

        let challenge = self.challenges.issue(identity);
        info!(identity = %identity, "authentication started");

        Ok(json!({
            "challenge": URL_SAFE_NO_PAD.encode(challenge),
            "timeout": 60000,
            "rpId": self.config.trusted_domain,
            "allowCredentials": [
                {
                    "id": record.raw_id,
                    "type": "public-key",
                    "transports": ["internal", "usb", "nfc", "ble"],
                }
            ],
            "userVerification": "preferred",
        }))
    }

    /// Complete authentication: verify the challenge, match the presented
    /// credential against the enrolled one, and establish a session for
    /// the request origin.
    pub async fn complete_authenticate(
        &self,
        identity: &str,
        credential: &CredentialPayload,
        client: IpAddr,
    ) -> BridgeResult<()> {
        self.challenges.sweep();
        let identity = Self::valid_identity(identity)?;
        self.challenges
            .verify(identity)
            .map_err(challenge_denied)?;

        let mut credentials = self.store.load().await;
        let record = credentials
            .get_mut(identity)
            .ok_or_else(|| BridgeError::Auth("identity is not enrolled".to_string()))?;

        if credential.id != record.id {
            warn!(identity = %identity, client = %client, "credential mismatch");
            return Err(BridgeError::Auth("credential mismatch".to_string()));
        }

        record.last_used = Some(Utc::now());
        record.last_used_ip = Some(client.to_string());
        // Usage bookkeeping is best effort; a failed save must not block
        // the proof that already succeeded
        if let Err(e) = self.store.save(&credentials).await {
            warn!(identity = %identity, error = %e, "failed to record credential usage");
        }

        let _ = self.challenges.consume(identity);
        self.sessions.establish_by_credential(client, identity);
        info!(identity = %identity, client = %client, "authentication succeeded");
        Ok(())
    }

    /// Report the authenticated operator's enrollment details
    pub async fn user_info(&self, identity: Option<&str>, method: &str) -> BridgeResult<Value> {
        let Some(identity) = identity else {
            // Bypass sessions have no enrolled identity behind them
            return Ok(json!({
                "username": Value::Null,
                "method": method,
                "session_timeout": self.sessions.timeout_secs(),
            }));
        };

        let credentials = self.store.load().await;
        let record = credentials
            .get(identity)
            .ok_or_else(|| BridgeError::NotFound("identity is not enrolled".to_string()))?;

        Ok(json!({
            "username": identity,
            "method": method,
            "registered_at": record.registered_at,
            "last_used": record.last_used,
            "session_timeout": self.sessions.timeout_secs(),
        }))
    }
}

fn challenge_denied(err: ChallengeError) -> BridgeError {
    BridgeError::Auth(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::BypassGate;
    use async_trait::async_trait;
    use std::path::PathBuf;

    struct DenyGate;

    #[async_trait]
    impl BypassGate for DenyGate {
        async fn origin_matches(&self, _origin: IpAddr) -> bool {
            false
        }
    }

    fn authenticator(dir: &std::path::Path) -> Authenticator {
        let config = Arc::new(PortalConfig {
            bind_host: "127.0.0.1".to_string(),
            port: 0,
            trusted_domain: "home.example.invalid".to_string(),
            rp_name: "Wolbridge Remote Power".to_string(),
            target_mac: "AA:BB:CC:DD:EE:FF".to_string(),
            relay_host: "127.0.0.1".to_string(),
            relay_port: 5000,
            credentials_file: PathBuf::from(dir.join("creds.json")),
            session_timeout_secs: 300,
            challenge_ttl_secs: 300,
            dns_ttl_secs: 300,
        });
        let store = Arc::new(CredentialStore::new(&config.credentials_file));
        let challenges = Arc::new(ChallengeRegistry::new(config.challenge_ttl_secs));
        let sessions = Arc::new(SessionAuthority::new(
            config.session_timeout_secs,
            Arc::new(DenyGate),
        ));
        Authenticator::new(config, store, challenges, sessions)
    }

    fn payload(id: &str) -> CredentialPayload {
        CredentialPayload {
            id: id.to_string(),
            raw_id: format!("raw-{}", id),
            response: json!({"clientDataJSON": "e30"}),
            cred_type: "public-key".to_string(),
        }
    }

    fn client() -> IpAddr {
        "203.0.113.9".parse().unwrap()
    }

    #[tokio::test]
    async fn empty_identity_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let auth = authenticator(dir.path());
        assert!(matches!(
            auth.begin_register("   ", client()).await,
            Err(BridgeError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn register_complete_without_challenge_is_denied() {
        let dir = tempfile::tempdir().unwrap();
        let auth = authenticator(dir.path());
        assert!(matches!(
            auth.complete_register("alice", payload("cred-1"), client())
                .await,
            Err(BridgeError::Auth(_))
        ));
    }

    #[tokio::test]
    async fn authenticate_begin_requires_enrollment() {
        let dir = tempfile::tempdir().unwrap();
        let auth = authenticator(dir.path());
        assert!(matches!(
            auth.begin_authenticate("alice").await,
            Err(BridgeError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn enrollment_then_authentication_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let auth = authenticator(dir.path());

        let options = auth.begin_register("alice", client()).await.unwrap();
        assert!(options["challenge"].is_string());
        auth.complete_register("alice", payload("cred-1"), client())
            .await
            .unwrap();

        let request = auth.begin_authenticate("alice").await.unwrap();
        assert_eq!(request["allowCredentials"][0]["id"], "raw-cred-1");

        auth.complete_authenticate("alice", &payload("cred-1"), client())
            .await
            .unwrap();

        // The proof established a session for this origin
        let session = auth.sessions.authorize(client()).await.unwrap();
        assert_eq!(session.identity.as_deref(), Some("alice"));

        // Usage bookkeeping was persisted
        let stored = auth.store.load().await;
        assert!(stored["alice"].last_used.is_some());
        assert_eq!(stored["alice"].last_used_ip.as_deref(), Some("203.0.113.9"));
    }

    #[tokio::test]
    async fn mismatched_credential_id_is_denied() {
        let dir = tempfile::tempdir().unwrap();
        let auth = authenticator(dir.path());

        auth.begin_register("alice", client()).await.unwrap();
        auth.complete_register("alice", payload("cred-1"), client())
            .await
            .unwrap();

        auth.begin_authenticate("alice").await.unwrap();
        let result = auth
            .complete_authenticate("alice", &payload("cred-2"), client())
            .await;
        assert!(matches!(result, Err(BridgeError::Auth(_))));

        // No session was established for the failed proof
        assert!(auth.sessions.authorize(client()).await.is_err());
    }

    #[tokio::test]
    async fn challenge_is_single_use_per_ceremony() {
        let dir = tempfile::tempdir().unwrap();
        let auth = authenticator(dir.path());

        auth.begin_register("alice", client()).await.unwrap();
        auth.complete_register("alice", payload("cred-1"), client())
            .await
            .unwrap();

        // Completing again without a fresh challenge is denied
        assert!(matches!(
            auth.complete_register("alice", payload("cred-1"), client())
                .await,
            Err(BridgeError::Auth(_))
        ));
    }
}
