/// Session Authority - sliding-expiration sessions keyed by request origin
///
/// Two authentication methods share one timeout policy: a completed
/// credential proof, or an origin address that matches the operator's own
/// trusted network. Every authorized operation refreshes the session
/// timestamp; an expired session is cleared, never silently reused.
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info};

/// How a session was established
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    CredentialProof,
    NetworkBypass,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::CredentialProof => "credential_proof",
            AuthMethod::NetworkBypass => "network_bypass",
        }
    }
}

/// Why an authorization attempt was denied
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Denial {
    #[error("no active session")]
    NoSession,
    #[error("session expired")]
    Expired,
}

/// A session that passed authorization for the current request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedSession {
    /// Enrolled identity; bypass sessions have none
    pub identity: Option<String>,
    pub method: AuthMethod,
}

#[derive(Debug, Clone)]
struct SessionEntry {
    identity: Option<String>,
    method: AuthMethod,
    refreshed_at: DateTime<Utc>,
}

impl SessionEntry {
    fn authorized(&self) -> AuthorizedSession {
        AuthorizedSession {
            identity: self.identity.clone(),
            method: self.method,
        }
    }
}

/// Decides whether an origin address belongs to the operator's own network
#[async_trait]
pub trait BypassGate: Send + Sync {
    async fn origin_matches(&self, origin: IpAddr) -> bool;
}

/// Issues, validates, and expires per-origin sessions
pub struct SessionAuthority {
    entries: Mutex<HashMap<IpAddr, SessionEntry>>,
    timeout: Duration,
    bypass: Arc<dyn BypassGate>,
}

impl SessionAuthority {
    pub fn new(timeout_secs: u64, bypass: Arc<dyn BypassGate>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            timeout: Duration::seconds(timeout_secs as i64),
            bypass,
        }
    }

    pub fn timeout_secs(&self) -> i64 {
        self.timeout.num_seconds()
    }

    /// Record a completed credential proof for this origin
    pub fn establish_by_credential(&self, origin: IpAddr, identity: &str) {
        let mut entries = self.entries.lock().expect("session map poisoned");
        entries.insert(
            origin,
            SessionEntry {
                identity: Some(identity.to_string()),
                method: AuthMethod::CredentialProof,
                refreshed_at: Utc::now(),
            },
        );
        info!(identity = %identity, client = %origin, "credential session established");
    }

    /// Establish a bypass session if the origin matches the trusted
    /// network; returns whether it matched
    pub async fn establish_by_bypass(&self, origin: IpAddr) -> bool {
        if !self.bypass.origin_matches(origin).await {
            return false;
        }
        self.insert_bypass(origin, Utc::now());
        true
    }

    fn insert_bypass(&self, origin: IpAddr, now: DateTime<Utc>) {
        let mut entries = self.entries.lock().expect("session map poisoned");
        entries.insert(
            origin,
            SessionEntry {
                identity: None,
                method: AuthMethod::NetworkBypass,
                refreshed_at: now,
            },
        );
        info!(client = %origin, "network-bypass session established");
    }

    /// The single gate every protected operation passes through.
    ///
    /// A valid session is refreshed (sliding expiration). An expired bypass
    /// session gets one re-check against the trusted network before being
    /// cleared; an expired credential session is cleared outright. With no
    /// session at all, a fresh bypass check may still grant access.
    pub async fn authorize(&self, origin: IpAddr) -> Result<AuthorizedSession, Denial> {
        self.authorize_at(origin, Utc::now()).await
    }

    async fn authorize_at(
        &self,
        origin: IpAddr,
        now: DateTime<Utc>,
    ) -> Result<AuthorizedSession, Denial> {
        // Snapshot under the lock; the bypass re-check awaits DNS, so the
        // check-then-mutate sequence is deliberately not atomic (tolerated:
        // concurrent requests from one origin converge on the same entry).
        let snapshot = {
            let entries = self.entries.lock().expect("session map poisoned");
            entries.get(&origin).cloned()
        };

        match snapshot {
            Some(entry) if now - entry.refreshed_at <= self.timeout => {
                self.refresh(origin, now);
                Ok(entry.authorized())
            }
            Some(entry) if entry.method == AuthMethod::NetworkBypass => {
                // Expired bypass session: the origin may still sit on the
                // trusted network, so re-run the check before denying
                if self.bypass.origin_matches(origin).await {
                    self.insert_bypass(origin, now);
                    Ok(AuthorizedSession {
                        identity: None,
                        method: AuthMethod::NetworkBypass,
                    })
                } else {
                    self.clear(origin);
                    debug!(client = %origin, "expired bypass session cleared");
                    Err(Denial::Expired)
                }
            }
            Some(_) => {
                self.clear(origin);
                debug!(client = %origin, "expired credential session cleared");
                Err(Denial::Expired)
            }
            None => {
                if self.bypass.origin_matches(origin).await {
                    self.insert_bypass(origin, now);
                    Ok(AuthorizedSession {
                        identity: None,
                        method: AuthMethod::NetworkBypass,
                    })
                } else {
                    Err(Denial::NoSession)
                }
            }
        }
    }

    fn refresh(&self, origin: IpAddr, now: DateTime<Utc>) {
        let mut entries = self.entries.lock().expect("session map poisoned");
        if let Some(entry) = entries.get_mut(&origin) {
            entry.refreshed_at = now;
        }
    }

    fn clear(&self, origin: IpAddr) {
        self.entries
            .lock()
            .expect("session map poisoned")
            .remove(&origin);
    }

    /// Unconditionally drop this origin's session
    pub fn logout(&self, origin: IpAddr) -> Option<String> {
        let mut entries = self.entries.lock().expect("session map poisoned");
        let identity = entries.remove(&origin).and_then(|e| e.identity);
        info!(client = %origin, identity = ?identity, "logged out");
        identity
    }

    /// Read the current session without refreshing it
    pub fn session_info(&self, origin: IpAddr) -> Option<AuthorizedSession> {
        let entries = self.entries.lock().expect("session map poisoned");
        entries.get(&origin).map(|e| e.authorized())
    }
}
