/// Challenge Registry - short-lived challenges for credential ceremonies
///
/// One outstanding challenge per identity; a reissue replaces the previous
/// entry. Entries expire after the configured TTL and are swept lazily at
/// the start of each auth request rather than on a timer.
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;
use tracing::info;

/// Challenge byte length (matches WebAuthn recommendations)
pub const CHALLENGE_LEN: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChallengeError {
    /// No outstanding challenge for this identity
    #[error("no outstanding challenge, restart the ceremony")]
    NotFound,
    /// The challenge outlived its TTL; the entry has been removed
    #[error("challenge expired, restart the ceremony")]
    Expired,
}

#[derive(Debug, Clone)]
struct ChallengeEntry {
    bytes: [u8; CHALLENGE_LEN],
    issued_at: DateTime<Utc>,
}

/// In-memory registry of outstanding challenges, keyed by identity
pub struct ChallengeRegistry {
    entries: Mutex<HashMap<String, ChallengeEntry>>,
    ttl: Duration,
}

impl ChallengeRegistry {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl: Duration::seconds(ttl_secs as i64),
        }
    }

    /// Issue a fresh challenge, replacing any outstanding one
    pub fn issue(&self, identity: &str) -> [u8; CHALLENGE_LEN] {
        self.issue_at(identity, Utc::now())
    }

    fn issue_at(&self, identity: &str, now: DateTime<Utc>) -> [u8; CHALLENGE_LEN] {
        let mut bytes = [0u8; CHALLENGE_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);

        let mut entries = self.entries.lock().expect("challenge registry poisoned");
        entries.insert(
            identity.to_string(),
            ChallengeEntry {
                bytes,
                issued_at: now,
            },
        );
        bytes
    }

    /// Check that a live challenge exists without consuming it.
    ///
    /// An expired entry is removed and reported as `Expired`, never as
    /// `NotFound`.
    pub fn verify(&self, identity: &str) -> Result<[u8; CHALLENGE_LEN], ChallengeError> {
        self.verify_at(identity, Utc::now())
    }

    fn verify_at(
        &self,
        identity: &str,
        now: DateTime<Utc>,
    ) -> Result<[u8; CHALLENGE_LEN], ChallengeError> {
        let mut entries = self.entries.lock().expect("challenge registry poisoned");
        let entry = entries.get(identity).ok_or(ChallengeError::NotFound)?;
        if now - entry.issued_at > self.ttl {
            entries.remove(identity);
            return Err(ChallengeError::Expired);
        }
        Ok(entry.bytes)
    }

    /// Consume the outstanding challenge on successful ceremony completion
    pub fn consume(&self, identity: &str) -> Result<[u8; CHALLENGE_LEN], ChallengeError> {
        self.consume_at(identity, Utc::now())
    }

    fn consume_at(
        &self,
        identity: &str,
        now: DateTime<Utc>,
    ) -> Result<[u8; CHALLENGE_LEN], ChallengeError> {
        let bytes = self.verify_at(identity, now)?;
        self.entries
            .lock()
            .expect("challenge registry poisoned")
            .remove(identity);
        Ok(bytes)
    }

    /// Drop every entry older than the TTL
    pub fn sweep(&self) {
        self.sweep_at(Utc::now())
    }

    fn sweep_at(&self, now: DateTime<Utc>) {
        let mut entries = self.entries.lock().expect("challenge registry poisoned");
        let before = entries.len();
        entries.retain(|_, entry| now - entry.issued_at <= self.ttl);
        let swept = before - entries.len();
        if swept > 0 {
            info!(swept, "removed expired challenges");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_replaces_outstanding_challenge() {
        let registry = ChallengeRegistry::new(300);
        let first = registry.issue("alice");
        let second = registry.issue("alice");
        assert_ne!(first, second);
        assert_eq!(registry.consume("alice").unwrap(), second);
    }

    #[test]
    fn consume_is_single_use() {
        let registry = ChallengeRegistry::new(300);
        registry.issue("alice");
        assert!(registry.consume("alice").is_ok());
        assert_eq!(registry.consume("alice"), Err(ChallengeError::NotFound));
    }

    #[test]
    fn challenge_accepted_just_before_expiry() {
        let registry = ChallengeRegistry::new(300);
        let issued = Utc::now();
        registry.issue_at("alice", issued);
        assert!(registry
            .consume_at("alice", issued + Duration::seconds(299))
            .is_ok());
    }

    #[test]
    fn expired_challenge_is_reported_and_deleted() {
        let registry = ChallengeRegistry::new(300);
        let issued = Utc::now();
        registry.issue_at("alice", issued);

        let late = issued + Duration::seconds(301);
        assert_eq!(
            registry.consume_at("alice", late),
            Err(ChallengeError::Expired)
        );
        // The entry is gone, so a retry reports NotFound rather than Expired
        assert_eq!(
            registry.consume_at("alice", late),
            Err(ChallengeError::NotFound)
        );
    }

    #[test]
    fn sweep_removes_only_stale_entries() {
        let registry = ChallengeRegistry::new(300);
        let now = Utc::now();
        registry.issue_at("stale", now - Duration::seconds(400));
        registry.issue_at("fresh", now);

        registry.sweep_at(now);
        assert_eq!(
            registry.consume_at("stale", now),
            Err(ChallengeError::NotFound)
        );
        assert!(registry.consume_at("fresh", now).is_ok());
    }
}
