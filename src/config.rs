/// Configuration management for Wolbridge
///
/// Both binaries load their configuration from the environment at startup;
/// all values are treated as immutable once the process is running.
use crate::error::{BridgeError, BridgeResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::net::IpAddr;
use std::path::PathBuf;

/// Default sliding session timeout in seconds
pub const DEFAULT_SESSION_TIMEOUT_SECS: u64 = 300;
/// Default challenge expiry in seconds
pub const DEFAULT_CHALLENGE_TTL_SECS: u64 = 300;
/// Default TTL for cached trusted-domain resolution in seconds
pub const DEFAULT_DNS_TTL_SECS: u64 = 300;

/// Portal (public authorization layer) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    pub bind_host: String,
    pub port: u16,
    /// Domain whose resolved address grants the network bypass; also used
    /// as the relying-party id in credential options
    pub trusted_domain: String,
    /// Relying-party display name in credential creation options
    pub rp_name: String,
    /// Hardware address forwarded to the relay on /wake
    pub target_mac: String,
    pub relay_host: String,
    pub relay_port: u16,
    pub credentials_file: PathBuf,
    pub session_timeout_secs: u64,
    pub challenge_ttl_secs: u64,
    pub dns_ttl_secs: u64,
}

/// Relay (LAN-side gateway) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    pub bind_host: String,
    pub port: u16,
    pub target: TargetConfig,
}

/// The single target machine the relay controls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Hardware address for the magic packet
    pub mac: String,
    /// LAN address for liveness probing and SSH
    pub host: IpAddr,
    pub ssh_port: u16,
    pub ssh_user: String,
    pub ssh_password: String,
    /// Optional hex-encoded SHA-256 host key pin; when unset the target's
    /// host identity is trusted on first contact
    pub ssh_host_key_sha256: Option<String>,
}

impl PortalConfig {
    /// Load portal configuration from environment variables
    pub fn from_env() -> BridgeResult<Self> {
        dotenv::dotenv().ok();

        let bind_host = env::var("WOL_PORTAL_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("WOL_PORTAL_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| BridgeError::Validation("Invalid portal port".to_string()))?;

        let trusted_domain = env::var("WOL_TRUSTED_DOMAIN")
            .map_err(|_| BridgeError::Validation("WOL_TRUSTED_DOMAIN is required".to_string()))?;
        let rp_name = env::var("WOL_RP_NAME")
            .unwrap_or_else(|_| "Wolbridge Remote Power".to_string());

        let target_mac = env::var("WOL_TARGET_MAC")
            .map_err(|_| BridgeError::Validation("WOL_TARGET_MAC is required".to_string()))?;

        let relay_host = env::var("WOL_RELAY_HOST")
            .map_err(|_| BridgeError::Validation("WOL_RELAY_HOST is required".to_string()))?;
        let relay_port = env::var("WOL_RELAY_PORT")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .map_err(|_| BridgeError::Validation("Invalid relay port".to_string()))?;

        let credentials_file = env::var("WOL_CREDENTIALS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data/user_credentials.json"));

        let session_timeout_secs = parse_secs("WOL_SESSION_TIMEOUT", DEFAULT_SESSION_TIMEOUT_SECS);
        let challenge_ttl_secs = parse_secs("WOL_CHALLENGE_TTL", DEFAULT_CHALLENGE_TTL_SECS);
        let dns_ttl_secs = parse_secs("WOL_DNS_TTL", DEFAULT_DNS_TTL_SECS);

        let config = Self {
            bind_host,
            port,
            trusted_domain,
            rp_name,
            target_mac,
            relay_host,
            relay_port,
            credentials_file,
            session_timeout_secs,
            challenge_ttl_secs,
            dns_ttl_secs,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> BridgeResult<()> {
        if self.trusted_domain.trim().is_empty() {
            return Err(BridgeError::Validation(
                "Trusted domain cannot be empty".to_string(),
            ));
        }
        if !crate::relay::magic::is_well_formed(&self.target_mac) {
            return Err(BridgeError::Validation(
                "Target MAC must reduce to 12 hex characters".to_string(),
            ));
        }
        if self.session_timeout_secs == 0 || self.challenge_ttl_secs == 0 {
            return Err(BridgeError::Validation(
                "Session timeout and challenge TTL must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl RelayConfig {
    /// Load relay configuration from environment variables
    pub fn from_env() -> BridgeResult<Self> {
        dotenv::dotenv().ok();

        let bind_host = env::var("WOL_RELAY_BIND_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("WOL_RELAY_BIND_PORT")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .map_err(|_| BridgeError::Validation("Invalid relay bind port".to_string()))?;

        let mac = env::var("WOL_TARGET_MAC")
            .map_err(|_| BridgeError::Validation("WOL_TARGET_MAC is required".to_string()))?;
        let host = env::var("WOL_TARGET_HOST")
            .map_err(|_| BridgeError::Validation("WOL_TARGET_HOST is required".to_string()))?
            .parse()
            .map_err(|_| BridgeError::Validation("WOL_TARGET_HOST must be an IP address".to_string()))?;

        let ssh_port = env::var("WOL_SSH_PORT")
            .unwrap_or_else(|_| "22".to_string())
            .parse()
            .map_err(|_| BridgeError::Validation("Invalid SSH port".to_string()))?;
        let ssh_user = env::var("WOL_SSH_USER")
            .map_err(|_| BridgeError::Validation("WOL_SSH_USER is required".to_string()))?;
        let ssh_password = env::var("WOL_SSH_PASSWORD")
            .map_err(|_| BridgeError::Validation("WOL_SSH_PASSWORD is required".to_string()))?;
        let ssh_host_key_sha256 = env::var("WOL_SSH_HOST_KEY_SHA256").ok();

        let config = Self {
            bind_host,
            port,
            target: TargetConfig {
                mac,
                host,
                ssh_port,
                ssh_user,
                ssh_password,
                ssh_host_key_sha256,
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> BridgeResult<()> {
        if !crate::relay::magic::is_well_formed(&self.target.mac) {
            return Err(BridgeError::Validation(
                "Target MAC must reduce to 12 hex characters".to_string(),
            ));
        }
        if self.target.ssh_user.is_empty() {
            return Err(BridgeError::Validation(
                "SSH user cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_secs(var: &str, default: u64) -> u64 {
    env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
