/// Application contexts and dependency injection
use crate::{
    auth::{
        bypass::DnsBypassResolver, challenge::ChallengeRegistry, credential::CredentialStore,
        session::SessionAuthority, Authenticator,
    },
    config::{PortalConfig, RelayConfig},
    error::{BridgeError, BridgeResult},
    relay::{
        client::RelayClient,
        magic::MagicPacketTransmitter,
        probe::{LivenessProbe, PingProbe},
        shell::{SleepCommander, SshCommander},
    },
};
use std::sync::Arc;

/// Shared services of the public authorization layer
#[derive(Clone)]
pub struct PortalContext {
    pub config: Arc<PortalConfig>,
    pub resolver: Arc<DnsBypassResolver>,
    pub sessions: Arc<SessionAuthority>,
    pub auth: Arc<Authenticator>,
    pub relay: Arc<RelayClient>,
}

impl PortalContext {
    /// Create a portal context from configuration
    pub async fn new(config: PortalConfig) -> BridgeResult<Self> {
        config.validate()?;
        Self::ensure_store_directory(&config).await?;
        let config = Arc::new(config);

        let resolver = Arc::new(DnsBypassResolver::new(
            config.trusted_domain.clone(),
            config.dns_ttl_secs,
        ));
        let sessions = Arc::new(SessionAuthority::new(
            config.session_timeout_secs,
            resolver.clone(),
        ));
        let store = Arc::new(CredentialStore::new(&config.credentials_file));
        let challenges = Arc::new(ChallengeRegistry::new(config.challenge_ttl_secs));
        let auth = Arc::new(Authenticator::new(
            config.clone(),
            store,
            challenges,
            sessions.clone(),
        ));
        let relay = Arc::new(RelayClient::new(&config.relay_host, config.relay_port)?);

        Ok(Self {
            config,
            resolver,
            sessions,
            auth,
            relay,
        })
    }

    async fn ensure_store_directory(config: &PortalConfig) -> BridgeResult<()> {
        if let Some(parent) = config.credentials_file.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    BridgeError::Internal(format!(
                        "Failed to create directory {:?}: {}",
                        parent, e
                    ))
                })?;
            }
        }
        Ok(())
    }
}

/// Shared services of the LAN-side relay gateway
#[derive(Clone)]
pub struct RelayContext {
    pub config: Arc<RelayConfig>,
    pub transmitter: Arc<MagicPacketTransmitter>,
    pub commander: Arc<dyn SleepCommander>,
    pub prober: Arc<dyn LivenessProbe>,
}

impl RelayContext {
    /// Create a relay context from configuration
    pub fn new(config: RelayConfig) -> BridgeResult<Self> {
        config.validate()?;
        let commander = Arc::new(SshCommander::new(config.target.clone()));
        Ok(Self {
            config: Arc::new(config),
            transmitter: Arc::new(MagicPacketTransmitter::default()),
            commander,
            prober: Arc::new(PingProbe::default()),
        })
    }
}
