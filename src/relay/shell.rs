/// Remote Shell Commander - puts the target to sleep over SSH
///
/// A successful suspend stops the target from responding before the command
/// can confirm completion, so dispatch without a channel error is treated
/// as success and the call never waits for output. Dispatch failures walk
/// an ordered fallback command list; the session is closed on every exit
/// path.
use crate::config::TargetConfig;
use async_trait::async_trait;
use ssh2::Session;
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Primary suspend command: do not force applications closed, allow wake
/// events
pub const PRIMARY_SLEEP_COMMAND: &str = r#"powershell.exe -Command "Add-Type -AssemblyName System.Windows.Forms; [System.Windows.Forms.Application]::SetSuspendState([System.Windows.Forms.PowerState]::Suspend, $false, $false)""#;

/// Ordered fallbacks: forced suspend, then the power-profile helper
pub const FALLBACK_SLEEP_COMMANDS: [&str; 2] = [
    r#"powershell.exe -Command "Add-Type -AssemblyName System.Windows.Forms; [System.Windows.Forms.Application]::SetSuspendState([System.Windows.Forms.PowerState]::Suspend, $true, $false)""#,
    "rundll32.exe powrprof.dll,SetSuspendState 0,1,0",
];

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const SESSION_TIMEOUT_MS: u32 = 10_000;
const DISPATCH_TIMEOUT_MS: u32 = 5_000;

#[derive(Debug, Error)]
pub enum SleepError {
    #[error("SSH authentication failed")]
    Auth,
    #[error("SSH connection error: {0}")]
    Connect(String),
    #[error("host key mismatch: expected {expected}, presented {presented}")]
    HostKey { expected: String, presented: String },
    #[error("all sleep commands failed, last error: {0}")]
    Command(String),
}

/// Which command in the chain dispatched successfully
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepOutcome {
    Primary,
    Fallback(usize),
}

impl SleepOutcome {
    pub fn message(&self) -> String {
        match self {
            SleepOutcome::Primary => "Sleep command sent successfully.".to_string(),
            SleepOutcome::Fallback(n) => {
                format!("Sleep command sent successfully (backup method {}).", n)
            }
        }
    }
}

/// Walk the primary command and then each fallback, stopping at the first
/// dispatch that succeeds. When every attempt fails, the last error wins.
pub fn dispatch_first<E>(
    primary: &str,
    fallbacks: &[&str],
    mut dispatch: impl FnMut(&str) -> Result<(), E>,
) -> Result<SleepOutcome, E> {
    let mut last = match dispatch(primary) {
        Ok(()) => return Ok(SleepOutcome::Primary),
        Err(e) => e,
    };
    for (index, command) in fallbacks.iter().enumerate() {
        match dispatch(command) {
            Ok(()) => return Ok(SleepOutcome::Fallback(index + 1)),
            Err(e) => last = e,
        }
    }
    Err(last)
}

#[async_trait]
pub trait SleepCommander: Send + Sync {
    async fn sleep(&self) -> Result<SleepOutcome, SleepError>;
}

/// SSH-backed commander using password authentication
pub struct SshCommander {
    target: TargetConfig,
}

impl SshCommander {
    pub fn new(target: TargetConfig) -> Self {
        Self { target }
    }

    fn sleep_blocking(target: &TargetConfig) -> Result<SleepOutcome, SleepError> {
        let addr = SocketAddr::new(target.host, target.ssh_port);
        let tcp = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)
            .map_err(|e| SleepError::Connect(e.to_string()))?;

        let mut session =
            Session::new().map_err(|e| SleepError::Connect(e.to_string()))?;
        session.set_tcp_stream(tcp);
        session.set_timeout(SESSION_TIMEOUT_MS);
        session
            .handshake()
            .map_err(|e| SleepError::Connect(e.to_string()))?;

        Self::check_host_key(&session, target)?;

        if session
            .userauth_password(&target.ssh_user, &target.ssh_password)
            .is_err()
            || !session.authenticated()
        {
            let _ = session.disconnect(None, "authentication failed", None);
            return Err(SleepError::Auth);
        }

        // The target may vanish mid-command; keep each attempt short
        session.set_timeout(DISPATCH_TIMEOUT_MS);
        let result = dispatch_first(
            PRIMARY_SLEEP_COMMAND,
            &FALLBACK_SLEEP_COMMANDS,
            |command| {
                let mut channel = session.channel_session()?;
                channel.exec(command)?;
                // Do not wait for completion; a suspended target never
                // answers
                let _ = channel.close();
                Ok::<(), ssh2::Error>(())
            },
        )
        .map_err(|e| SleepError::Command(e.to_string()));

        let _ = session.disconnect(None, "power command dispatched", None);
        result
    }

    /// Compare the presented host key against the configured pin, if any.
    /// Without a pin the host identity is trusted on first contact.
    fn check_host_key(session: &Session, target: &TargetConfig) -> Result<(), SleepError> {
        let Some(expected) = &target.ssh_host_key_sha256 else {
            return Ok(());
        };
        let digest = session
            .host_key_hash(ssh2::HashType::Sha256)
            .ok_or_else(|| SleepError::Connect("host key unavailable".to_string()))?;
        let presented = hex::encode(digest);
        if !presented.eq_ignore_ascii_case(expected) {
            warn!(expected = %expected, presented = %presented, "target host key does not match the pin");
            return Err(SleepError::HostKey {
                expected: expected.clone(),
                presented,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SleepCommander for SshCommander {
    async fn sleep(&self) -> Result<SleepOutcome, SleepError> {
        let target = self.target.clone();
        let outcome = tokio::task::spawn_blocking(move || Self::sleep_blocking(&target))
            .await
            .map_err(|e| SleepError::Connect(format!("ssh worker failed: {}", e)))??;

        info!(outcome = ?outcome, "sleep command dispatched");
        Ok(outcome)
    }
}
