/// Liveness Prober - bounded reachability check for the target machine
///
/// Gates the sleep path and answers status queries. Every failure mode
/// (non-zero exit, spawn error, timeout) is reported as offline, never
/// propagated as an error.
use async_trait::async_trait;
use std::net::IpAddr;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

#[async_trait]
pub trait LivenessProbe: Send + Sync {
    async fn is_online(&self, addr: IpAddr) -> bool;
}

/// Probes with a single system ping (1 packet, 1 second wait)
pub struct PingProbe {
    timeout: Duration,
}

impl Default for PingProbe {
    fn default() -> Self {
        // The ping itself waits one second; the outer bound covers process
        // startup as well
        Self {
            timeout: Duration::from_secs(2),
        }
    }
}

#[async_trait]
impl LivenessProbe for PingProbe {
    async fn is_online(&self, addr: IpAddr) -> bool {
        let addr_arg = addr.to_string();
        let mut command = Command::new("ping");
        command
            .args(["-c", "1", "-W", "1", addr_arg.as_str()])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        match tokio::time::timeout(self.timeout, command.status()).await {
            Ok(Ok(status)) => status.success(),
            Ok(Err(e)) => {
                debug!(addr = %addr, error = %e, "ping could not run, treating target as offline");
                false
            }
            Err(_) => {
                debug!(addr = %addr, "ping timed out, treating target as offline");
                false
            }
        }
    }
}
