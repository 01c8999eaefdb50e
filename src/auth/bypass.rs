/// Network-Bypass Resolver - trusted-domain DNS matching with a cache
///
/// The operator's own network is identified by resolving a configured
/// domain name. Resolutions are cached with a TTL; when a fresh lookup
/// fails, the last cached address is used instead, so a transient DNS
/// failure never becomes an authorization failure by itself.
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::RwLock;
use tracing::{debug, warn};

use crate::auth::session::BypassGate;

#[derive(Debug, Clone)]
struct CachedLookup {
    addr: IpAddr,
    resolved_at: DateTime<Utc>,
}

/// Caching DNS resolver for the trusted domain
pub struct DnsBypassResolver {
    domain: String,
    ttl: Duration,
    cache: RwLock<HashMap<String, CachedLookup>>,
}

impl DnsBypassResolver {
    pub fn new(domain: impl Into<String>, ttl_secs: u64) -> Self {
        Self {
            domain: domain.into(),
            ttl: Duration::seconds(ttl_secs as i64),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Resolve a domain, preferring a fresh cache entry, then a live
    /// lookup, then a stale cache entry. None only when all three fail.
    pub async fn resolve(&self, domain: &str) -> Option<IpAddr> {
        if let Some(addr) = self.cached(domain, true) {
            return Some(addr);
        }

        match lookup(domain).await {
            Some(addr) => {
                self.insert(domain, addr, Utc::now());
                Some(addr)
            }
            None => {
                let stale = self.cached(domain, false);
                if let Some(addr) = stale {
                    warn!(domain = %domain, addr = %addr, "DNS lookup failed, using stale cache entry");
                }
                stale
            }
        }
    }

    /// Resolve the configured trusted domain
    pub async fn resolve_trusted(&self) -> Option<IpAddr> {
        self.resolve(&self.domain).await
    }

    /// True iff the domain resolves and equals the client address exactly.
    /// No subnet matching.
    pub async fn matches(&self, client: IpAddr, domain: &str) -> bool {
        match self.resolve(domain).await {
            Some(addr) => addr == client,
            None => false,
        }
    }

    fn cached(&self, domain: &str, require_fresh: bool) -> Option<IpAddr> {
        let cache = self.cache.read().expect("dns cache poisoned");
        let entry = cache.get(domain)?;
        if require_fresh && Utc::now() - entry.resolved_at > self.ttl {
            return None;
        }
        Some(entry.addr)
    }

    fn insert(&self, domain: &str, addr: IpAddr, resolved_at: DateTime<Utc>) {
        let mut cache = self.cache.write().expect("dns cache poisoned");
        cache.insert(
            domain.to_string(),
            CachedLookup { addr, resolved_at },
        );
    }
}

async fn lookup(domain: &str) -> Option<IpAddr> {
    match tokio::net::lookup_host((domain, 0)).await {
        Ok(mut addrs) => addrs.next().map(|a| a.ip()),
        Err(e) => {
            debug!(domain = %domain, error = %e, "DNS lookup failed");
            None
        }
    }
}

#[async_trait]
impl BypassGate for DnsBypassResolver {
    async fn origin_matches(&self, origin: IpAddr) -> bool {
        self.matches(origin, &self.domain).await
    }
}

/// Extract the request's real origin address.
///
/// Proxy headers are a best-effort hint, not a security boundary: the first
/// public address found in them wins, and private or loopback addresses in
/// headers are discarded in favor of the transport-level peer address.
pub fn client_ip(headers: &axum::http::HeaderMap, peer: SocketAddr) -> IpAddr {
    for name in ["x-forwarded-for", "x-real-ip"] {
        let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) else {
            continue;
        };
        for part in value.split(',') {
            if let Ok(ip) = part.trim().parse::<IpAddr>() {
                if !is_unreliable(ip) {
                    return ip;
                }
            }
        }
    }
    peer.ip()
}

/// Addresses that carry no signal when seen in forwarded headers
fn is_unreliable(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}
