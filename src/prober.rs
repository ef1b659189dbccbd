use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::TokioResolver;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;
use surge_ping::{Client as PingClient, Config as PingConfig, PingIdentifier, PingSequence, SurgeError, ICMP};
use tokio::net::TcpStream;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::config::ResolverKind;
use crate::error::ProberError;
use crate::models::Outcome;

const PAYLOAD_SIZE: usize = 56;

/// One reachability check against one target.
///
/// Implementations must return within `timeout` (plus scheduling slack) and
/// report ordinary network failures as [`Outcome::Timeout`] or
/// [`Outcome::Error`] rather than panicking.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, address: &str, timeout: Duration) -> Outcome;
}

#[derive(Debug, Clone)]
pub struct ProberSettings {
    pub resolver: ResolverKind,
    pub tcp_fallback: bool,
    pub fallback_ports: Vec<u16>,
}

impl Default for ProberSettings {
    fn default() -> Self {
        Self {
            resolver: ResolverKind::Cloudflare,
            tcp_fallback: false,
            fallback_ports: crate::config::default_fallback_ports(),
        }
    }
}

/// ICMP echo prober with optional TCP verification for hosts that filter ICMP.
pub struct IcmpProber {
    v4: PingClient,
    v6: Option<PingClient>,
    resolver: TokioResolver,
    settings: ProberSettings,
    sequence: AtomicU16,
}

impl IcmpProber {
    pub fn new(settings: ProberSettings) -> Result<Self, ProberError> {
        let v4 = PingClient::new(&PingConfig::default()).map_err(ProberError::Socket)?;

        let v6 = match PingClient::new(&PingConfig::builder().kind(ICMP::V6).build()) {
            Ok(client) => Some(client),
            Err(e) => {
                warn!("IPv6 ICMP socket unavailable, IPv6 targets will report errors: {}", e);
                None
            }
        };

        let resolver = TokioResolver::builder_with_config(
            settings.resolver.resolver_config(),
            TokioConnectionProvider::default(),
        )
        .build();

        info!("DNS resolver configured: {}", settings.resolver);
        if settings.tcp_fallback {
            info!("TCP fallback enabled on ports {:?}", settings.fallback_ports);
        }

        Ok(Self { v4, v6, resolver, settings, sequence: AtomicU16::new(0) })
    }

    async fn resolve(&self, address: &str) -> Result<IpAddr, String> {
        if let Ok(ip) = address.parse::<IpAddr>() {
            return Ok(ip);
        }
        match self.resolver.lookup_ip(address).await {
            Ok(lookup) => lookup.iter().next().ok_or_else(|| format!("No IP address found for {}", address)),
            Err(e) => Err(format!("Domain resolution failed for {}: {}", address, e)),
        }
    }

    async fn echo(&self, ip: IpAddr, timeout: Duration) -> Outcome {
        let client = match (ip, &self.v6) {
            (IpAddr::V4(_), _) => &self.v4,
            (IpAddr::V6(_), Some(v6)) => v6,
            (IpAddr::V6(_), None) => return Outcome::error("IPv6 ICMP socket unavailable"),
        };

        let payload = [0u8; PAYLOAD_SIZE];
        let mut pinger = client.pinger(ip, PingIdentifier(rand::random())).await;
        pinger.timeout(timeout);

        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        match pinger.ping(PingSequence(seq), &payload).await {
            Ok((_, rtt)) => {
                let ms = rtt.as_secs_f64() * 1000.0;
                Outcome::success(
                    format!("Reply from {}: bytes={} time={:.1}ms", ip, PAYLOAD_SIZE, ms),
                    Some(ms),
                )
            }
            Err(SurgeError::Timeout { .. }) => Outcome::Timeout,
            Err(e) => Outcome::error(format!("Ping to {} failed: {}", ip, e)),
        }
    }

    /// Try every fallback port concurrently, first open one wins.
    async fn tcp_fallback(&self, ip: IpAddr, deadline: Instant) -> Option<Outcome> {
        let mut attempts = FuturesUnordered::new();
        for &port in &self.settings.fallback_ports {
            attempts.push(async move {
                let start = Instant::now();
                match timeout_at(deadline, TcpStream::connect(SocketAddr::new(ip, port))).await {
                    Ok(Ok(_)) => Some((port, start.elapsed().as_secs_f64() * 1000.0)),
                    _ => None,
                }
            });
        }

        while let Some(result) = attempts.next().await {
            if let Some((port, ms)) = result {
                debug!("{} answered on TCP {} after ICMP failure", ip, port);
                return Some(Outcome::success(
                    format!("ICMP filtered (verified via {} [{:.1}ms])", service_name(port), ms),
                    Some(ms),
                ));
            }
        }
        None
    }
}

#[async_trait]
impl Prober for IcmpProber {
    async fn probe(&self, address: &str, timeout: Duration) -> Outcome {
        let deadline = Instant::now() + timeout;

        let ip = match timeout_at(deadline, self.resolve(address)).await {
            Ok(Ok(ip)) => ip,
            Ok(Err(e)) => return Outcome::error(e),
            Err(_) => return Outcome::error(format!("Domain resolution for {} timed out", address)),
        };

        let fallback = self.settings.tcp_fallback && !self.settings.fallback_ports.is_empty();
        let remaining = deadline.saturating_duration_since(Instant::now());
        // Leave half of the budget for the TCP fallback.
        let echo_budget = if fallback { remaining / 2 } else { remaining };

        let outcome = match timeout_at(Instant::now() + echo_budget, self.echo(ip, echo_budget)).await {
            Ok(outcome) => outcome,
            Err(_) => Outcome::Timeout,
        };

        if outcome.is_success() || !fallback {
            return outcome;
        }
        self.tcp_fallback(ip, deadline).await.unwrap_or(outcome)
    }
}

fn service_name(port: u16) -> String {
    let name = match port {
        22 => "SSH",
        80 => "HTTP",
        443 => "HTTPS",
        3389 => "RDP",
        3306 => "MySQL",
        5900 => "VNC",
        8080 => "Web-Alt",
        _ => return format!("TCP:{}", port),
    };
    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_names() {
        assert_eq!(service_name(22), "SSH");
        assert_eq!(service_name(3389), "RDP");
        assert_eq!(service_name(9100), "TCP:9100");
    }

    #[tokio::test]
    #[ignore = "needs permission to open ICMP sockets"]
    async fn loopback_replies() {
        let prober = IcmpProber::new(ProberSettings::default()).unwrap();
        let outcome = prober.probe("127.0.0.1", Duration::from_secs(2)).await;
        assert!(outcome.is_success(), "{outcome:?}");
        assert!(outcome.detail().starts_with("Reply from 127.0.0.1"));
    }

    #[tokio::test]
    #[ignore = "needs permission to open ICMP sockets"]
    async fn unresolvable_host_is_an_error() {
        let prober = IcmpProber::new(ProberSettings::default()).unwrap();
        let outcome = prober.probe("does-not-exist.invalid", Duration::from_secs(3)).await;
        assert!(matches!(outcome, Outcome::Error { .. }), "{outcome:?}");
    }
}
