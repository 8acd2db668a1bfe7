//! Reachability probes.
//!
//! A probe answers one question: did the target respond? Every failure mode
//! (resolution error, socket error, timeout) is folded into `false`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use hickory_resolver::config::ResolverConfig;
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::TokioResolver;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use surge_ping::{Client as PingClient, Config as PingConfig, PingIdentifier, PingSequence, ICMP};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::config::{CheckType, ECHO_RETRY_GAP};

#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, address: &str) -> bool;
}

/// ICMP echo, optionally confirmed over TCP when echo is filtered.
pub struct IcmpProbe {
    v4: PingClient,
    v6: Option<PingClient>,
    resolver: Arc<TokioResolver>,
    count: u32,
    timeout: Duration,
    tcp_fallback: Vec<u16>,
}

impl IcmpProbe {
    async fn echo(&self, ip: IpAddr) -> bool {
        let client = match (ip, &self.v6) {
            (IpAddr::V4(_), _) => &self.v4,
            (IpAddr::V6(_), Some(v6)) => v6,
            (IpAddr::V6(_), None) => {
                debug!(%ip, "No ICMPv6 socket available");
                return false;
            }
        };

        let payload = [0u8; 56];
        let mut pinger = client.pinger(ip, PingIdentifier(rand::random())).await;
        pinger.timeout(self.timeout);

        for i in 0..self.count {
            match pinger.ping(PingSequence(i as u16), &payload).await {
                Ok((_, latency)) => {
                    debug!(%ip, latency_ms = latency.as_secs_f64() * 1000.0, "ICMP response");
                    return true;
                }
                Err(e) => {
                    debug!(%ip, error = %e, "ICMP request failed");
                    if i + 1 < self.count {
                        tokio::time::sleep(ECHO_RETRY_GAP).await;
                    }
                }
            }
        }
        false
    }

    async fn any_port_open(&self, address: &str) -> bool {
        let mut attempts: FuturesUnordered<_> = self
            .tcp_fallback
            .iter()
            .map(|&port| tcp_connect(address, port, self.timeout))
            .collect();

        while let Some(open) = attempts.next().await {
            if open {
                return true;
            }
        }
        false
    }
}

#[async_trait]
impl Probe for IcmpProbe {
    async fn probe(&self, address: &str) -> bool {
        let ip = match resolve(&self.resolver, address).await {
            Ok(ip) => ip,
            Err(e) => {
                debug!(address, error = %e, "Resolution failed");
                return false;
            }
        };

        if self.echo(ip).await {
            return true;
        }
        if !self.tcp_fallback.is_empty() && self.any_port_open(&ip.to_string()).await {
            debug!(address, "ICMP filtered, reachable over TCP");
            return true;
        }
        false
    }
}

/// TCP connect to a fixed port.
pub struct TcpProbe {
    port: u16,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self { port, timeout }
    }
}

#[async_trait]
impl Probe for TcpProbe {
    async fn probe(&self, address: &str) -> bool {
        tcp_connect(address, self.port, self.timeout).await
    }
}

async fn tcp_connect(address: &str, port: u16, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, TcpStream::connect((address, port))).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            debug!(address, port, error = %e, "TCP connect failed");
            false
        }
        Err(_) => false,
    }
}

async fn resolve(resolver: &TokioResolver, address: &str) -> Result<IpAddr> {
    if let Ok(ip) = address.parse::<IpAddr>() {
        return Ok(ip);
    }
    let lookup = resolver
        .lookup_ip(address)
        .await
        .with_context(|| format!("DNS resolution failed for {address}"))?;
    let mut ips: Vec<IpAddr> = lookup.iter().collect();
    ips.sort_by_key(|ip| !ip.is_ipv4());
    ips.into_iter()
        .next()
        .with_context(|| format!("No IP address found for {address}"))
}

/// Builds probes for configured checks, sharing sockets and the resolver.
pub struct ProbeFactory {
    resolver: Arc<TokioResolver>,
    ping: Option<(PingClient, Option<PingClient>)>,
}

impl ProbeFactory {
    pub fn new() -> Self {
        let resolver = TokioResolver::builder_with_config(
            ResolverConfig::cloudflare(),
            TokioConnectionProvider::default(),
        )
        .build();
        info!("DNS resolver configured: Cloudflare 1.1.1.1 / 1.0.0.1");

        Self { resolver: Arc::new(resolver), ping: None }
    }

    pub fn build(&mut self, check: &CheckType) -> Result<Arc<dyn Probe>> {
        match check {
            CheckType::Ping { count, timeout_ms, tcp_fallback } => {
                let (v4, v6) = self.ping_clients()?;
                Ok(Arc::new(IcmpProbe {
                    v4,
                    v6,
                    resolver: Arc::clone(&self.resolver),
                    count: *count,
                    timeout: Duration::from_millis(*timeout_ms),
                    tcp_fallback: tcp_fallback.clone(),
                }))
            }
            CheckType::TcpPort { port, timeout_ms } => {
                Ok(Arc::new(TcpProbe::new(*port, Duration::from_millis(*timeout_ms))))
            }
        }
    }

    fn ping_clients(&mut self) -> Result<(PingClient, Option<PingClient>)> {
        if let Some(clients) = &self.ping {
            return Ok(clients.clone());
        }
        let v4 = PingClient::new(&PingConfig::default()).context("Failed to create Ping Client")?;
        let v6 = match PingClient::new(&PingConfig::builder().kind(ICMP::V6).build()) {
            Ok(client) => Some(client),
            Err(e) => {
                warn!(error = %e, "ICMPv6 unavailable, IPv6 targets will report unreachable");
                None
            }
        };
        self.ping = Some((v4.clone(), v6.clone()));
        Ok((v4, v6))
    }
}

impl Default for ProbeFactory {
    fn default() -> Self {
        Self::new()
    }
}
