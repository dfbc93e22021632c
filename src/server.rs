//! DNS server setup and lifecycle management.

use hickory_proto::op::Message;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::DnsConfig;
use crate::controller::MembershipSource;
use crate::error::DnsError;
use crate::handler::QueryHandler;
use crate::refresh::RefreshCoordinator;
use crate::state::RecordStore;
use crate::zone::ZoneTemplates;

/// Largest datagram the listeners will accept.
const MAX_DATAGRAM: usize = 4096;

/// Capacity of the query-observation channel. Sends beyond this are
/// dropped, never blocked on.
const OBSERVATION_QUEUE: usize = 64;

/// Authoritative DNS server for the configured mesh networks.
pub struct DnsServer {
    config: DnsConfig,
    store: Arc<RecordStore>,
}

impl DnsServer {
    /// Create a server from configuration. The served suffix list is
    /// fixed here; records arrive with the first refresh.
    pub fn new(config: DnsConfig) -> Self {
        let store = Arc::new(RecordStore::new(config.served_suffixes()));
        Self { config, store }
    }

    /// Shared record store handle.
    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    /// Run the server until the cancellation token fires.
    ///
    /// Resolves the server's own name (fatal if it does not resolve),
    /// attempts an initial table rebuild, binds one UDP listener per
    /// usable address, and serves. Individual bind failures degrade with
    /// a warning; only a fully unbound listener set is fatal.
    pub async fn run<S>(self, source: S, cancel: CancellationToken) -> Result<(), DnsError>
    where
        S: MembershipSource + Send + Sync + 'static,
    {
        info!(
            suffixes = ?self.store.suffixes(),
            server_fqdn = %self.config.server_fqdn,
            port = self.config.port,
            "starting mesh-dns server"
        );

        let server_addr = resolve_server_ipv4(&self.config.server_fqdn).await?;
        let serial = startup_serial();
        let templates = Arc::new(ZoneTemplates::new(
            &self.config.server_fqdn,
            server_addr,
            serial,
        )?);
        debug!(%server_addr, serial, "zone templates ready");

        let mut coordinator = RefreshCoordinator::new(source, self.store.clone(), &self.config);
        // First synchronization before serving; failure is recoverable
        // and leaves an empty table until the next staleness trigger.
        if let Err(error) = coordinator.rebuild().await {
            warn!(%error, "initial rebuild failed, starting with an empty record table");
        }

        let (observations, observation_rx) = mpsc::channel(OBSERVATION_QUEUE);
        let coordinator_handle = tokio::spawn({
            let cancel = cancel.clone();
            async move { coordinator.run(observation_rx, cancel).await }
        });

        let handler = QueryHandler::new(
            self.store.clone(),
            templates,
            self.config.ttl,
            observations,
        );

        let mut listeners = JoinSet::new();
        for addr in listen_addrs(self.config.interface.as_deref())? {
            let bind_addr = SocketAddr::new(addr, self.config.port);
            match UdpSocket::bind(bind_addr).await {
                Ok(socket) => {
                    info!(addr = %bind_addr, "DNS UDP listening");
                    listeners.spawn(serve(socket, handler.clone(), cancel.clone()));
                }
                Err(error) => {
                    warn!(addr = %bind_addr, %error, "failed to bind listener, continuing without it");
                }
            }
        }

        if listeners.is_empty() {
            cancel.cancel();
            let _ = coordinator_handle.await;
            return Err(DnsError::NoListeners);
        }

        info!(listeners = listeners.len(), "DNS server ready to serve queries");

        // Listeners only return on cancellation.
        while listeners.join_next().await.is_some() {}
        let _ = coordinator_handle.await;

        info!("DNS server stopped");
        Ok(())
    }
}

/// Serve one bound socket until shutdown: receive, parse, answer, send.
async fn serve(socket: UdpSocket, handler: QueryHandler, cancel: CancellationToken) {
    let mut buf = [0u8; MAX_DATAGRAM];
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("listener shutting down");
                return;
            }

            received = socket.recv_from(&mut buf) => {
                let (len, src) = match received {
                    Ok(pair) => pair,
                    Err(error) => {
                        warn!(%error, "recv_from failed");
                        continue;
                    }
                };

                let request = match Message::from_vec(&buf[..len]) {
                    Ok(message) => message,
                    Err(error) => {
                        debug!(%error, %src, "dropping malformed datagram");
                        continue;
                    }
                };

                let reply = handler.handle(&request);
                match reply.to_vec() {
                    Ok(bytes) => {
                        if let Err(error) = socket.send_to(&bytes, src).await {
                            warn!(%error, dst = %src, "send_to failed");
                        }
                    }
                    Err(error) => warn!(%error, "failed to encode reply"),
                }
            }
        }
    }
}

/// SOA serial for this process: seconds since the epoch at startup.
fn startup_serial() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as u32)
        .unwrap_or(0)
}

/// Resolve the server's own name to the IPv4 address published in
/// SOA/NS additional sections. Fatal when nothing resolves: correct
/// SOA/NS responses cannot be built without it.
async fn resolve_server_ipv4(fqdn: &str) -> Result<Ipv4Addr, DnsError> {
    let host = fqdn.trim_end_matches('.');
    let addrs = tokio::net::lookup_host((host, 0u16))
        .await
        .map_err(|e| DnsError::Resolve {
            name: fqdn.to_string(),
            reason: e.to_string(),
        })?;

    addrs
        .filter_map(|addr| match addr.ip() {
            IpAddr::V4(ip) => Some(ip),
            IpAddr::V6(_) => None,
        })
        .next()
        .ok_or_else(|| DnsError::Resolve {
            name: fqdn.to_string(),
            reason: "no IPv4 address".to_string(),
        })
}

/// Addresses to bind: every non-link-local address of the configured
/// interface, or the IPv4 wildcard when no interface is configured.
fn listen_addrs(interface: Option<&str>) -> Result<Vec<IpAddr>, DnsError> {
    match interface {
        Some(name) => interface_addrs(name),
        None => Ok(vec![IpAddr::V4(Ipv4Addr::UNSPECIFIED)]),
    }
}

#[cfg(unix)]
fn interface_addrs(name: &str) -> Result<Vec<IpAddr>, DnsError> {
    let addrs = nix::ifaddrs::getifaddrs()
        .map_err(|errno| std::io::Error::from_raw_os_error(errno as i32))?;

    let mut out = Vec::new();
    for ifaddr in addrs {
        if ifaddr.interface_name != name {
            continue;
        }
        let Some(address) = ifaddr.address else {
            continue;
        };

        if let Some(sin) = address.as_sockaddr_in() {
            let ip = sin.ip();
            if !ip.is_link_local() {
                debug!(interface = name, addr = %ip, "found listener address");
                out.push(IpAddr::V4(ip));
            }
        } else if let Some(sin6) = address.as_sockaddr_in6() {
            let ip = sin6.ip();
            if !is_ipv6_link_local(&ip) {
                debug!(interface = name, addr = %ip, "found listener address");
                out.push(IpAddr::V6(ip));
            }
        }
    }

    if out.is_empty() {
        return Err(DnsError::Config(format!(
            "interface {name} has no usable addresses"
        )));
    }
    Ok(out)
}

#[cfg(not(unix))]
fn interface_addrs(name: &str) -> Result<Vec<IpAddr>, DnsError> {
    Err(DnsError::Config(format!(
        "interface enumeration is not supported on this platform (interface {name})"
    )))
}

#[cfg(unix)]
fn is_ipv6_link_local(ip: &std::net::Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xffc0) == 0xfe80
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn test_config() -> DnsConfig {
        DnsConfig {
            interface: None,
            port: 5353,
            suffix: "mesh.example.com".to_string(),
            networks: HashMap::from([(
                "office".to_string(),
                "8056c2e21c000001".to_string(),
            )]),
            server_fqdn: "ns1.example.com".to_string(),
            refresh_minutes: 30,
            ttl: 3600,
        }
    }

    #[test]
    fn test_server_creation_builds_suffixes() {
        let server = DnsServer::new(test_config());
        assert_eq!(server.store().suffixes(), ["office.mesh.example.com."]);
        assert_eq!(server.store().host_count(), 0);
    }

    #[test]
    fn test_wildcard_listen_addr_without_interface() {
        let addrs = listen_addrs(None).unwrap();
        assert_eq!(addrs, vec![IpAddr::V4(Ipv4Addr::UNSPECIFIED)]);
    }

    #[cfg(unix)]
    #[test]
    fn test_unknown_interface_is_config_error() {
        let result = interface_addrs("does-not-exist0");
        assert!(matches!(result, Err(DnsError::Config(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_ipv6_link_local_detection() {
        assert!(is_ipv6_link_local(&"fe80::1".parse().unwrap()));
        assert!(!is_ipv6_link_local(&"fd00::1".parse().unwrap()));
        assert!(!is_ipv6_link_local(&"2001:db8::1".parse().unwrap()));
    }
}
