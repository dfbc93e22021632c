//! Staleness-driven record table rebuilds.
//!
//! There is no background timer: the coordinator drains query-name
//! observations from the listeners and rebuilds the table once the last
//! successful rebuild is older than the configured interval. A rebuild
//! fetches every configured network from the membership source, stages a
//! complete replacement table, and publishes it in one swap. If any
//! fetch fails the staged table is discarded and the previous one keeps
//! serving until the next staleness trigger.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::DnsConfig;
use crate::controller::MembershipSource;
use crate::error::DnsError;
use crate::metrics::{self, RefreshOutcome, Timer};
use crate::state::{HostRecords, RecordStore, RecordTable};

/// One configured network: its domain label, controller network ID, and
/// the zone (`<label>.<suffix>.`) its members are published under.
#[derive(Debug, Clone)]
struct NetworkBinding {
    label: String,
    network_id: String,
    zone: String,
}

/// Decides when to resynchronize the record store and performs the
/// resynchronization.
pub struct RefreshCoordinator<S> {
    source: S,
    store: Arc<RecordStore>,
    networks: Vec<NetworkBinding>,
    interval: Duration,
    last_rebuild: Option<Instant>,
}

impl<S: MembershipSource> RefreshCoordinator<S> {
    /// Create a coordinator for the configured networks. The store
    /// starts stale: the first observed query (or an explicit startup
    /// [`rebuild`](Self::rebuild)) triggers the first synchronization.
    pub fn new(source: S, store: Arc<RecordStore>, config: &DnsConfig) -> Self {
        let suffix = config.suffix.trim_end_matches('.').to_lowercase();
        let mut networks: Vec<NetworkBinding> = config
            .networks
            .iter()
            .map(|(label, network_id)| {
                let label = label.to_lowercase();
                let zone = format!("{label}.{suffix}.");
                NetworkBinding {
                    label,
                    network_id: network_id.clone(),
                    zone,
                }
            })
            .collect();
        // Deterministic fetch and log order regardless of map iteration.
        networks.sort_by(|a, b| a.label.cmp(&b.label));

        Self {
            source,
            store,
            networks,
            interval: Duration::from_secs(config.refresh_minutes * 60),
            last_rebuild: None,
        }
    }

    /// Whether the table is due for a rebuild. True until the first
    /// rebuild succeeds.
    pub fn is_stale(&self) -> bool {
        match self.last_rebuild {
            Some(at) => at.elapsed() > self.interval,
            None => true,
        }
    }

    /// Rebuild if stale, leaving the table alone otherwise.
    pub async fn maybe_rebuild(&mut self) {
        if !self.is_stale() {
            return;
        }
        info!("record table is stale, rebuilding");
        if let Err(error) = self.rebuild().await {
            warn!(%error, "rebuild failed, keeping previous record table");
        }
    }

    /// Fetch all configured networks and publish a fresh table.
    ///
    /// On success the staleness clock resets and the number of staged
    /// hostnames is returned. On error nothing is published.
    pub async fn rebuild(&mut self) -> Result<usize, DnsError> {
        let timer = Timer::start();
        match self.stage().await {
            Ok(staged) => {
                let hosts = staged.len();
                self.store.replace(staged);
                self.last_rebuild = Some(Instant::now());
                metrics::record_refresh(RefreshOutcome::Success, timer.elapsed());
                info!(hosts, "record table rebuilt");
                Ok(hosts)
            }
            Err(error) => {
                metrics::record_refresh(RefreshOutcome::Failure, timer.elapsed());
                Err(error)
            }
        }
    }

    /// Build the replacement table. Any controller failure aborts the
    /// whole attempt: committing a partial stage would evict every host
    /// of the networks that did not answer.
    async fn stage(&self) -> Result<RecordTable, DnsError> {
        let mut staged = RecordTable::new();

        for binding in &self.networks {
            let network = self.source.network_info(&binding.network_id).await?;
            let members = self.source.members(&binding.network_id).await?;
            info!(
                network = %network.config.name,
                domain = %binding.label,
                members = members.len(),
                "fetched member list"
            );

            for member in members.iter().filter(|m| m.online) {
                let hostname = format!("{}.{}", member.name.to_lowercase(), binding.zone);
                let mut records = HostRecords::default();

                if network.config.v6_assign_mode.six_plane {
                    match member.six_plane() {
                        Some(ip) => records.ipv6.push(ip),
                        None => warn!(node = %member.node_id, "cannot derive 6plane address"),
                    }
                }
                if network.config.v6_assign_mode.rfc4193 {
                    match member.rfc4193() {
                        Some(ip) => records.ipv6.push(ip),
                        None => warn!(node = %member.node_id, "cannot derive RFC 4193 address"),
                    }
                }

                for assignment in &member.config.ip_assignments {
                    match assignment.parse::<IpAddr>() {
                        Ok(IpAddr::V4(ip)) => records.ipv4.push(ip),
                        Ok(IpAddr::V6(_)) | Err(_) => {
                            trace!(%assignment, "skipping non-IPv4 assignment")
                        }
                    }
                }

                debug!(
                    host = %hostname,
                    ipv4 = ?records.ipv4,
                    ipv6 = ?records.ipv6,
                    "staging record"
                );
                staged.insert(hostname, records);
            }
        }

        Ok(staged)
    }

    /// Drain observations until shutdown, rebuilding whenever one
    /// arrives while the table is stale.
    pub async fn run(
        mut self,
        mut observations: mpsc::Receiver<String>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!("refresh coordinator shutting down");
                    return;
                }

                observed = observations.recv() => {
                    let Some(name) = observed else {
                        debug!("observation channel closed");
                        return;
                    };
                    trace!(name = %name, "observed query");
                    self.maybe_rebuild().await;
                }
            }
        }
    }
}
