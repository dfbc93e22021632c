//! Configuration types for mesh-dns.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;

use crate::error::DnsError;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// DNS server configuration.
    pub dns: DnsConfig,

    /// Network controller API configuration.
    pub controller: ControllerConfig,

    /// Telemetry configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl Config {
    /// Check the configuration for the pieces the server cannot start
    /// without. Called before anything binds or resolves.
    pub fn validate(&self) -> Result<(), DnsError> {
        if self.controller.api_token.is_empty() {
            return Err(DnsError::Config("no controller API token provided".into()));
        }
        if self.controller.base_url.is_empty() {
            return Err(DnsError::Config("no controller base URL provided".into()));
        }
        if self.dns.networks.is_empty() {
            return Err(DnsError::Config(
                "no domain / network ID pairs provided".into(),
            ));
        }
        if self.dns.suffix.is_empty() {
            return Err(DnsError::Config("no DNS suffix provided".into()));
        }
        if self.dns.server_fqdn.is_empty() {
            return Err(DnsError::Config("no server name provided".into()));
        }
        Ok(())
    }
}

/// DNS server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsConfig {
    /// Interface whose addresses the server listens on. Unset means the
    /// IPv4 wildcard address.
    #[serde(default)]
    pub interface: Option<String>,

    /// UDP port to serve on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// DNS suffix under which all network domains live
    /// (e.g. "mesh.example.com").
    pub suffix: String,

    /// Domain label -> network ID. Each pair becomes one served zone,
    /// `<label>.<suffix>.`.
    pub networks: HashMap<String, String>,

    /// This server's own fully qualified name, used for SOA/NS records
    /// and resolved once at startup for the additional-section A record.
    pub server_fqdn: String,

    /// Minutes after which the record table counts as stale.
    #[serde(default = "default_refresh_minutes")]
    pub refresh_minutes: u64,

    /// TTL for synthesized answer records, in seconds.
    #[serde(default = "default_ttl")]
    pub ttl: u32,
}

impl DnsConfig {
    /// Build the served suffix list: one `<label>.<suffix>.` zone per
    /// configured network, lowercased and fully qualified.
    pub fn served_suffixes(&self) -> Vec<String> {
        let suffix = self.suffix.trim_end_matches('.').to_lowercase();
        self.networks
            .keys()
            .map(|label| format!("{}.{}.", label.to_lowercase(), suffix))
            .collect()
    }
}

/// Network controller API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Controller API base URL (e.g. "https://my.controller.example").
    pub base_url: String,

    /// API token for the controller.
    pub api_token: String,

    /// Per-request timeout for controller fetches, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level filter (e.g. "info", "debug", "mesh_dns=debug,warn").
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Prometheus metrics exporter address.
    #[serde(default)]
    pub prometheus_addr: Option<SocketAddr>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            prometheus_addr: None,
        }
    }
}

fn default_port() -> u16 {
    53
}

fn default_refresh_minutes() -> u64 {
    30
}

fn default_ttl() -> u32 {
    3600
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}
