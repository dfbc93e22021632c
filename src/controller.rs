//! Network controller API client.
//!
//! The controller is the membership source: it knows, per network, which
//! members exist, whether they are online, and how their addresses are
//! assigned. The server only consumes two read endpoints, exposed here
//! behind the [`MembershipSource`] trait so rebuild logic can be tested
//! against a canned source.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::net::Ipv6Addr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::ControllerConfig;
use crate::error::DnsError;

/// Read access to network membership data.
#[async_trait]
pub trait MembershipSource {
    /// Fetch a network's name and address-assignment flags.
    async fn network_info(&self, network_id: &str) -> Result<NetworkInfo, DnsError>;

    /// Fetch the member list of a network.
    async fn members(&self, network_id: &str) -> Result<Vec<Member>, DnsError>;
}

/// Network metadata, as returned by the controller.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkInfo {
    /// Network ID (16 hex digits).
    pub id: String,
    /// Nested network configuration.
    pub config: NetworkConfig,
}

/// The `config` object of a network.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    /// Human-readable network name.
    pub name: String,
    /// IPv6 auto-assignment modes enabled on the network.
    #[serde(rename = "v6AssignMode", default)]
    pub v6_assign_mode: V6AssignMode,
}

/// IPv6 auto-assignment mode flags.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct V6AssignMode {
    /// 6plane addressing enabled.
    #[serde(rename = "6plane", default)]
    pub six_plane: bool,
    /// RFC 4193 addressing enabled.
    #[serde(default)]
    pub rfc4193: bool,
}

/// One network member.
#[derive(Debug, Clone, Deserialize)]
pub struct Member {
    /// Member node ID (10 hex digits).
    #[serde(rename = "nodeId")]
    pub node_id: String,
    /// ID of the network this member record belongs to.
    #[serde(rename = "networkId")]
    pub network_id: String,
    /// Display name, used as the DNS label.
    #[serde(default)]
    pub name: String,
    /// Whether the member is currently online.
    #[serde(default)]
    pub online: bool,
    /// Nested member configuration.
    #[serde(default)]
    pub config: MemberConfig,
}

/// The `config` object of a member.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemberConfig {
    /// Explicitly assigned addresses.
    #[serde(rename = "ipAssignments", default)]
    pub ip_assignments: Vec<String>,
}

impl Member {
    /// The member's 6plane address: `fc` + 32-bit xor-folded network ID
    /// + 40-bit node ID + `::1`. `None` if either ID is not valid hex.
    pub fn six_plane(&self) -> Option<Ipv6Addr> {
        let network = u64::from_str_radix(&self.network_id, 16).ok()?;
        let node = u64::from_str_radix(&self.node_id, 16).ok()?;

        let folded = ((network >> 32) as u32) ^ (network as u32);

        let mut octets = [0u8; 16];
        octets[0] = 0xfc;
        octets[1..5].copy_from_slice(&folded.to_be_bytes());
        octets[5..10].copy_from_slice(&node.to_be_bytes()[3..8]);
        octets[15] = 0x01;
        Some(Ipv6Addr::from(octets))
    }

    /// The member's RFC 4193 address: `fd` + 64-bit network ID + `99:93`
    /// + 40-bit node ID. `None` if either ID is not valid hex.
    pub fn rfc4193(&self) -> Option<Ipv6Addr> {
        let network = u64::from_str_radix(&self.network_id, 16).ok()?;
        let node = u64::from_str_radix(&self.node_id, 16).ok()?;

        let mut octets = [0u8; 16];
        octets[0] = 0xfd;
        octets[1..9].copy_from_slice(&network.to_be_bytes());
        octets[9] = 0x99;
        octets[10] = 0x93;
        octets[11..16].copy_from_slice(&node.to_be_bytes()[3..8]);
        Some(Ipv6Addr::from(octets))
    }
}

/// HTTP client for the controller's REST API.
#[derive(Clone)]
pub struct ControllerClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: reqwest::Client,
    base_url: String,
    api_token: String,
}

impl ControllerClient {
    /// Build a client from configuration. Every request carries the API
    /// token and is bounded by the configured timeout.
    pub fn new(config: &ControllerConfig) -> Result<Self, DnsError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                base_url: config.base_url.trim_end_matches('/').to_string(),
                api_token: config.api_token.clone(),
            }),
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, DnsError> {
        let url = format!("{}{}", self.inner.base_url, path);
        debug!(url = %url, "GET request");

        let response = self
            .inner
            .http
            .get(&url)
            .bearer_auth(&self.inner.api_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DnsError::Controller {
                status: status.as_u16(),
                url,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl MembershipSource for ControllerClient {
    async fn network_info(&self, network_id: &str) -> Result<NetworkInfo, DnsError> {
        self.get(&format!("/api/network/{network_id}")).await
    }

    async fn members(&self, network_id: &str) -> Result<Vec<Member>, DnsError> {
        self.get(&format!("/api/network/{network_id}/member")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(network_id: &str, node_id: &str) -> Member {
        Member {
            node_id: node_id.to_string(),
            network_id: network_id.to_string(),
            name: "laptop".to_string(),
            online: true,
            config: MemberConfig::default(),
        }
    }

    #[test]
    fn test_six_plane_derivation() {
        let m = member("8056c2e21c000001", "1d2c3e4f5a");
        // fc + (8056c2e2 ^ 1c000001) + node + ::1
        assert_eq!(
            m.six_plane().unwrap(),
            "fc9c:56c2:e31d:2c3e:4f5a::1".parse::<Ipv6Addr>().unwrap()
        );
    }

    #[test]
    fn test_rfc4193_derivation() {
        let m = member("8056c2e21c000001", "1d2c3e4f5a");
        assert_eq!(
            m.rfc4193().unwrap(),
            "fd80:56c2:e21c:0:199:931d:2c3e:4f5a"
                .parse::<Ipv6Addr>()
                .unwrap()
        );
    }

    #[test]
    fn test_bad_hex_ids_yield_no_address() {
        let m = member("not-hex", "1d2c3e4f5a");
        assert!(m.six_plane().is_none());
        assert!(m.rfc4193().is_none());
    }

    #[test]
    fn test_network_info_parses_controller_json() {
        let json = r#"{
            "id": "8056c2e21c000001",
            "config": {
                "name": "office",
                "v6AssignMode": { "6plane": true, "rfc4193": false, "zt": false }
            }
        }"#;

        let info: NetworkInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.config.name, "office");
        assert!(info.config.v6_assign_mode.six_plane);
        assert!(!info.config.v6_assign_mode.rfc4193);
    }

    #[test]
    fn test_member_parses_controller_json() {
        let json = r#"{
            "nodeId": "1d2c3e4f5a",
            "networkId": "8056c2e21c000001",
            "name": "laptop",
            "online": true,
            "config": { "ipAssignments": ["10.147.17.5"] }
        }"#;

        let m: Member = serde_json::from_str(json).unwrap();
        assert_eq!(m.node_id, "1d2c3e4f5a");
        assert!(m.online);
        assert_eq!(m.config.ip_assignments, vec!["10.147.17.5"]);
    }

    #[test]
    fn test_member_online_defaults_false() {
        let json = r#"{ "nodeId": "1d2c3e4f5a", "networkId": "8056c2e21c000001" }"#;
        let m: Member = serde_json::from_str(json).unwrap();
        assert!(!m.online);
        assert!(m.name.is_empty());
        assert!(m.config.ip_assignments.is_empty());
    }
}
