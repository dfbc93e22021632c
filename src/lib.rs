//! mesh-dns - An authoritative DNS server for mesh VPN network members.
//!
//! This crate provides a DNS server that serves hostnames for the members
//! of one or more mesh VPN networks. The record table lives in memory and
//! is rebuilt from the network controller's HTTP API whenever query
//! traffic observes that it has gone stale.
//!
//! ## Features
//!
//! - A/AAAA records for online members under `<member>.<label>.<suffix>`
//! - Apex SOA/NS answers and RFC 8482 ANY-query hardening
//! - Staleness-driven refresh: no queries, no controller traffic
//! - Lock-free reads via snapshot-swapped record tables
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           mesh-dns                              │
//! │                                                                 │
//! │  ┌──────────────────┐    ┌──────────────────┐                  │
//! │  │ Controller Client│───▶│   Record Store   │                  │
//! │  │ (HTTP API)       │    │   (in-memory)    │                  │
//! │  └──────────────────┘    └────────┬─────────┘                  │
//! │         ▲                         │                             │
//! │         │ rebuild when            ▼                             │
//! │         │ stale              ┌──────────────────┐              │
//! │  ┌──────┴───────────┐       │  Query Handler   │◀── UDP :53   │
//! │  │ Refresh          │◀──────│  (per listener)  │   (per addr)  │
//! │  │ Coordinator      │ query └──────────────────┘              │
//! │  └──────────────────┘ names                                    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## DNS Resolution
//!
//! ```text
//! laptop.office.mesh.example.com
//!   → match served suffix (office.mesh.example.com.)
//!   → exact lookup in the current table snapshot
//!   → A / AAAA records for the member's assigned addresses
//! ```
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use mesh_dns::{ControllerClient, DnsConfig, DnsServer};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config: DnsConfig = load_config();
//!     let client = ControllerClient::new(&controller_config).unwrap();
//!
//!     let cancel = CancellationToken::new();
//!     let server = DnsServer::new(config);
//!     server.run(client, cancel).await.unwrap();
//! }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod controller;
pub mod error;
pub mod handler;
pub mod metrics;
pub mod refresh;
pub mod server;
pub mod state;
pub mod telemetry;
pub mod zone;

// Re-export main types
pub use config::{Config, ControllerConfig, DnsConfig, TelemetryConfig};
pub use controller::{ControllerClient, Member, MembershipSource, NetworkInfo};
pub use error::DnsError;
pub use handler::QueryHandler;
pub use refresh::RefreshCoordinator;
pub use server::DnsServer;
pub use state::{HostRecords, RecordStore, RecordTable};
pub use zone::ZoneTemplates;
