//! Zone response templates.
//!
//! SOA and NS contents are fixed for the process lifetime: they are
//! derived once at startup from the server's own FQDN, its resolved
//! address, and a serial taken from the startup time. Only the owner
//! name varies per response (the matched zone apex).

use hickory_proto::rr::rdata::{A, NS, SOA};
use hickory_proto::rr::{DNSClass, Name, RData, Record};
use std::net::Ipv4Addr;

use crate::error::DnsError;

/// TTL on SOA, NS, and the server's own A record.
pub const ZONE_RECORD_TTL: u32 = 3600;

const SOA_REFRESH: i32 = 14400;
const SOA_RETRY: i32 = 3600;
const SOA_EXPIRE: i32 = 604_800;
const SOA_MINIMUM: u32 = 60;

/// Precomputed SOA/NS response templates plus the server's own address
/// record. Built once at startup, immutable afterwards.
#[derive(Debug, Clone)]
pub struct ZoneTemplates {
    server_name: Name,
    soa: SOA,
    self_record: Record,
}

impl ZoneTemplates {
    /// Build the templates from the server's own FQDN, its resolved IPv4
    /// address, and the SOA serial (startup Unix time).
    pub fn new(server_fqdn: &str, server_addr: Ipv4Addr, serial: u32) -> Result<Self, DnsError> {
        let fqdn = format!("{}.", server_fqdn.trim_end_matches('.'));
        let server_name = Name::from_ascii(&fqdn)?;
        let rname = Name::from_ascii(format!("postmaster.{fqdn}"))?;

        let soa = SOA::new(
            server_name.clone(),
            rname,
            serial,
            SOA_REFRESH,
            SOA_RETRY,
            SOA_EXPIRE,
            SOA_MINIMUM,
        );

        let mut self_record = Record::from_rdata(
            server_name.clone(),
            ZONE_RECORD_TTL,
            RData::A(A::from(server_addr)),
        );
        self_record.set_dns_class(DNSClass::IN);

        Ok(Self {
            server_name,
            soa,
            self_record,
        })
    }

    /// The server's own fully qualified name.
    pub fn server_name(&self) -> &Name {
        &self.server_name
    }

    /// SOA record owned by the given zone apex. `None` if the zone text
    /// does not form a valid name; the caller drops just this record.
    pub fn soa_record(&self, zone: &str) -> Option<Record> {
        let name = Name::from_ascii(zone).ok()?;
        let mut record = Record::from_rdata(name, ZONE_RECORD_TTL, RData::SOA(self.soa.clone()));
        record.set_dns_class(DNSClass::IN);
        Some(record)
    }

    /// NS record for the given zone apex, pointing at this server.
    pub fn ns_record(&self, zone: &str) -> Option<Record> {
        let name = Name::from_ascii(zone).ok()?;
        let mut record = Record::from_rdata(
            name,
            ZONE_RECORD_TTL,
            RData::NS(NS(self.server_name.clone())),
        );
        record.set_dns_class(DNSClass::IN);
        Some(record)
    }

    /// A copy of the server's own A record for additional sections.
    pub fn self_record(&self) -> Record {
        self.self_record.clone()
    }
}
