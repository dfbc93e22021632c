//! Shared test infrastructure for the wire-level integration tests.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::{Name, RData, RecordType};
use tokio::sync::mpsc;

use mesh_dns::handler::QueryHandler;
use mesh_dns::state::{HostRecords, RecordStore, RecordTable};
use mesh_dns::zone::ZoneTemplates;

// --- Constants ---

pub const ZONE: &str = "office.mesh.example.com.";
pub const SERVER_FQDN: &str = "ns1.example.com";
pub const SERVER_ADDR: &str = "192.0.2.53";
pub const TTL: u32 = 3600;
pub const SOA_SERIAL: u32 = 1700000000;

// --- Fixtures ---

/// Store serving [`ZONE`] with the given table contents.
pub fn build_store(table: RecordTable) -> Arc<RecordStore> {
    let store = Arc::new(RecordStore::new(vec![ZONE.to_string()]));
    store.replace(table);
    store
}

/// Zone templates with the fixed test identity.
pub fn build_templates() -> Arc<ZoneTemplates> {
    Arc::new(
        ZoneTemplates::new(SERVER_FQDN, SERVER_ADDR.parse().unwrap(), SOA_SERIAL)
            .expect("test templates must build"),
    )
}

/// Handler over the given store, with an observation channel large
/// enough that tests never drop.
pub fn build_handler(store: Arc<RecordStore>) -> (QueryHandler, mpsc::Receiver<String>) {
    let (tx, rx) = mpsc::channel(256);
    (QueryHandler::new(store, build_templates(), TTL, tx), rx)
}

/// A record table with a single IPv4-only host `laptop.<ZONE>`.
pub fn laptop_table() -> RecordTable {
    RecordTable::from([(
        format!("laptop.{ZONE}"),
        HostRecords {
            ipv4: vec!["10.147.17.5".parse().unwrap()],
            ipv6: vec![],
        },
    )])
}

// --- Query/Response over the wire ---

/// Build wire-format bytes for a DNS query.
pub fn build_query_bytes(name: &str, record_type: RecordType, id: u16) -> Vec<u8> {
    let mut msg = Message::new();
    msg.set_id(id);
    msg.set_message_type(MessageType::Query);
    msg.set_op_code(OpCode::Query);
    msg.set_recursion_desired(true);
    msg.add_query(Query::query(Name::from_ascii(name).unwrap(), record_type));
    msg.to_vec().unwrap()
}

/// Run query bytes through the handler the way a listener would:
/// parse from the wire, synthesize, re-encode, re-parse.
pub fn execute_query_bytes(handler: &QueryHandler, bytes: &[u8]) -> Message {
    let request = Message::from_vec(bytes).expect("test query must parse");
    let reply = handler.handle(&request);
    let encoded = reply.to_vec().expect("reply must encode");
    Message::from_vec(&encoded).expect("encoded reply must re-parse")
}

/// Convenience wrapper: single-question query by name and type.
pub fn execute_query(handler: &QueryHandler, name: &str, record_type: RecordType) -> Message {
    execute_query_bytes(handler, &build_query_bytes(name, record_type, 4321))
}

// --- Response helpers ---

/// Extract A addresses from a response's answer section.
pub fn extract_a_ips(msg: &Message) -> Vec<Ipv4Addr> {
    msg.answers()
        .iter()
        .filter_map(|r| match r.data() {
            RData::A(a) => Some(Ipv4Addr::from(*a)),
            _ => None,
        })
        .collect()
}

/// Extract AAAA addresses from a response's answer section.
pub fn extract_aaaa_ips(msg: &Message) -> Vec<Ipv6Addr> {
    msg.answers()
        .iter()
        .filter_map(|r| match r.data() {
            RData::AAAA(aaaa) => Some(Ipv6Addr::from(*aaaa)),
            _ => None,
        })
        .collect()
}

/// Assert response code.
pub fn assert_response_code(msg: &Message, expected: ResponseCode) {
    assert_eq!(
        msg.response_code(),
        expected,
        "expected {:?}, got {:?}",
        expected,
        msg.response_code()
    );
}
