//! In-memory record store for served hostnames.
//!
//! The store maps fully qualified lowercase hostnames to their address
//! records and carries the ordered list of suffixes this instance is
//! authoritative for. Rebuilds replace the whole table: the refresh
//! coordinator stages a complete replacement and publishes it with a
//! single pointer swap, so readers see either the old table or the new
//! one, never a partially updated mix, and keys absent from the staged
//! table are gone the instant the swap lands.

use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use tracing::debug;

use crate::metrics;

/// Address records known for one hostname. Either list may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostRecords {
    /// IPv4 addresses, in the order the controller reported them.
    pub ipv4: Vec<Ipv4Addr>,
    /// IPv6 addresses, in derivation order (6plane before RFC4193).
    pub ipv6: Vec<Ipv6Addr>,
}

/// Hostname -> records. Keys are lowercase FQDNs with trailing dot.
pub type RecordTable = HashMap<String, HostRecords>;

/// Shared record store: a snapshot-swapped record table plus the
/// immutable served suffix list.
#[derive(Debug)]
pub struct RecordStore {
    table: ArcSwap<RecordTable>,
    suffixes: Vec<String>,
}

impl RecordStore {
    /// Create an empty store serving the given suffixes.
    ///
    /// Suffixes are sorted longest-first so that overlapping suffixes
    /// match deterministically: the most specific one wins regardless of
    /// configuration order.
    pub fn new(mut suffixes: Vec<String>) -> Self {
        suffixes.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        suffixes.dedup();

        Self {
            table: ArcSwap::from_pointee(RecordTable::new()),
            suffixes,
        }
    }

    /// The ordered suffix list this instance answers for.
    pub fn suffixes(&self) -> &[String] {
        &self.suffixes
    }

    /// Return the first served suffix the (lowercase) name falls under.
    pub fn match_suffix(&self, name: &str) -> Option<&str> {
        self.suffixes
            .iter()
            .find(|suffix| name.ends_with(suffix.as_str()))
            .map(String::as_str)
    }

    /// Look up the records for an exact (lowercase, fully qualified)
    /// hostname. No wildcard expansion.
    pub fn lookup(&self, name: &str) -> Option<HostRecords> {
        self.table.load().get(name).cloned()
    }

    /// Publish a freshly staged table, replacing the previous one whole.
    pub fn replace(&self, table: RecordTable) {
        let hosts = table.len();
        self.table.store(Arc::new(table));
        metrics::record_store_size(hosts, self.suffixes.len());
        debug!(hosts, "published new record table");
    }

    /// Current table snapshot, for tests and introspection.
    pub fn snapshot(&self) -> Arc<RecordTable> {
        self.table.load_full()
    }

    /// Number of hostnames currently served.
    pub fn host_count(&self) -> usize {
        self.table.load().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records_v4(addrs: &[&str]) -> HostRecords {
        HostRecords {
            ipv4: addrs.iter().map(|a| a.parse().unwrap()).collect(),
            ipv6: Vec::new(),
        }
    }

    #[test]
    fn test_match_suffix_first_match() {
        let store = RecordStore::new(vec!["office.mesh.example.com.".to_string()]);
        assert_eq!(
            store.match_suffix("host.office.mesh.example.com."),
            Some("office.mesh.example.com.")
        );
        assert_eq!(store.match_suffix("host.other.example.com."), None);
    }

    #[test]
    fn test_overlapping_suffixes_longest_wins() {
        // Configuration order is shortest-first on purpose; the store
        // must still prefer the more specific suffix.
        let store = RecordStore::new(vec![
            "mesh.example.com.".to_string(),
            "office.mesh.example.com.".to_string(),
        ]);

        assert_eq!(
            store.match_suffix("host.office.mesh.example.com."),
            Some("office.mesh.example.com.")
        );
        assert_eq!(
            store.match_suffix("host.lab.mesh.example.com."),
            Some("mesh.example.com.")
        );
    }

    #[test]
    fn test_suffix_order_is_deterministic() {
        let a = RecordStore::new(vec!["b.zt.".to_string(), "a.zt.".to_string()]);
        let b = RecordStore::new(vec!["a.zt.".to_string(), "b.zt.".to_string()]);
        assert_eq!(a.suffixes(), b.suffixes());
    }

    #[test]
    fn test_lookup_is_exact() {
        let store = RecordStore::new(vec!["office.zt.".to_string()]);
        store.replace(RecordTable::from([(
            "host.office.zt.".to_string(),
            records_v4(&["10.0.0.1"]),
        )]));

        assert!(store.lookup("host.office.zt.").is_some());
        // No wildcard expansion of sibling or child names.
        assert!(store.lookup("other.office.zt.").is_none());
        assert!(store.lookup("sub.host.office.zt.").is_none());
    }

    #[test]
    fn test_replace_evicts_absent_keys() {
        let store = RecordStore::new(vec!["office.zt.".to_string()]);
        store.replace(RecordTable::from([
            ("one.office.zt.".to_string(), records_v4(&["10.0.0.1"])),
            ("two.office.zt.".to_string(), records_v4(&["10.0.0.2"])),
        ]));
        assert_eq!(store.host_count(), 2);

        store.replace(RecordTable::from([(
            "one.office.zt.".to_string(),
            records_v4(&["10.0.0.1"]),
        )]));

        assert_eq!(store.host_count(), 1);
        assert!(store.lookup("two.office.zt.").is_none());
    }

    #[test]
    fn test_dead_entries_are_permitted() {
        // A key outside every served suffix may sit in the table; it can
        // simply never be reached through suffix matching.
        let store = RecordStore::new(vec!["office.zt.".to_string()]);
        store.replace(RecordTable::from([(
            "host.elsewhere.".to_string(),
            records_v4(&["10.0.0.9"]),
        )]));

        assert!(store.lookup("host.elsewhere.").is_some());
        assert_eq!(store.match_suffix("host.elsewhere."), None);
    }
}
