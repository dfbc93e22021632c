//! Query handling: parsed request in, synthesized reply out.
//!
//! The handler is stateless between calls; everything it answers from
//! (record table snapshot, suffix list, response templates) is shared
//! read-only state. Every question's name is also pushed onto the
//! observation channel so the refresh coordinator can notice staleness;
//! the send never blocks the query path.

use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::rdata::{A, AAAA, HINFO};
use hickory_proto::rr::{DNSClass, Name, RData, Record, RecordType};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::trace;

use crate::metrics::{self, QueryOutcome, Timer};
use crate::state::RecordStore;
use crate::zone::ZoneTemplates;

/// Answers DNS questions from the current record store snapshot.
#[derive(Clone)]
pub struct QueryHandler {
    store: Arc<RecordStore>,
    templates: Arc<ZoneTemplates>,
    ttl: u32,
    observations: mpsc::Sender<String>,
}

impl QueryHandler {
    /// Create a handler over the given store and templates. `ttl` is
    /// applied to every synthesized answer record.
    pub fn new(
        store: Arc<RecordStore>,
        templates: Arc<ZoneTemplates>,
        ttl: u32,
        observations: mpsc::Sender<String>,
    ) -> Self {
        Self {
            store,
            templates,
            ttl,
            observations,
        }
    }

    /// Synthesize the reply for one request message.
    ///
    /// The reply is authoritative. Only the Query opcode is processed;
    /// anything else gets an empty authoritative reply. Questions are
    /// handled independently, but the response code is message-global:
    /// one refused question marks the whole reply refused.
    pub fn handle(&self, request: &Message) -> Message {
        let mut reply = Message::new();
        reply.set_id(request.id());
        reply.set_message_type(MessageType::Response);
        reply.set_op_code(request.op_code());
        reply.set_recursion_desired(request.recursion_desired());
        reply.set_authoritative(true);
        for question in request.queries() {
            reply.add_query(question.clone());
        }

        if request.op_code() != OpCode::Query {
            return reply;
        }

        for question in request.queries() {
            self.observe(question.name());
            self.answer_question(question, &mut reply);
        }

        reply
    }

    /// Push the query name onto the observation channel. A full channel
    /// drops the observation rather than stalling the listener.
    fn observe(&self, name: &Name) {
        match self.observations.try_send(name.to_ascii()) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(_)) => metrics::record_observation_dropped(),
        }
    }

    fn answer_question(&self, question: &Query, reply: &mut Message) {
        let timer = Timer::start();
        let qtype = question.query_type();
        let lookup_name = fqdn_key(question.name());

        trace!(name = %lookup_name, qtype = %qtype, "handling question");

        let Some(zone) = self.store.match_suffix(&lookup_name) else {
            reply.set_response_code(ResponseCode::Refused);
            metrics::record_query(qtype, QueryOutcome::Refused, timer.elapsed());
            return;
        };

        match qtype {
            // ANY gets the RFC 8482 placeholder instead of a real record
            // set; the table is not consulted at all.
            RecordType::ANY => {
                reply.add_answer(self.hinfo_record(question.name()));
                metrics::record_query(qtype, QueryOutcome::Answered, timer.elapsed());
            }
            RecordType::SOA if lookup_name == zone => {
                if let (Some(soa), Some(ns)) =
                    (self.templates.soa_record(zone), self.templates.ns_record(zone))
                {
                    reply.add_answer(soa);
                    reply.add_name_server(ns);
                    reply.add_additional(self.templates.self_record());
                }
                metrics::record_query(qtype, QueryOutcome::Answered, timer.elapsed());
            }
            RecordType::NS if lookup_name == zone => {
                if let Some(ns) = self.templates.ns_record(zone) {
                    reply.add_answer(ns);
                    reply.add_additional(self.templates.self_record());
                }
                metrics::record_query(qtype, QueryOutcome::Answered, timer.elapsed());
            }
            _ => {
                let outcome = self.answer_from_table(question, zone, &lookup_name, reply);
                metrics::record_query(qtype, outcome, timer.elapsed());
            }
        }
    }

    /// Exact-name lookup path for everything that is not ANY or an apex
    /// SOA/NS query.
    fn answer_from_table(
        &self,
        question: &Query,
        zone: &str,
        lookup_name: &str,
        reply: &mut Message,
    ) -> QueryOutcome {
        let Some(records) = self.store.lookup(lookup_name) else {
            reply.set_response_code(ResponseCode::NXDomain);
            if let Some(soa) = self.templates.soa_record(zone) {
                reply.add_name_server(soa);
            }
            return QueryOutcome::NxDomain;
        };

        let owner = question.name();
        let mut answered = 0usize;
        match question.query_type() {
            RecordType::A => {
                for ip in &records.ipv4 {
                    reply.add_answer(self.answer_record(owner, RData::A(A::from(*ip))));
                    answered += 1;
                }
            }
            RecordType::AAAA => {
                for ip in &records.ipv6 {
                    reply.add_answer(self.answer_record(owner, RData::AAAA(AAAA::from(*ip))));
                    answered += 1;
                }
            }
            _ => {}
        }

        if answered == 0 {
            // Name exists, type has no data: SOA in authority, rcode
            // stays NOERROR.
            if let Some(soa) = self.templates.soa_record(zone) {
                reply.add_name_server(soa);
            }
            return QueryOutcome::NoData;
        }

        QueryOutcome::Answered
    }

    fn answer_record(&self, owner: &Name, rdata: RData) -> Record {
        let mut record = Record::from_rdata(owner.clone(), self.ttl, rdata);
        record.set_dns_class(DNSClass::IN);
        record
    }

    fn hinfo_record(&self, owner: &Name) -> Record {
        let hinfo = HINFO::new("RFC8482".to_string(), String::new());
        let mut record = Record::from_rdata(owner.clone(), self.ttl, RData::HINFO(hinfo));
        record.set_dns_class(DNSClass::IN);
        record
    }
}

/// Lowercase lookup key for a query name, always fully qualified.
pub(crate) fn fqdn_key(name: &Name) -> String {
    let mut key = name.to_ascii().to_ascii_lowercase();
    if !key.ends_with('.') {
        key.push('.');
    }
    key
}
