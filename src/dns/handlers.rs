use crate::dns::registry::Registry;
use crate::error::Error;
use crate::record::normalize_dns_name;
use lazy_static::lazy_static;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::sync::Arc;
use trust_dns_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use trust_dns_proto::rr::rdata::{SOA, TXT};
use trust_dns_proto::rr::{Name, RData, Record, RecordType};

/// TTL of every answer served.
pub const TTL: u32 = 5;

const MAX_CHARACTER_STRING: usize = 255;

lazy_static! {
    // Deliberately unresolvable: the responder is never a real zone authority.
    static ref PLACEHOLDER_NS: Name = Name::from_str("ns.acmehook.invalid.").unwrap();
}

#[derive(Clone)]
pub struct Handler {
    registry: Arc<Registry>,
}

impl Handler {
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Handler { registry }
    }

    /// Decode a wire-format request, answer it and encode the response.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DNSError`] if the request can't be decoded. Once a request is decoded
    /// it always gets a reply, see [`Handler::encode`].
    pub async fn handle_bytes(&self, request: &[u8]) -> Result<Vec<u8>, Error> {
        let request = Message::from_vec(request)?;
        let response = self.handle(&request).await;
        Self::encode(&request, &response)
    }

    /// Encode `response` for the transport `request` arrived on.
    ///
    /// A response larger than the requester's UDP payload size is replaced by an empty one with
    /// the TC bit set. A response that can't be encoded at all is replaced by `SERVFAIL`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DNSError`] only if even the header-only fallback can't be encoded.
    pub fn encode(request: &Message, response: &Message) -> Result<Vec<u8>, Error> {
        let max_payload = usize::from(request.max_payload());
        match response.to_vec() {
            Ok(bytes) if bytes.len() <= max_payload => Ok(bytes),
            Ok(bytes) => {
                tracing::debug!(
                    "response to {} is {} bytes, over {max_payload}: truncating",
                    request.id(),
                    bytes.len()
                );
                let mut truncated = Self::reply_to(request);
                truncated
                    .set_truncated(true)
                    .set_response_code(response.response_code());
                Ok(truncated.to_vec()?)
            }
            Err(err) => {
                tracing::warn!("could not encode response to {}: {err}", request.id());
                let mut failure = Self::reply_to(request);
                failure.set_response_code(ResponseCode::ServFail);
                Ok(failure.to_vec()?)
            }
        }
    }

    /// Answer every question in `request`.
    ///
    /// A failure answering any question discards all answers and turns the whole response into
    /// `SERVFAIL`. A TXT question with nothing to serve sets `NXDOMAIN`.
    pub async fn handle(&self, request: &Message) -> Message {
        let mut response = Self::reply_to(request);

        // Only plain queries are answered; anything else gets an empty reply.
        if request.op_code() != OpCode::Query || request.message_type() != MessageType::Query {
            return response;
        }

        let mut answers = Vec::new();
        let mut response_code = ResponseCode::NoError;
        for query in request.queries() {
            match self.dispatch_query(query).await {
                Ok(records) if records.is_empty() => response_code = ResponseCode::NXDomain,
                Ok(records) => answers.extend(records),
                Err(err) => {
                    tracing::warn!("failed answering {} {}: {err}", query.name(), query.query_type());
                    answers.clear();
                    response_code = ResponseCode::ServFail;
                    break;
                }
            }
        }

        response.add_answers(answers).set_response_code(response_code);
        response
    }

    // An answerless response echoing the request's id, opcode and questions.
    fn reply_to(request: &Message) -> Message {
        let mut response = Message::new();
        response
            .set_id(request.id())
            .set_message_type(MessageType::Response)
            .set_op_code(request.op_code())
            .set_recursion_desired(request.recursion_desired())
            .set_authoritative(true)
            .add_queries(request.queries().iter().cloned());
        response
    }

    async fn dispatch_query(&self, query: &Query) -> Result<Vec<Record>, Error> {
        tracing::debug!("DNS query: {} {}", query.name(), query.query_type());

        match query.query_type() {
            RecordType::A => Ok(Self::handle_query_a(query)),
            RecordType::TXT => Ok(self.handle_query_txt(query).await),
            RecordType::NS => Ok(Self::handle_query_ns(query)),
            RecordType::SOA => Ok(Self::handle_query_soa(query)),
            other => Err(Error::UnsupportedQueryType(other)),
        }
    }

    // Any name resolves to loopback so validation can reach the domain under test.
    fn handle_query_a(query: &Query) -> Vec<Record> {
        vec![Self::answer(query, RData::A(Ipv4Addr::LOCALHOST))]
    }

    async fn handle_query_txt(&self, query: &Query) -> Vec<Record> {
        let query_name = normalize_dns_name(&query.name().to_ascii());
        self.registry
            .records()
            .await
            .iter()
            .filter(|r| r.record_type == RecordType::TXT && normalize_dns_name(&r.dns_name) == query_name)
            .flat_map(|r| r.targets.iter())
            .map(|target| Self::answer(query, RData::TXT(txt_rdata(target))))
            .collect()
    }

    fn handle_query_ns(query: &Query) -> Vec<Record> {
        vec![Self::answer(query, RData::NS(PLACEHOLDER_NS.clone()))]
    }

    fn handle_query_soa(query: &Query) -> Vec<Record> {
        let soa_rdata = RData::SOA(SOA::new(
            PLACEHOLDER_NS.clone(),
            PLACEHOLDER_NS.clone(),
            20,
            5,
            5,
            5,
            5,
        ));
        vec![Self::answer(query, soa_rdata)]
    }

    fn answer(query: &Query, rdata: RData) -> Record {
        Record::from_rdata(query.name().clone(), TTL, rdata)
    }
}

// One TXT record per target. Character-strings hold at most 255 bytes, so longer targets are
// split across several strings of the same record.
fn txt_rdata(target: &str) -> TXT {
    if target.is_empty() {
        return TXT::new(vec![String::new()]);
    }
    TXT::from_bytes(target.as_bytes().chunks(MAX_CHARACTER_STRING).collect())
}
