use crate::index::EndpointIndex;
use async_trait::async_trait;
use hickory_proto::op::{Header, ResponseCode};
use hickory_proto::rr::{rdata::SRV, Name, RData, Record, RecordType};
use hickory_server::authority::MessageResponseBuilder;
use hickory_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};
use std::str::FromStr;
use std::sync::Arc;
use tracing::warn;

const SRV_TTL: u32 = 30;
const SRV_PRIORITY: u16 = 1;
const SRV_WEIGHT: u16 = 1;

/// Object-safe stand-in for the downstream plugin chain. hickory-server's
/// `RequestHandler::handle_request` is generic over its response handle and
/// so cannot be stored as `dyn RequestHandler`; this trait captures just
/// what chaining needs -- the synthesized sections (and status) a
/// downstream handler would have produced -- so it can be held behind an
/// `Arc<dyn _>`.
#[async_trait]
pub trait NextPlugin: Send + Sync {
    async fn serve(&self, request: &Request) -> PluginResponse;
}

/// Records (and response code) synthesized by one link in the chain,
/// combined before the final write -- the Rust analogue of the Go
/// `CombiningResponseWriter`.
#[derive(Debug, Clone, Default)]
pub struct PluginResponse {
    pub rcode: ResponseCode,
    pub answers: Vec<Record>,
    pub additionals: Vec<Record>,
}

/// CoreDNS's `plugin.NextOrFailure` answers SERVFAIL when there is no
/// further plugin in the chain to try.
fn no_next_response() -> PluginResponse {
    PluginResponse {
        rcode: ResponseCode::ServFail,
        ..Default::default()
    }
}

/// Place synthesized records in the Answer section for an SRV query, the
/// Additional section otherwise.
fn place_records(records: Vec<Record>, is_srv_query: bool) -> PluginResponse {
    let mut response = PluginResponse {
        rcode: ResponseCode::NoError,
        ..Default::default()
    };
    if is_srv_query {
        response.answers = records;
    } else {
        response.additionals = records;
    }
    response
}

/// Combine a downstream response with this plugin's own synthesized
/// records: downstream's records first, this plugin's appended after.
fn combine(delegated: PluginResponse, mine: PluginResponse) -> PluginResponse {
    PluginResponse {
        rcode: mine.rcode,
        answers: [delegated.answers, mine.answers].concat(),
        additionals: [delegated.additionals, mine.additionals].concat(),
    }
}

/// DNS query handler: performs O(1) lookups into the endpoint index and
/// synthesises SRV answers with correct Answer/Additional placement.
#[derive(Clone)]
pub struct DnsHandler {
    index: Arc<EndpointIndex>,
    next: Option<Arc<dyn NextPlugin>>,
}

impl DnsHandler {
    pub fn new(index: Arc<EndpointIndex>, next: Option<Arc<dyn NextPlugin>>) -> Self {
        Self { index, next }
    }

    /// True iff the endpoint index has a non-nil apps list.
    pub async fn ready(&self) -> bool {
        self.index.get_apps().await.is_some()
    }

    async fn delegate(&self, request: &Request) -> PluginResponse {
        match &self.next {
            Some(next) => next.serve(request).await,
            None => no_next_response(),
        }
    }

    /// Build SRV records for every host of the matched app, honoring the
    /// framework's case-preserved QNAME and QCLASS.
    fn synthesize_srv(app: &crate::types::Application, request: &Request) -> Vec<Record> {
        let query = request.query().original();
        let name = query.name().clone();
        let class = query.query_class();

        app.hosts
            .iter()
            .filter_map(|host| {
                let target = match Name::from_str(&format!("{}.", host.host)) {
                    Ok(name) => name,
                    Err(e) => {
                        warn!(host = %host.host, error = %e, "skipping host with unparseable name");
                        return None;
                    }
                };
                let rdata = RData::SRV(SRV::new(SRV_PRIORITY, SRV_WEIGHT, host.port, target));
                let mut record = Record::from_rdata(name.clone(), SRV_TTL, rdata);
                record.set_dns_class(class);
                Some(record)
            })
            .collect()
    }
}

#[async_trait]
impl RequestHandler for DnsHandler {
    async fn handle_request<R: ResponseHandler>(
        &self,
        request: &Request,
        mut response_handle: R,
    ) -> ResponseInfo {
        let builder = MessageResponseBuilder::from_message_request(request);

        // 1. Not ready -> SERVFAIL.
        if !self.ready().await {
            let header = Header::response_from_request(request.header());
            let response = builder.error_msg(&header, ResponseCode::ServFail);
            return response_handle
                .send_response(response)
                .await
                .unwrap_or_else(|e| {
                    tracing::error!(error = %e, "failed to send SERVFAIL response");
                    header.into()
                });
        }

        // 2/3. Look up the question; delegate (and cover the "zero
        // questions" edge case via no-match) when absent.
        let question_name = request.query().name().to_string();
        let app = self.index.search_apps(&question_name).await;

        let plugin_response = match &app {
            Some(app) => {
                let srv_records = Self::synthesize_srv(app, request);
                let is_srv_query = request.query().query_type() == RecordType::SRV;
                place_records(srv_records, is_srv_query)
            }
            None => PluginResponse::default(),
        };

        // 8. Nothing produced (no match, or a matched app with zero
        // hosts) -> delegate to the next plugin, or SERVFAIL if there is
        // none -- the downstream's response code is authoritative here.
        if plugin_response.answers.is_empty() && plugin_response.additionals.is_empty() {
            let delegated = self.delegate(request).await;
            let mut header = Header::response_from_request(request.header());
            header.set_response_code(delegated.rcode);
            let response = builder.build(
                header,
                delegated.answers.iter(),
                std::iter::empty(),
                std::iter::empty(),
                delegated.additionals.iter(),
            );
            return response_handle
                .send_response(response)
                .await
                .unwrap_or_else(|e| {
                    tracing::error!(error = %e, "failed to send delegated response");
                    header.into()
                });
        }

        // 7. This plugin matched -- combine with the next plugin's own
        // output (downstream first, this plugin's synthesized records
        // appended after), then write once. This plugin's own success
        // code wins: it answered the query regardless of what downstream
        // had to say.
        let plugin_response = if self.next.is_some() {
            let delegated = self.delegate(request).await;
            combine(delegated, plugin_response)
        } else {
            plugin_response
        };

        let mut header = Header::response_from_request(request.header());
        header.set_authoritative(true);
        header.set_response_code(plugin_response.rcode);
        let response = builder.build(
            header,
            plugin_response.answers.iter(),
            std::iter::empty(),
            std::iter::empty(),
            plugin_response.additionals.iter(),
        );
        response_handle
            .send_response(response)
            .await
            .unwrap_or_else(|e| {
                tracing::error!(error = %e, "failed to send response");
                header.into()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn srv_record(name: &str) -> Record {
        let target = Name::from_str(&format!("{name}.")).unwrap();
        let rdata = RData::SRV(SRV::new(SRV_PRIORITY, SRV_WEIGHT, 1234, target));
        Record::from_rdata(Name::root(), SRV_TTL, rdata)
    }

    #[test]
    fn no_next_handler_answers_servfail() {
        let response = no_next_response();
        assert_eq!(response.rcode, ResponseCode::ServFail);
        assert!(response.answers.is_empty());
        assert!(response.additionals.is_empty());
    }

    #[test]
    fn srv_query_places_records_in_answers() {
        let records = vec![srv_record("host-a")];
        let response = place_records(records.clone(), true);
        assert_eq!(response.rcode, ResponseCode::NoError);
        assert_eq!(response.answers.len(), 1);
        assert!(response.additionals.is_empty());
    }

    #[test]
    fn non_srv_query_places_records_in_additionals() {
        let records = vec![srv_record("host-a")];
        let response = place_records(records.clone(), false);
        assert_eq!(response.rcode, ResponseCode::NoError);
        assert!(response.answers.is_empty());
        assert_eq!(response.additionals.len(), 1);
    }

    #[test]
    fn combine_puts_downstream_records_before_own() {
        let delegated = PluginResponse {
            rcode: ResponseCode::ServFail,
            answers: vec![srv_record("downstream")],
            additionals: vec![],
        };
        let mine = place_records(vec![srv_record("mine")], true);

        let combined = combine(delegated, mine);

        // this plugin matched, so its own success code wins over whatever
        // downstream returned
        assert_eq!(combined.rcode, ResponseCode::NoError);
        assert_eq!(combined.answers.len(), 2);
        assert_eq!(combined.answers[0].data(), srv_record("downstream").data());
        assert_eq!(combined.answers[1].data(), srv_record("mine").data());
    }
}
