use std::{thread, time::Duration};

use chrono::Utc;
use reqwest::{
    blocking::Client as HttpClient,
    header::{HeaderValue, CONTENT_TYPE},
    Method, Url,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{
    config::non_empty,
    credentials::Credentials,
    remote::{Change, ChangeApplier, Cursor, HostedZone, Page, PageFetcher, ZoneLookup},
    rrset::RecordSet,
    sigv4::{self, canonical_query},
    Config, Error,
};

const API_VERSION: &str = "2013-04-01";
const XMLNS: &str = "https://route53.amazonaws.com/doc/2013-04-01/";
const SERVICE: &str = "route53";

const GLOBAL_ENDPOINT: &str = "https://route53.amazonaws.com";
const CHINA_ENDPOINT: &str = "https://route53.amazonaws.com.cn";
const GOV_CLOUD_ENDPOINT: &str = "https://route53.us-gov.amazonaws.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const ZONES_PER_PAGE: &str = "100";
const RECORD_SETS_PER_PAGE: &str = "300";

const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);
const RETRY_MAX_DELAY: Duration = Duration::from_secs(20);
const POLL_INITIAL_DELAY: Duration = Duration::from_secs(2);
const POLL_MAX_DELAY: Duration = Duration::from_secs(30);

const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "ThrottledException",
    "RequestThrottled",
    "RequestThrottledException",
    "TooManyRequestsException",
    "RequestLimitExceeded",
    "SlowDown",
];

/// Returns the API endpoint and signing region of the AWS partition a region belongs to.
pub fn partition(region: &str) -> (&'static str, &'static str) {
    if region.starts_with("cn-") {
        (CHINA_ENDPOINT, "cn-northwest-1")
    } else if region.starts_with("us-gov-") {
        (GOV_CLOUD_ENDPOINT, "us-gov-west-1")
    } else {
        (GLOBAL_ENDPOINT, "us-east-1")
    }
}

/// Talks to the Route53 REST API.
///
/// Requests are signed with AWS Signature Version 4 and retried with exponential backoff on throttling, server
/// errors and connection failures.
pub struct Client {
    http_client: HttpClient,
    endpoint: String,
    host: String,
    signing_region: &'static str,
    credentials: Credentials,
    max_attempts: u32,
}

impl Client {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let credentials = Credentials::resolve(config)?;
        let (default_endpoint, signing_region) = partition(config.region());
        let endpoint = non_empty(&config.endpoint)
            .unwrap_or(default_endpoint)
            .trim_end_matches('/')
            .to_owned();

        let url = Url::parse(&endpoint)
            .map_err(|err| Error::InvalidInput(format!("invalid endpoint {}: {}", endpoint, err)))?;
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_owned(),
            (None, _) => return Err(Error::InvalidInput(format!("endpoint {} has no host", endpoint))),
        };

        let http_client = HttpClient::builder().timeout(REQUEST_TIMEOUT).build()?;
        debug!(
            "Using Route53 endpoint {} signed for {} with access key {}",
            endpoint, signing_region, credentials.access_key_id
        );

        Ok(Self {
            http_client,
            endpoint,
            host,
            signing_region,
            credentials,
            max_attempts: config.max_attempts(),
        })
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<String>,
    ) -> Result<String, Error> {
        let mut attempt = 0;
        loop {
            match self.request_once(&method, path, query, body.as_deref()) {
                Err(err) if attempt + 1 < self.max_attempts && is_retryable(&err) => {
                    let delay = backoff(attempt);
                    warn!(
                        "Route53 request {} {} failed (attempt {}/{}), retrying in {:?}: {}",
                        method,
                        path,
                        attempt + 1,
                        self.max_attempts,
                        delay,
                        err
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    fn request_once(
        &self,
        method: &Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&str>,
    ) -> Result<String, Error> {
        let payload = body.unwrap_or_default();
        let signed = sigv4::sign_request(
            &sigv4::Request {
                method: method.as_str(),
                host: &self.host,
                path,
                query,
                payload: payload.as_bytes(),
            },
            &self.credentials,
            self.signing_region,
            SERVICE,
            Utc::now(),
        );

        let query_string = canonical_query(query);
        let url = if query_string.is_empty() {
            format!("{}{}", self.endpoint, path)
        } else {
            format!("{}{}?{}", self.endpoint, path, query_string)
        };

        let mut request = self.http_client.request(method.clone(), url);
        for (name, value) in signed {
            let mut value = HeaderValue::from_str(&value)
                .map_err(|err| Error::InvalidInput(format!("invalid {} header: {}", name, err)))?;
            if name != "x-amz-date" {
                value.set_sensitive(true);
            }
            request = request.header(name, value);
        }
        if let Some(body) = body {
            request = request
                .header(CONTENT_TYPE, "application/xml")
                .body(body.to_owned());
        }

        debug!("Route53 API request: {} {}", method, path);
        let response = request.send()?;
        let status = response.status();
        let text = response.text()?;

        if !status.is_success() {
            return Err(api_error(status.as_u16(), &text));
        }
        Ok(text)
    }

    fn change_status(&self, change_id: &str) -> Result<bool, Error> {
        let path = format!("/{}/change/{}", API_VERSION, change_id);
        let response: ChangeInfoResponse = from_xml(&self.request(Method::GET, &path, &[], None)?)?;
        debug!("Change {} is {}", change_id, response.change_info.status);
        Ok(response.change_info.status == "INSYNC")
    }
}

impl ZoneLookup for Client {
    fn find_zones_by_name(&self, name: &str) -> Result<Vec<HostedZone>, Error> {
        let path = format!("/{}/hostedzonesbyname", API_VERSION);
        let mut zones = Vec::new();
        let mut continuation: Option<(String, String)> = None;

        loop {
            let mut query = vec![("maxitems", ZONES_PER_PAGE)];
            match &continuation {
                Some((dns_name, zone_id)) => {
                    query.push(("dnsname", dns_name.as_str()));
                    query.push(("hostedzoneid", zone_id.as_str()));
                }
                None => query.push(("dnsname", name)),
            }

            let response: ListHostedZonesByNameResponse = from_xml(&self.request(Method::GET, &path, &query, None)?)?;
            zones.extend(response.hosted_zones.hosted_zone.into_iter().map(HostedZoneXml::into_zone));

            // later pages can only hold further zones of the same name if the listing continues at that name
            continuation = match (response.is_truncated, response.next_dns_name, response.next_hosted_zone_id) {
                (true, Some(next_name), Some(next_id)) if same_name(&next_name, name) => Some((next_name, next_id)),
                _ => None,
            };
            if continuation.is_none() {
                return Ok(zones);
            }
        }
    }
}

impl PageFetcher for Client {
    fn list_record_sets(&self, zone_id: &str, start: Option<&Cursor>) -> Result<Page, Error> {
        let path = format!(
            "/{}/hostedzone/{}/rrset",
            API_VERSION,
            zone_id.trim_start_matches("/hostedzone/")
        );

        let mut query = vec![("maxitems", RECORD_SETS_PER_PAGE)];
        if let Some(cursor) = start {
            query.push(("name", cursor.name.as_str()));
            if let Some(typ) = &cursor.typ {
                query.push(("type", typ.as_str()));
            }
            if let Some(identifier) = &cursor.identifier {
                query.push(("identifier", identifier.as_str()));
            }
        }

        let response: ListResourceRecordSetsResponse = from_xml(&self.request(Method::GET, &path, &query, None)?)?;
        Ok(response.into_page())
    }
}

impl ChangeApplier for Client {
    fn apply(&self, zone_id: &str, change: &Change) -> Result<String, Error> {
        let path = format!(
            "/{}/hostedzone/{}/rrset",
            API_VERSION,
            zone_id.trim_start_matches("/hostedzone/")
        );
        let body = change_body(change)?;

        let response: ChangeInfoResponse = from_xml(&self.request(Method::POST, &path, &[], Some(body))?)?;
        Ok(response.change_info.id)
    }

    fn await_propagation(&self, change_id: &str, max_wait: Duration) -> Result<(), Error> {
        let id = change_id.trim_start_matches("/change/");
        wait_until(change_id, max_wait, || self.change_status(id), thread::sleep)
    }
}

/// Polls until `poll` reports completion, doubling the pause between polls up to a limit.
///
/// Only the pauses count against `max_wait`; once it is used up, the last poll decides.
pub(crate) fn wait_until<P, S>(change_id: &str, max_wait: Duration, mut poll: P, mut sleep: S) -> Result<(), Error>
where
    P: FnMut() -> Result<bool, Error>,
    S: FnMut(Duration),
{
    let mut waited = Duration::ZERO;
    let mut delay = POLL_INITIAL_DELAY;

    loop {
        if poll()? {
            return Ok(());
        }

        let remaining = max_wait.saturating_sub(waited);
        if remaining.is_zero() {
            return Err(Error::Timeout {
                change_id: change_id.to_owned(),
                max_wait,
            });
        }

        let pause = delay.min(remaining);
        sleep(pause);
        waited += pause;
        delay = (delay * 2).min(POLL_MAX_DELAY);
    }
}

fn is_retryable(err: &Error) -> bool {
    match err {
        Error::Api { status, code, .. } => {
            *status == 429 || *status >= 500 || THROTTLING_CODES.contains(&code.as_str())
        }
        Error::PriorRequestNotComplete(_) => true,
        Error::Http(err) => err.is_connect() || err.is_timeout(),
        _ => false,
    }
}

fn backoff(attempt: u32) -> Duration {
    let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
    RETRY_BASE_DELAY.saturating_mul(factor).min(RETRY_MAX_DELAY)
}

fn same_name(a: &str, b: &str) -> bool {
    a.trim_end_matches('.').eq_ignore_ascii_case(b.trim_end_matches('.'))
}

fn from_xml<T: for<'de> Deserialize<'de>>(body: &str) -> Result<T, Error> {
    quick_xml::de::from_str(body).map_err(|err| Error::Xml(err.to_string()))
}

fn change_body(change: &Change) -> Result<String, Error> {
    let set = &change.record_set;
    let request = ChangeResourceRecordSetsRequest {
        xmlns: XMLNS,
        change_batch: ChangeBatch {
            changes: Changes {
                change: vec![ChangeXml {
                    action: change.action.as_str(),
                    resource_record_set: ResourceRecordSetXml {
                        name: &set.name,
                        typ: &set.typ,
                        ttl: set.ttl,
                        resource_records: ResourceRecordsXml {
                            resource_record: set
                                .values
                                .iter()
                                .map(|value| ResourceRecordXml { value })
                                .collect(),
                        },
                    },
                }],
            },
        },
    };

    quick_xml::se::to_string(&request).map_err(|err| Error::Xml(err.to_string()))
}

/// Maps an error response document to the matching [`Error`] variant.
fn api_error(status: u16, body: &str) -> Error {
    if let Ok(response) = quick_xml::de::from_str::<ErrorResponse>(body) {
        let ErrorDetail { code, message } = response.error;
        return match code.as_str() {
            "NoSuchHostedZone" => Error::ZoneNotFound(message),
            "InvalidDomainName" => Error::InvalidDomainName(message),
            "InvalidInput" => Error::InvalidInput(message),
            "InvalidChangeBatch" => Error::InvalidChangeBatch(message),
            "PriorRequestNotComplete" => Error::PriorRequestNotComplete(message),
            _ => Error::Api { status, code, message },
        };
    }

    if let Ok(response) = quick_xml::de::from_str::<InvalidChangeBatchResponse>(body) {
        return Error::InvalidChangeBatch(response.messages.message.join("; "));
    }

    Error::Api {
        status,
        code: String::new(),
        message: body.trim().to_owned(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListHostedZonesByNameResponse {
    #[serde(default)]
    hosted_zones: HostedZonesXml,
    #[serde(default)]
    is_truncated: bool,
    #[serde(rename = "NextDNSName")]
    next_dns_name: Option<String>,
    next_hosted_zone_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct HostedZonesXml {
    #[serde(rename = "HostedZone", default)]
    hosted_zone: Vec<HostedZoneXml>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HostedZoneXml {
    id: String,
    name: String,
    config: Option<HostedZoneConfigXml>,
}

impl HostedZoneXml {
    fn into_zone(self) -> HostedZone {
        HostedZone {
            id: self.id,
            name: self.name,
            private: self.config.map(|config| config.private_zone).unwrap_or(false),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HostedZoneConfigXml {
    #[serde(default)]
    private_zone: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListResourceRecordSetsResponse {
    #[serde(default)]
    resource_record_sets: ResourceRecordSetsXml,
    #[serde(default)]
    is_truncated: bool,
    next_record_name: Option<String>,
    next_record_type: Option<String>,
    next_record_identifier: Option<String>,
}

impl ListResourceRecordSetsResponse {
    fn into_page(self) -> Page {
        let record_sets = self
            .resource_record_sets
            .resource_record_set
            .into_iter()
            .filter_map(|set| {
                if set.alias_target.is_some() {
                    debug!("Skipping alias record set {} {}", set.typ, set.name);
                    return None;
                }
                Some(RecordSet {
                    name: set.name,
                    typ: set.typ,
                    ttl: set.ttl.unwrap_or_default(),
                    values: set
                        .resource_records
                        .map(|records| records.resource_record.into_iter().map(|r| r.value).collect())
                        .unwrap_or_default(),
                })
            })
            .collect();

        let next = match (self.is_truncated, self.next_record_name) {
            (true, Some(name)) => Some(Cursor {
                name,
                typ: self.next_record_type,
                identifier: self.next_record_identifier,
            }),
            _ => None,
        };

        Page { record_sets, next }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ResourceRecordSetsXml {
    #[serde(rename = "ResourceRecordSet", default)]
    resource_record_set: Vec<ResourceRecordSetResponseXml>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ResourceRecordSetResponseXml {
    name: String,
    #[serde(rename = "Type")]
    typ: String,
    #[serde(rename = "TTL")]
    ttl: Option<u64>,
    resource_records: Option<ResourceRecordsResponseXml>,
    alias_target: Option<AliasTargetXml>,
}

#[derive(Debug, Deserialize)]
struct ResourceRecordsResponseXml {
    #[serde(rename = "ResourceRecord", default)]
    resource_record: Vec<ResourceRecordResponseXml>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ResourceRecordResponseXml {
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AliasTargetXml {
    #[serde(rename = "DNSName")]
    #[allow(dead_code)]
    dns_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ChangeInfoResponse {
    change_info: ChangeInfoXml,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ChangeInfoXml {
    id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorDetail {
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InvalidChangeBatchResponse {
    messages: MessagesXml,
}

#[derive(Debug, Deserialize)]
struct MessagesXml {
    #[serde(rename = "Message", default)]
    message: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ChangeResourceRecordSetsRequest<'a> {
    #[serde(rename = "@xmlns")]
    xmlns: &'static str,
    change_batch: ChangeBatch<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ChangeBatch<'a> {
    changes: Changes<'a>,
}

#[derive(Debug, Serialize)]
struct Changes<'a> {
    #[serde(rename = "Change")]
    change: Vec<ChangeXml<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ChangeXml<'a> {
    action: &'static str,
    resource_record_set: ResourceRecordSetXml<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ResourceRecordSetXml<'a> {
    name: &'a str,
    #[serde(rename = "Type")]
    typ: &'a str,
    #[serde(rename = "TTL")]
    ttl: u64,
    resource_records: ResourceRecordsXml<'a>,
}

#[derive(Debug, Serialize)]
struct ResourceRecordsXml<'a> {
    #[serde(rename = "ResourceRecord")]
    resource_record: Vec<ResourceRecordXml<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ResourceRecordXml<'a> {
    value: &'a str,
}
