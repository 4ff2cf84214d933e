// # NS1 DNS Provider
//
// This crate provides an NS1 managed DNS provider for the updater.
//
// Every trait method issues exactly one HTTP request and reports its
// outcome. Retry, backoff, and delete confirmation are owned by the engine.
//
// ## Security Requirements
//
// - API key NEVER appears in logs
// - API key MUST be provided via environment variables only
// - Provider MUST fail fast if the key is empty
//
// ## API Reference
//
// - NS1 REST API v1: https://developer.ibm.com/apis/catalog/ns1--ibm-ns1-connect-api/
// - Zone: GET `/zones/:zone`
// - Record: GET / PUT / DELETE `/zones/:zone/:domain/:type`
// - Authentication: `X-NSONE-Key: <key>` header

use async_trait::async_trait;
use dnsupdate_core::config::ProviderConfig;
use dnsupdate_core::traits::{
    DnsProvider, DnsProviderFactory, Record, RecordData, RecordSpec, RecordType, Zone,
};
use dnsupdate_core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// NS1 API base URL
pub const NS1_API_BASE: &str = "https://api.nsone.net/v1";

/// Default HTTP timeout for API requests
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Authentication header
const API_KEY_HEADER: &str = "X-NSONE-Key";

const PROVIDER_NAME: &str = "ns1";

/// Zone as returned by `GET /zones/:zone`
#[derive(Debug, Deserialize)]
struct ZoneBody {
    zone: String,
    #[serde(default)]
    id: Option<String>,
}

/// Record body, both for reads and for `PUT`
#[derive(Debug, Serialize, Deserialize)]
struct RecordBody {
    zone: String,
    domain: String,
    #[serde(rename = "type")]
    record_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ttl: Option<u32>,
    #[serde(default)]
    answers: Vec<AnswerBody>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AnswerBody {
    answer: Vec<Value>,
}

impl AnswerBody {
    /// Answer fields joined by single spaces
    fn text(&self) -> String {
        self.answer
            .iter()
            .map(|field| match field {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Build the `PUT` body for a record in `zone`
fn record_body(zone: &Zone, record: &RecordSpec) -> RecordBody {
    let answer = match &record.data {
        RecordData::A(ip) => vec![Value::String(ip.to_string())],
        RecordData::Srv {
            priority,
            weight,
            port,
            target,
        } => vec![
            Value::from(*priority),
            Value::from(*weight),
            Value::from(*port),
            Value::String(target.clone()),
        ],
    };

    RecordBody {
        zone: zone.name.clone(),
        domain: record.name.clone(),
        record_type: record.record_type().as_str().to_string(),
        ttl: Some(record.ttl),
        answers: vec![AnswerBody { answer }],
    }
}

/// Map a non-success HTTP status to the error taxonomy
///
/// `body` is the raw response body; NS1 reports a `message` field that is
/// preferred over the raw text when present.
fn map_status(status: u16, body: &str, context: &str) -> Error {
    let detail = serde_json::from_str::<ErrorBody>(body)
        .map(|e| e.message)
        .unwrap_or_else(|_| body.trim().to_string());

    match status {
        401 | 403 => Error::rejected(
            PROVIDER_NAME,
            format!(
                "{}: authentication failed, invalid API key or insufficient permissions (status {})",
                context, status
            ),
        ),
        404 => Error::record_missing(format!("{}: {}", context, detail)),
        429 => Error::network(format!("{}: rate limit exceeded (status {})", context, status)),
        500..=599 => Error::network(format!(
            "{}: NS1 server error (status {}): {}",
            context, status, detail
        )),
        _ => Error::rejected(
            PROVIDER_NAME,
            format!("{}: status {}: {}", context, status, detail),
        ),
    }
}

/// NS1 DNS provider
///
/// Stateless apart from the HTTP client; safe to share across tasks.
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the API key.
pub struct Ns1Provider {
    /// NS1 API key
    /// ⚠️ NEVER log this value
    api_key: String,

    /// REST endpoint, without a trailing slash
    endpoint: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

impl std::fmt::Debug for Ns1Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ns1Provider")
            .field("api_key", &"<REDACTED>")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl Ns1Provider {
    /// Create a new NS1 provider
    ///
    /// # Parameters
    ///
    /// - `api_key`: NS1 API key with DNS read/write permissions
    /// - `endpoint`: REST endpoint override; defaults to [`NS1_API_BASE`]
    pub fn new(api_key: impl Into<String>, endpoint: Option<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(Error::config("NS1 API key cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        let endpoint = endpoint
            .unwrap_or_else(|| NS1_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            api_key,
            endpoint,
            client,
        })
    }

    fn zone_url(&self, zone: &str) -> String {
        format!("{}/zones/{}", self.endpoint, zone)
    }

    fn record_url(&self, zone: &str, domain: &str, record_type: RecordType) -> String {
        format!(
            "{}/zones/{}/{}/{}",
            self.endpoint,
            zone,
            domain,
            record_type.as_str()
        )
    }

    /// Scheme and host of the endpoint, for the reachability probe
    fn probe_url(&self) -> String {
        match reqwest::Url::parse(&self.endpoint) {
            Ok(mut url) => {
                url.set_path("/");
                url.set_query(None);
                url.to_string()
            }
            Err(_) => self.endpoint.clone(),
        }
    }

    /// Send an authenticated request and map any failure
    async fn send(&self, request: reqwest::RequestBuilder, context: &str) -> Result<reqwest::Response> {
        let response = request
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| Error::network(format!("{}: HTTP request failed: {}", context, e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());
        Err(map_status(status.as_u16(), &body, context))
    }

    async fn parse<T: serde::de::DeserializeOwned>(response: reqwest::Response, context: &str) -> Result<T> {
        response.json().await.map_err(|e| {
            Error::rejected(
                PROVIDER_NAME,
                format!("{}: failed to parse response: {}", context, e),
            )
        })
    }
}

#[async_trait]
impl DnsProvider for Ns1Provider {
    async fn get_zone(&self, domain: &str) -> Result<Zone> {
        let context = format!("zone lookup for {}", domain);
        tracing::debug!("Looking up NS1 zone: {}", domain);

        let response = self
            .send(self.client.get(self.zone_url(domain)), &context)
            .await?;
        let body: ZoneBody = Self::parse(response, &context).await?;

        tracing::debug!("Found zone {} (id: {:?})", body.zone, body.id);
        Ok(Zone {
            name: body.zone,
            id: body.id,
        })
    }

    async fn get_record(&self, zone: &Zone, name: &str, record_type: RecordType) -> Result<Record> {
        let context = format!("{} record lookup for {}", record_type, name);

        let response = self
            .send(
                self.client.get(self.record_url(&zone.name, name, record_type)),
                &context,
            )
            .await?;
        let body: RecordBody = Self::parse(response, &context).await?;

        Ok(Record {
            name: body.domain,
            record_type,
            ttl: body.ttl,
            answers: body.answers.iter().map(AnswerBody::text).collect(),
        })
    }

    async fn create_record(&self, zone: &Zone, record: &RecordSpec) -> Result<()> {
        let record_type = record.record_type();
        let context = format!("creating {} record for {}", record_type, record.name);
        let body = record_body(zone, record);

        tracing::info!("Creating NS1 {} record: {} (ttl {})", record_type, record.name, record.ttl);

        self.send(
            self.client
                .put(self.record_url(&zone.name, &record.name, record_type))
                .json(&body),
            &context,
        )
        .await?;
        Ok(())
    }

    async fn delete_record(&self, zone: &Zone, name: &str, record_type: RecordType) -> Result<()> {
        let context = format!("deleting {} record for {}", record_type, name);

        tracing::info!("Deleting NS1 {} record: {}", record_type, name);

        self.send(
            self.client.delete(self.record_url(&zone.name, name, record_type)),
            &context,
        )
        .await?;
        Ok(())
    }

    async fn check_connectivity(&self) -> Result<()> {
        // Any HTTP response at all means the host is reachable.
        let url = self.probe_url();
        match self.client.head(&url).send().await {
            Ok(response) => {
                tracing::trace!("NS1 reachable ({})", response.status());
                Ok(())
            }
            Err(e) => Err(Error::connectivity_lost(format!("{} unreachable: {}", url, e))),
        }
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

/// Factory for creating NS1 providers
pub struct Ns1Factory;

impl DnsProviderFactory for Ns1Factory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn DnsProvider>> {
        match config {
            ProviderConfig::Ns1 { api_key, endpoint } => {
                if api_key.is_empty() {
                    return Err(Error::config("NS1 API key is required"));
                }
                Ok(Box::new(Ns1Provider::new(api_key.clone(), endpoint.clone())?))
            }
            _ => Err(Error::config("Invalid config for NS1 provider")),
        }
    }
}

/// Register the NS1 provider with a registry
///
/// # Example
///
/// ```rust
/// use dnsupdate_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// dnsupdate_provider_ns1::register(&registry);
/// assert!(registry.list_providers().contains(&"ns1".to_string()));
/// ```
pub fn register(registry: &dnsupdate_core::ProviderRegistry) {
    registry.register_provider(PROVIDER_NAME, Box::new(Ns1Factory));
}

#[cfg(test)]
mod tests {
    use super::*;
    use dnsupdate_core::FailureClass;
    use std::net::Ipv4Addr;

    fn provider(endpoint: Option<&str>) -> Ns1Provider {
        Ns1Provider::new("secret_key_12345", endpoint.map(str::to_string)).unwrap()
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (401, FailureClass::ProviderRejected),
            (403, FailureClass::ProviderRejected),
            (404, FailureClass::RecordMissing),
            (429, FailureClass::TransientNetwork),
            (500, FailureClass::TransientNetwork),
            (503, FailureClass::TransientNetwork),
            (400, FailureClass::ProviderRejected),
            (409, FailureClass::ProviderRejected),
        ];
        for (status, class) in cases {
            assert_eq!(map_status(status, "", "test").class(), class, "status {}", status);
        }
    }

    #[test]
    fn test_status_mapping_prefers_ns1_message() {
        let err = map_status(404, r#"{"message":"record not found"}"#, "A record lookup");
        assert_eq!(err.to_string(), "Record not found: A record lookup: record not found");
    }

    #[test]
    fn test_address_record_body() {
        let zone = Zone::new("example.com");
        let spec = RecordSpec {
            name: "home.example.com".to_string(),
            ttl: 600,
            data: RecordData::A(Ipv4Addr::new(5, 6, 7, 8)),
        };

        let json = serde_json::to_value(record_body(&zone, &spec)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "zone": "example.com",
                "domain": "home.example.com",
                "type": "A",
                "ttl": 600,
                "answers": [{ "answer": ["5.6.7.8"] }],
            })
        );
    }

    #[test]
    fn test_service_record_body() {
        let zone = Zone::new("home.example.com");
        let spec = RecordSpec {
            name: "home.example.com".to_string(),
            ttl: 600,
            data: RecordData::Srv {
                priority: 0,
                weight: 0,
                port: 11774,
                target: "home.example.com".to_string(),
            },
        };

        let json = serde_json::to_value(record_body(&zone, &spec)).unwrap();
        assert_eq!(json["type"], "SRV");
        assert_eq!(
            json["answers"][0]["answer"],
            serde_json::json!([0, 0, 11774, "home.example.com"])
        );
    }

    #[test]
    fn test_record_response_answers() {
        let body: RecordBody = serde_json::from_str(
            r#"{
                "zone": "example.com",
                "domain": "home.example.com",
                "type": "SRV",
                "ttl": 600,
                "answers": [{ "answer": ["0", 0, 11774, "home.example.com"], "id": "abc" }],
                "filters": []
            }"#,
        )
        .unwrap();

        assert_eq!(body.answers[0].text(), "0 0 11774 home.example.com");
        assert_eq!(body.ttl, Some(600));
    }

    #[test]
    fn test_zone_response() {
        let body: ZoneBody =
            serde_json::from_str(r#"{"zone":"example.com","id":"52051b2c9f782d58bb4df41b","ttl":3600}"#)
                .unwrap();
        assert_eq!(body.zone, "example.com");
        assert_eq!(body.id.as_deref(), Some("52051b2c9f782d58bb4df41b"));
    }

    #[test]
    fn test_urls() {
        let provider = provider(None);
        assert_eq!(
            provider.zone_url("example.com"),
            "https://api.nsone.net/v1/zones/example.com"
        );
        assert_eq!(
            provider.record_url("example.com", "home.example.com", RecordType::Srv),
            "https://api.nsone.net/v1/zones/example.com/home.example.com/SRV"
        );
        assert_eq!(provider.probe_url(), "https://api.nsone.net/");
    }

    #[test]
    fn test_endpoint_override_trailing_slash() {
        let provider = provider(Some("http://127.0.0.1:8080/v1/"));
        assert_eq!(provider.zone_url("example.com"), "http://127.0.0.1:8080/v1/zones/example.com");
    }

    #[test]
    fn test_empty_key_rejected() {
        assert!(matches!(Ns1Provider::new("", None), Err(Error::Config(_))));
    }

    #[test]
    fn test_api_key_not_exposed_in_debug() {
        let debug_str = format!("{:?}", provider(None));
        assert!(!debug_str.contains("secret_key_12345"));
        assert!(debug_str.contains("Ns1Provider"));
    }

    #[test]
    fn test_factory_creation() {
        let factory = Ns1Factory;
        let config = ProviderConfig::Ns1 {
            api_key: "test_key".to_string(),
            endpoint: None,
        };

        let provider = factory.create(&config).unwrap();
        assert_eq!(provider.provider_name(), "ns1");
    }

    #[test]
    fn test_factory_missing_key() {
        let config = ProviderConfig::Ns1 {
            api_key: String::new(),
            endpoint: None,
        };
        assert!(Ns1Factory.create(&config).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_connectivity_lost() {
        // Nothing listens on port 1 locally, so the connect is refused.
        let provider = provider(Some("http://127.0.0.1:1/v1"));

        let err = provider.check_connectivity().await.unwrap_err();
        assert_eq!(err.class(), FailureClass::ConnectivityLost);
    }

    #[tokio::test]
    async fn test_transport_failure_is_transient() {
        let provider = provider(Some("http://127.0.0.1:1/v1"));

        let err = provider.get_zone("example.com").await.unwrap_err();
        assert_eq!(err.class(), FailureClass::TransientNetwork);
    }
}
