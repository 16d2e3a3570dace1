//! Typed async client for the Primordia REST backend.
//!
//! Every call is a fresh network round trip: there is no caching layer. Transport, status and
//! decoding failures are all normalised into [`DataError`].

use crate::{
    error::DataError,
    model::{
        ChatReply, ChatRequest, Health, Region, RegionId, SignalBundle, WaitlistRequest,
        WaitlistResponse,
    },
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Default backend address for local development.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Default bound on a single request so a hung call cannot stall the polling cycle.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Source of regions and signal bundles consumed by the dashboard controller.
///
/// Implemented by [`SignalClient`] for the real backend.
#[async_trait]
pub trait SignalSource: Send + Sync + 'static {
    async fn fetch_regions(&self) -> Result<Vec<Region>, DataError>;

    async fn fetch_signals(&self, region_id: &RegionId) -> Result<SignalBundle, DataError>;

    async fn chat(&self, request: ChatRequest) -> Result<ChatReply, DataError>;

    async fn join_waitlist(&self, email: &str) -> Result<WaitlistResponse, DataError>;
}

/// [`SignalClient`] configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SignalClientConfig {
    /// Backend base URL
    pub base_url: String,
    /// Bound on every request
    pub timeout: Duration,
}

impl Default for SignalClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl SignalClientConfig {
    /// Create a new configuration with custom base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Deserialize)]
struct RegionsResponse {
    regions: Vec<Region>,
}

/// HTTP client for the Primordia backend.
#[derive(Debug, Clone)]
pub struct SignalClient {
    http: reqwest::Client,
    base_url: Url,
}

impl SignalClient {
    pub fn new(config: SignalClientConfig) -> Result<Self, DataError> {
        let mut base_url = Url::parse(&config.base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(DataError::InvalidUrl(config.base_url));
        }

        // Url::join replaces the last path segment unless the base ends with a slash
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|error| DataError::Transport {
                endpoint: base_url.to_string(),
                message: error.to_string(),
            })?;

        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `GET /health`. Used by tooling, not by the dashboard core.
    pub async fn health(&self) -> Result<Health, DataError> {
        let url = self.endpoint("health")?;
        self.get_json("/health", url).await
    }

    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, DataError> {
        Ok(self.base_url.join(path)?)
    }

    pub(crate) fn signals_url(&self, region_id: &RegionId) -> Result<Url, DataError> {
        let mut url = self.endpoint("signals")?;
        url.query_pairs_mut()
            .append_pair("region_id", region_id.as_str());
        Ok(url)
    }

    async fn get_json<T>(&self, endpoint: &str, url: Url) -> Result<T, DataError>
    where
        T: DeserializeOwned,
    {
        debug!(%url, "GET");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|error| DataError::from_reqwest(endpoint, error))?;

        Self::decode(endpoint, response).await
    }

    async fn post_json<B, T>(&self, endpoint: &str, url: Url, body: &B) -> Result<T, DataError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!(%url, "POST");
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|error| DataError::from_reqwest(endpoint, error))?;

        Self::decode(endpoint, response).await
    }

    async fn decode<T>(endpoint: &str, response: reqwest::Response) -> Result<T, DataError>
    where
        T: DeserializeOwned,
    {
        let status = response.status();
        if !status.is_success() {
            warn!(endpoint, %status, "backend returned non-success status");
            return Err(DataError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|error| DataError::from_reqwest(endpoint, error))?;

        serde_json::from_slice(&bytes).map_err(|error| DataError::Decode {
            endpoint: endpoint.to_string(),
            message: error.to_string(),
        })
    }
}

#[async_trait]
impl SignalSource for SignalClient {
    async fn fetch_regions(&self) -> Result<Vec<Region>, DataError> {
        let url = self.endpoint("regions")?;
        let response: RegionsResponse = self.get_json("/regions", url).await?;
        debug!(regions = response.regions.len(), "fetched regions");
        Ok(response.regions)
    }

    async fn fetch_signals(&self, region_id: &RegionId) -> Result<SignalBundle, DataError> {
        let url = self.signals_url(region_id)?;
        let bundle: SignalBundle = self.get_json("/signals", url).await?;

        bundle
            .validate()
            .map_err(|message| DataError::Malformed {
                endpoint: "/signals".to_string(),
                message,
            })?;

        // Backend falls back to a default region for ids it does not know
        if &bundle.region_id != region_id {
            return Err(DataError::RegionMismatch {
                requested: region_id.clone(),
                received: bundle.region_id,
            });
        }

        Ok(bundle)
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatReply, DataError> {
        let url = self.endpoint("chat")?;
        self.post_json("/chat", url, &request).await
    }

    async fn join_waitlist(&self, email: &str) -> Result<WaitlistResponse, DataError> {
        let url = self.endpoint("waitlist")?;
        let request = WaitlistRequest {
            email: email.to_string(),
        };
        self.post_json("/waitlist", url, &request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChatMessage;
    use serde_json::json;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
        sync::oneshot,
    };
    use tokio_test::{assert_err, assert_ok};

    /// Serve exactly one HTTP response and report the raw request that was received.
    async fn serve_once(status: &'static str, body: String) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (request_tx, request_rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
            let _ = request_tx.send(request);
        });

        (format!("http://{addr}"), request_rx)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut buffer = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let read = socket.read(&mut chunk).await.unwrap();
            if read == 0 {
                break;
            }
            buffer.extend_from_slice(&chunk[..read]);

            let text = String::from_utf8_lossy(&buffer);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buffer.len() >= header_end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }

    fn client(base_url: &str) -> SignalClient {
        SignalClient::new(
            SignalClientConfig::new(base_url).with_timeout(Duration::from_millis(500)),
        )
        .unwrap()
    }

    fn bundle_body(region_id: &str) -> String {
        json!({
            "region_id": region_id,
            "timestamp": "2025-01-14T09:30:00",
            "satellite_score": 0.12,
            "news_score": -0.3,
            "market_score": 0.05,
            "divergence_score": 41.0,
            "data_mode": "SAT+NEWS+MKT",
            "satellite_raw": {
                "activity_delta_pct": 3.5,
                "confidence": 0.9,
                "anomaly_strength": 0.2,
                "trend": "stable"
            },
            "news_raw": {
                "sentiment_score": -0.2,
                "hype_intensity": 35.0,
                "headlines": []
            },
            "alerts": [],
            "explanation": { "synthesis": "Moderate signal variance." }
        })
        .to_string()
    }

    #[test]
    fn test_config_builder() {
        let config = SignalClientConfig::new("http://primordia.internal:9000")
            .with_timeout(Duration::from_secs(3));

        assert_eq!(config.base_url, "http://primordia.internal:9000");
        assert_eq!(config.timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_default_config() {
        let config = SignalClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:8000");
        assert_eq!(config.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_endpoint_urls() {
        struct TestCase {
            base_url: &'static str,
            region_id: &'static str,
            expected: &'static str,
        }

        let tests = vec![
            TestCase {
                // TC0: bare host
                base_url: "http://localhost:8000",
                region_id: "shanghai",
                expected: "http://localhost:8000/signals?region_id=shanghai",
            },
            TestCase {
                // TC1: base path without trailing slash is kept
                base_url: "https://api.example.com/primordia",
                region_id: "la_port",
                expected: "https://api.example.com/primordia/signals?region_id=la_port",
            },
            TestCase {
                // TC2: region id is url-encoded
                base_url: "http://localhost:8000/",
                region_id: "new york&port=1",
                expected: "http://localhost:8000/signals?region_id=new+york%26port%3D1",
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = client(test.base_url)
                .signals_url(&RegionId::new(test.region_id))
                .unwrap();
            assert_eq!(actual.as_str(), test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_invalid_base_url() {
        let result = SignalClient::new(SignalClientConfig::new("mailto:ops@example.com"));
        assert!(matches!(result, Err(DataError::InvalidUrl(_))));

        let result = SignalClient::new(SignalClientConfig::new("localhost"));
        assert!(matches!(result, Err(DataError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_fetch_regions() {
        let body = json!({
            "regions": [{
                "id": "shanghai",
                "name": "Shanghai Port",
                "description": "World's busiest container port",
                "bbox": [120.85, 30.67, 122.20, 31.87],
                "centroid": [121.47, 31.23],
                "category": "ports"
            }]
        })
        .to_string();
        let (base_url, request_rx) = serve_once("200 OK", body).await;

        let regions = assert_ok!(client(&base_url).fetch_regions().await);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].id, RegionId::new("shanghai"));

        let request = request_rx.await.unwrap();
        assert!(request.starts_with("GET /regions HTTP/1.1"), "{request}");
    }

    #[tokio::test]
    async fn test_fetch_signals() {
        let (base_url, request_rx) = serve_once("200 OK", bundle_body("la_port")).await;

        let bundle = assert_ok!(
            client(&base_url)
                .fetch_signals(&RegionId::new("la_port"))
                .await
        );
        assert_eq!(bundle.divergence_score, 41.0);
        assert_eq!(bundle.market_score, Some(0.05));

        let request = request_rx.await.unwrap();
        assert!(
            request.starts_with("GET /signals?region_id=la_port HTTP/1.1"),
            "{request}"
        );
    }

    #[tokio::test]
    async fn test_fetch_signals_rejects_region_fallback() {
        let (base_url, _request_rx) = serve_once("200 OK", bundle_body("shanghai")).await;

        let error = assert_err!(
            client(&base_url)
                .fetch_signals(&RegionId::new("atlantis"))
                .await
        );
        assert_eq!(
            error,
            DataError::RegionMismatch {
                requested: RegionId::new("atlantis"),
                received: RegionId::new("shanghai"),
            }
        );
    }

    #[tokio::test]
    async fn test_fetch_signals_status_error() {
        let (base_url, _request_rx) =
            serve_once("503 Service Unavailable", json!({"detail": "down"}).to_string()).await;

        let error = assert_err!(
            client(&base_url)
                .fetch_signals(&RegionId::new("suez"))
                .await
        );
        assert_eq!(
            error,
            DataError::Status {
                endpoint: "/signals".to_string(),
                status: 503,
            }
        );
        assert!(error.is_transient());
    }

    #[tokio::test]
    async fn test_fetch_signals_malformed_body() {
        let (base_url, _request_rx) =
            serve_once("200 OK", json!({"region_id": "suez"}).to_string()).await;

        let error = assert_err!(
            client(&base_url)
                .fetch_signals(&RegionId::new("suez"))
                .await
        );
        assert!(matches!(error, DataError::Decode { .. }), "{error:?}");
    }

    #[tokio::test]
    async fn test_fetch_regions_connection_refused() {
        // Bind then drop to obtain a port nothing listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let error = assert_err!(client(&format!("http://{addr}")).fetch_regions().await);
        assert!(error.is_transient(), "{error:?}");
    }

    #[tokio::test]
    async fn test_request_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            // Accept and hold the connection without ever answering
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let error = assert_err!(client(&format!("http://{addr}")).fetch_regions().await);
        assert_eq!(
            error,
            DataError::Timeout {
                endpoint: "/regions".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_chat() {
        let (base_url, request_rx) = serve_once(
            "200 OK",
            json!({"response": "Satellite activity is contracting.", "model": "deepseek"})
                .to_string(),
        )
        .await;

        let request = ChatRequest {
            message: "Why is divergence high?".to_string(),
            region_id: RegionId::new("suez"),
            history: vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")],
        };
        let reply = assert_ok!(client(&base_url).chat(request).await);
        assert_eq!(reply.response, "Satellite activity is contracting.");

        let raw = request_rx.await.unwrap();
        assert!(raw.starts_with("POST /chat HTTP/1.1"), "{raw}");
        let body = raw.split("\r\n\r\n").nth(1).unwrap();
        let body: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(body["region_id"], "suez");
        assert_eq!(body["history"][1]["role"], "assistant");
    }

    #[tokio::test]
    async fn test_join_waitlist() {
        let (base_url, request_rx) = serve_once(
            "200 OK",
            json!({"success": true, "message": "You're on the list"}).to_string(),
        )
        .await;

        let response = assert_ok!(client(&base_url).join_waitlist("ana@example.com").await);
        assert!(response.success);

        let raw = request_rx.await.unwrap();
        assert!(raw.ends_with(r#"{"email":"ana@example.com"}"#), "{raw}");
    }

    #[tokio::test]
    async fn test_health() {
        let (base_url, _request_rx) =
            serve_once("200 OK", json!({"status": "ok", "news_service": true}).to_string())
                .await;

        let health = assert_ok!(client(&base_url).health().await);
        assert!(health.is_ok());
    }
}
