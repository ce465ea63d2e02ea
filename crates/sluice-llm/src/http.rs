//! HTTP Transformer Implementation
//!
//! Calls a JSON-over-HTTP extraction or embedding service and reads the
//! provider's rate-limit headers into a `QuotaSnapshot`.
//!
//! # Classification
//!
//! - HTTP 429: `QuotaExceeded`
//! - Any other failed response whose rate-limit headers report an exhausted
//!   budget: `QuotaExceeded`
//! - HTTP 5xx, timeouts, connection failures: `Transient`
//! - Other 4xx, or a body that is not a JSON object: `Permanent`
//!
//! The transformer never retries on its own; the worker pool owns retry.
//!
//! # Examples
//!
//! ```no_run
//! use sluice_llm::HttpTransformer;
//!
//! let transformer = HttpTransformer::new("http://localhost:8080/v1/extract", "resume-extractor")
//!     .unwrap()
//!     .with_api_key("secret");
//! ```

use crate::LlmError;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::Serialize;
use sluice_domain::{QuotaSnapshot, TransformError, Transformation, Transformer};
use std::time::Duration;
use tracing::debug;

/// Default transformation endpoint
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8080/v1/extract";

/// Default HTTP timeout for one call (120 seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Header carrying the remaining request budget
pub const REMAINING_REQUESTS_HEADER: &str = "x-ratelimit-remaining-requests";

/// Header carrying the remaining token budget
pub const REMAINING_TOKENS_HEADER: &str = "x-ratelimit-remaining-tokens";

/// Longest provider error body quoted in a failure message
const MAX_BODY_EXCERPT: usize = 200;

/// Transformer backed by an HTTP service
pub struct HttpTransformer {
    endpoint: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

/// Request body sent for every payload
#[derive(Serialize)]
struct TransformRequest<'a> {
    payload_ref: &'a str,
    model: &'a str,
}

impl HttpTransformer {
    /// Create a transformer with the default timeout
    ///
    /// # Parameters
    ///
    /// - `endpoint`: URL that accepts the POSTed payload reference
    /// - `model`: Model or pipeline name forwarded to the service
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Result<Self, LlmError> {
        Self::with_timeout(endpoint, model, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a transformer with an explicit per-call timeout
    pub fn with_timeout(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let endpoint = endpoint.into();
        if endpoint.trim().is_empty() {
            return Err(LlmError::InvalidConfig("endpoint must not be empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Client(e.to_string()))?;

        Ok(Self {
            endpoint,
            model: model.into(),
            api_key: None,
            client,
        })
    }

    /// Send this key as a bearer token
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Endpoint this transformer posts to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Transformer for HttpTransformer {
    async fn invoke(&self, payload_ref: &str) -> Result<Transformation, TransformError> {
        let body = TransformRequest {
            payload_ref,
            model: &self.model,
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(classify_request_error)?;
        let status = response.status();
        let quota = quota_from_headers(response.headers());
        debug!(payload_ref, %status, %quota, "transformer responded");

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &text, quota));
        }

        let output: serde_json::Value = response
            .json()
            .await
            .map_err(|e| TransformError::Permanent(format!("Failed to parse response: {}", e)))?;

        if !output.is_object() {
            return Err(TransformError::Permanent(
                "Response body is not a JSON object".to_string(),
            ));
        }

        Ok(Transformation::new(output, quota))
    }
}

/// Read the remaining-budget headers; absent or unparsable values stay unknown
pub fn quota_from_headers(headers: &HeaderMap) -> QuotaSnapshot {
    let read = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<i64>().ok())
    };

    QuotaSnapshot::from_parts(read(REMAINING_REQUESTS_HEADER), read(REMAINING_TOKENS_HEADER))
}

/// Map a non-success HTTP status to a transformer error
///
/// The quota headers are consulted first, so an exhausted budget reaches the
/// governor even when the provider reports it with a 5xx or 4xx.
pub fn classify_status(status: StatusCode, body: &str, quota: QuotaSnapshot) -> TransformError {
    let excerpt: String = body.chars().take(MAX_BODY_EXCERPT).collect();
    let message = if excerpt.is_empty() {
        format!("HTTP {}", status)
    } else {
        format!("HTTP {}: {}", status, excerpt)
    };

    if status == StatusCode::TOO_MANY_REQUESTS || quota.is_exhausted() {
        TransformError::QuotaExceeded {
            snapshot: Some(quota),
            message,
        }
    } else if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        TransformError::Transient(message)
    } else {
        TransformError::Permanent(message)
    }
}

fn classify_request_error(err: reqwest::Error) -> TransformError {
    if err.is_builder() {
        TransformError::Permanent(format!("Invalid request: {}", err))
    } else {
        // Timeouts, refused connections, and dropped streams are worth another try
        TransformError::Transient(format!("Request failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};
    use reqwest::header::HeaderValue;
    use serde_json::json;

    const EXTRACT_PATH: &str = "/v1/extract";

    #[test]
    fn test_transformer_creation() {
        let transformer = HttpTransformer::new(DEFAULT_ENDPOINT, "extractor").unwrap();
        assert_eq!(transformer.endpoint(), DEFAULT_ENDPOINT);
        assert_eq!(transformer.model, "extractor");
        assert!(transformer.api_key.is_none());

        let transformer = transformer.with_api_key("k");
        assert_eq!(transformer.api_key.as_deref(), Some("k"));
    }

    #[test]
    fn test_empty_endpoint_rejected() {
        assert!(matches!(
            HttpTransformer::new("  ", "extractor"),
            Err(LlmError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_quota_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(REMAINING_REQUESTS_HEADER, HeaderValue::from_static("42"));
        headers.insert(REMAINING_TOKENS_HEADER, HeaderValue::from_static("not-a-number"));

        let quota = quota_from_headers(&headers);
        assert_eq!(quota.remaining_calls, Some(42));
        assert_eq!(quota.remaining_tokens, None);

        assert_eq!(quota_from_headers(&HeaderMap::new()), QuotaSnapshot::unknown());
    }

    #[test]
    fn test_classify_status() {
        let exhausted = QuotaSnapshot::from_parts(Some(0), None);
        let healthy = QuotaSnapshot::new(10, 1000);

        match classify_status(StatusCode::TOO_MANY_REQUESTS, "slow down", healthy) {
            TransformError::QuotaExceeded { snapshot, message } => {
                assert_eq!(snapshot, Some(healthy));
                assert!(message.contains("slow down"));
            }
            other => panic!("Expected QuotaExceeded, got {:?}", other),
        }

        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, "", healthy),
            TransformError::Transient(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, "bad payload", QuotaSnapshot::unknown()),
            TransformError::Permanent(_)
        ));

        // An exhausted budget wins over the status class
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, "", exhausted),
            TransformError::QuotaExceeded { snapshot: Some(s), .. } if s == exhausted
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, "", exhausted),
            TransformError::QuotaExceeded { .. }
        ));
    }

    #[tokio::test]
    async fn test_invoke_success_reads_quota() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path(EXTRACT_PATH)
                    .header("authorization", "Bearer secret")
                    .json_body(json!({
                        "payload_ref": "https://example.com/cv",
                        "model": "extractor",
                    }));
                then.status(200)
                    .header(REMAINING_REQUESTS_HEADER, "9")
                    .header(REMAINING_TOKENS_HEADER, "5400")
                    .json_body(json!({ "job_role": "Engineer" }));
            })
            .await;

        let transformer = HttpTransformer::new(server.url(EXTRACT_PATH), "extractor")
            .unwrap()
            .with_api_key("secret");
        let result = transformer.invoke("https://example.com/cv").await.unwrap();

        mock.assert_async().await;
        assert_eq!(result.output["job_role"], "Engineer");
        assert_eq!(result.quota, QuotaSnapshot::new(9, 5400));
    }

    #[tokio::test]
    async fn test_invoke_rate_limited() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(EXTRACT_PATH);
                then.status(429)
                    .header(REMAINING_REQUESTS_HEADER, "0")
                    .json_body(json!({ "error": "rate limited" }));
            })
            .await;

        let transformer = HttpTransformer::new(server.url(EXTRACT_PATH), "extractor").unwrap();
        let err = transformer.invoke("doc").await.unwrap_err();

        match err {
            TransformError::QuotaExceeded { snapshot, message } => {
                assert_eq!(snapshot, Some(QuotaSnapshot::from_parts(Some(0), None)));
                assert!(message.contains("rate limited"));
            }
            other => panic!("Expected QuotaExceeded, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invoke_server_error_is_transient() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(EXTRACT_PATH);
                then.status(503)
                    .header(REMAINING_REQUESTS_HEADER, "12")
                    .body("upstream unavailable");
            })
            .await;

        let transformer = HttpTransformer::new(server.url(EXTRACT_PATH), "extractor").unwrap();
        let err = transformer.invoke("doc").await.unwrap_err();

        assert!(matches!(err, TransformError::Transient(_)));
    }

    #[tokio::test]
    async fn test_invoke_server_error_with_exhausted_budget_stops() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(EXTRACT_PATH);
                then.status(503)
                    .header(REMAINING_REQUESTS_HEADER, "0")
                    .header(REMAINING_TOKENS_HEADER, "800");
            })
            .await;

        let transformer = HttpTransformer::new(server.url(EXTRACT_PATH), "extractor").unwrap();
        let err = transformer.invoke("doc").await.unwrap_err();

        match err {
            TransformError::QuotaExceeded { snapshot, .. } => {
                assert_eq!(snapshot, Some(QuotaSnapshot::new(0, 800)));
            }
            other => panic!("Expected QuotaExceeded, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invoke_client_error_is_permanent() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(EXTRACT_PATH);
                then.status(400).json_body(json!({ "error": "unsupported document" }));
            })
            .await;

        let transformer = HttpTransformer::new(server.url(EXTRACT_PATH), "extractor").unwrap();
        let err = transformer.invoke("doc").await.unwrap_err();

        match err {
            TransformError::Permanent(message) => assert!(message.contains("unsupported document")),
            other => panic!("Expected Permanent, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invoke_non_object_body_is_permanent() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(EXTRACT_PATH);
                then.status(200)
                    .header("content-type", "application/json")
                    .body("[1, 2, 3]");
            })
            .await;

        let transformer = HttpTransformer::new(server.url(EXTRACT_PATH), "extractor").unwrap();
        let err = transformer.invoke("doc").await.unwrap_err();

        assert!(matches!(err, TransformError::Permanent(_)));
    }

    #[tokio::test]
    async fn test_invoke_connection_refused_is_transient() {
        // Bind then drop to get a port nothing listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transformer = HttpTransformer::new(format!("http://{}/v1/extract", addr), "extractor").unwrap();
        let err = transformer.invoke("doc").await.unwrap_err();

        assert!(matches!(err, TransformError::Transient(_)));
    }
}
