// crates/akashi-index/src/http.rs
// ============================================================================
// Module: HTTP Vector Index Client
// Description: Vector index client over a points-style REST API.
// Purpose: Deliver outbox batches with strict limits and error
//          classification.
// Dependencies: akashi-core, reqwest, serde, serde_json, url
// ============================================================================

//! ## Overview
//! The HTTP client implements the [`VectorIndex`] contract against a
//! points-style REST API (Qdrant-compatible shapes). Requests are bounded:
//! the per-call timeout defaults to 30 seconds, below the outbox worker's
//! 60 second lock window; responses are size-capped, and cleartext HTTP is
//! refused unless explicitly allowed. Server and transport failures
//! classify as retryable; 4xx rejections are terminal.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use akashi_core::DecisionId;
use akashi_core::IndexError;
use akashi_core::IndexPoint;
use akashi_core::ScrollPage;
use akashi_core::VectorIndex;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::blocking::Response;
use serde::Deserialize;
use serde::Serialize;
use serde_json::json;
use url::Url;
use uuid::Uuid;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for the HTTP vector index client.
///
/// # Invariants
/// - `allow_http = false` blocks cleartext `http://` URLs.
/// - `timeout_ms` must stay below the outbox lock window.
/// - `max_response_bytes` is enforced as a hard upper bound on response
///   bodies.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HttpIndexConfig {
    /// Base URL of the index API.
    pub base_url: String,
    /// Collection name holding decision points.
    pub collection: String,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum response size allowed, in bytes.
    pub max_response_bytes: usize,
    /// Allow cleartext HTTP (disabled by default).
    pub allow_http: bool,
    /// Optional API key sent as a bearer token.
    pub api_key: Option<String>,
}

impl Default for HttpIndexConfig {
    fn default() -> Self {
        Self {
            base_url: "https://localhost:6333".to_string(),
            collection: "decisions".to_string(),
            timeout_ms: 30_000,
            max_response_bytes: 4 * 1024 * 1024,
            allow_http: false,
            api_key: None,
        }
    }
}

// ============================================================================
// SECTION: Wire Shapes
// ============================================================================

/// One point in the upsert request body.
#[derive(Debug, Serialize)]
struct WirePoint<'a> {
    /// Point identifier (decision UUID).
    id: String,
    /// Embedding vector.
    vector: &'a [f32],
    /// Structured payload attached to the point.
    payload: serde_json::Value,
}

/// Scroll response envelope.
#[derive(Debug, Deserialize)]
struct ScrollEnvelope {
    /// Scroll result body.
    result: ScrollResult,
}

/// Scroll result body.
#[derive(Debug, Deserialize)]
struct ScrollResult {
    /// Points on this page.
    points: Vec<ScrollPoint>,
    /// Offset for the next page, when more points exist.
    next_page_offset: Option<String>,
}

/// One scrolled point.
#[derive(Debug, Deserialize)]
struct ScrollPoint {
    /// Point identifier.
    id: String,
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// Vector index client over a points-style REST API.
///
/// # Invariants
/// - Redirects are not followed.
/// - Responses exceeding configured limits fail closed.
pub struct HttpVectorIndex {
    /// Client configuration, including limits and policy.
    config: HttpIndexConfig,
    /// HTTP client used for outbound requests.
    client: Client,
}

impl HttpVectorIndex {
    /// Creates a new client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Rejected`] when the base URL is invalid or the
    /// HTTP client cannot be created.
    pub fn new(config: HttpIndexConfig) -> Result<Self, IndexError> {
        let url = Url::parse(&config.base_url)
            .map_err(|err| IndexError::Rejected(format!("invalid base_url: {err}")))?;
        match url.scheme() {
            "https" => {}
            "http" if config.allow_http => {}
            other => {
                return Err(IndexError::Rejected(format!(
                    "scheme {other} is not allowed for the index endpoint"
                )));
            }
        }
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|err| IndexError::Rejected(format!("http client: {err}")))?;
        Ok(Self {
            config,
            client,
        })
    }

    /// Builds a collection-scoped endpoint URL.
    fn endpoint(&self, suffix: &str) -> Result<Url, IndexError> {
        let raw = format!(
            "{}/collections/{}/points{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.collection,
            suffix
        );
        Url::parse(&raw).map_err(|err| IndexError::Rejected(format!("endpoint: {err}")))
    }

    /// Sends a JSON request and classifies the outcome.
    fn send_json(
        &self,
        method: reqwest::Method,
        url: Url,
        body: &serde_json::Value,
    ) -> Result<Response, IndexError> {
        let mut request = self.client.request(method, url).json(body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .map_err(|err| IndexError::Unavailable(format!("index request: {err}")))?;
        classify_status(response.status())?;
        Ok(response)
    }

    /// Reads a size-capped response body.
    fn read_body(&self, response: Response) -> Result<Vec<u8>, IndexError> {
        let bytes = response
            .bytes()
            .map_err(|err| IndexError::Unavailable(format!("index response: {err}")))?;
        if bytes.len() > self.config.max_response_bytes {
            return Err(IndexError::Rejected(format!(
                "index response exceeds {} bytes",
                self.config.max_response_bytes
            )));
        }
        Ok(bytes.to_vec())
    }
}

/// Classifies an HTTP status into success, retryable, or terminal.
fn classify_status(status: StatusCode) -> Result<(), IndexError> {
    if status.is_success() {
        return Ok(());
    }
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        return Err(IndexError::Unavailable(format!("index returned {status}")));
    }
    Err(IndexError::Rejected(format!("index returned {status}")))
}

impl VectorIndex for HttpVectorIndex {
    fn upsert(&self, points: &[IndexPoint]) -> Result<(), IndexError> {
        if points.is_empty() {
            return Ok(());
        }
        let wire: Vec<WirePoint<'_>> = points
            .iter()
            .map(|point| WirePoint {
                id: point.id.as_uuid().to_string(),
                vector: &point.embedding,
                payload: json!({
                    "org_id": point.org_id,
                    "agent": point.agent,
                    "decision_type": point.decision_type,
                    "confidence": point.confidence,
                    "quality_score": point.quality_score,
                    "valid_from": point.valid_from,
                }),
            })
            .collect();
        let url = self.endpoint("")?;
        let body = json!({ "points": wire });
        let response = self.send_json(reqwest::Method::PUT, url, &body)?;
        self.read_body(response)?;
        Ok(())
    }

    fn delete_by_ids(&self, ids: &[DecisionId]) -> Result<(), IndexError> {
        if ids.is_empty() {
            return Ok(());
        }
        let url = self.endpoint("/delete")?;
        let body = json!({
            "points": ids.iter().map(|id| id.as_uuid().to_string()).collect::<Vec<_>>(),
        });
        let response = self.send_json(reqwest::Method::POST, url, &body)?;
        self.read_body(response)?;
        Ok(())
    }

    fn scroll(&self, cursor: Option<&str>, limit: usize) -> Result<ScrollPage, IndexError> {
        let url = self.endpoint("/scroll")?;
        let body = json!({
            "limit": limit,
            "offset": cursor,
            "with_payload": false,
            "with_vector": false,
        });
        let response = self.send_json(reqwest::Method::POST, url, &body)?;
        let bytes = self.read_body(response)?;
        let envelope: ScrollEnvelope = serde_json::from_slice(&bytes)
            .map_err(|err| IndexError::Rejected(format!("scroll response: {err}")))?;
        let mut ids = Vec::with_capacity(envelope.result.points.len());
        for point in envelope.result.points {
            let id = Uuid::parse_str(&point.id)
                .map_err(|_| IndexError::Rejected(format!("invalid point id: {}", point.id)))?;
            ids.push(DecisionId::from_uuid(id));
        }
        Ok(ScrollPage {
            ids,
            next_cursor: envelope.result.next_page_offset,
        })
    }
}
