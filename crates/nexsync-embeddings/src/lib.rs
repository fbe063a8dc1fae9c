//! Embedding service with multi-provider fallback.
//!
//! Supports Gemini, OpenAI, and Ollama embedding APIs. Providers are tried in
//! priority order; a provider that fails after its retries hands over to the
//! next one. With no providers configured the service produces deterministic
//! hash-based placeholder vectors so the sync pipeline stays runnable in
//! development.
//!
//! Every call states whether the texts are stored documents or search
//! queries ([`EmbedMode`]). Providers with asymmetric retrieval models use
//! that to pick the right task type or prefix.
//!
//! # Example
//!
//! ```no_run
//! use nexsync_embeddings::{EmbedMode, EmbeddingConfig, EmbeddingProviderConfig, EmbeddingService};
//!
//! # async fn example() -> Result<(), nexsync_embeddings::Error> {
//! let config = EmbeddingConfig {
//!     providers: vec![EmbeddingProviderConfig {
//!         name: "gemini".to_string(),
//!         base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
//!         model: "text-embedding-004".to_string(),
//!         api_key: "your-api-key".to_string(),
//!         priority: 1,
//!     }],
//!     dimension: 768,
//! };
//!
//! let service = EmbeddingService::from_config(&config)?;
//! let vectors = service
//!     .embed(vec!["res.partner record 7: Name: Acme".to_string()], EmbedMode::Document)
//!     .await?;
//! # Ok(())
//! # }
//! ```


use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Attempts per provider request before handing over to the next provider
const MAX_ATTEMPTS: u32 = 3;

/// First retry delay; doubles on each further attempt
const RETRY_DELAY_MS: u64 = 250;

/// Maximum texts per provider request
const MAX_BATCH_SIZE: usize = 100;

/// Error bodies longer than this are cut in messages
const MAX_ERROR_BODY: usize = 300;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Internal error: {0}")]
    Internal(String),

    /// Request never got a response (connect, timeout, body read)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Provider answered with a non-success status
    #[error("{provider} returned HTTP {status}: {message}")]
    Http {
        provider: String,
        status: u16,
        message: String,
    },

    /// Provider answered 200 with an unusable body
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("All embedding providers failed")]
    AllProvidersFailed,
}

impl Error {
    /// Rate limits, server-side failures and transport errors are worth
    /// another attempt; anything else goes straight to the next provider.
    fn is_retryable(&self) -> bool {
        match self {
            Error::Http { status, .. } => *status == 429 || *status >= 500,
            Error::Transport(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Embedding providers; sorted by priority on construction.
    pub providers: Vec<EmbeddingProviderConfig>,
    /// Vector dimension of the target collection, also used for placeholders.
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            dimension: 768,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingProviderConfig {
    /// "gemini", "openai" or "ollama"
    pub name: String,
    pub base_url: String,
    pub model: String,
    /// Empty for keyless providers (Ollama)
    pub api_key: String,
    /// Lower is tried first
    pub priority: u8,
}

impl EmbeddingProviderConfig {
    fn has_credentials(&self) -> bool {
        self.name == "ollama" || !self.api_key.is_empty()
    }

    /// Whether the API can shorten vectors to a requested dimension
    fn can_reduce_dimension(&self) -> bool {
        match self.name.as_str() {
            "openai" => self.model.starts_with("text-embedding-3"),
            _ => false,
        }
    }
}

/// What the embedded texts will be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedMode {
    /// Texts stored in the vector collection
    Document,
    /// Texts used to search the collection
    Query,
}

impl EmbedMode {
    fn gemini_task_type(&self) -> &'static str {
        match self {
            EmbedMode::Document => "RETRIEVAL_DOCUMENT",
            EmbedMode::Query => "RETRIEVAL_QUERY",
        }
    }

    /// Prefix expected by nomic-style asymmetric models
    fn nomic_prefix(&self) -> &'static str {
        match self {
            EmbedMode::Document => "search_document: ",
            EmbedMode::Query => "search_query: ",
        }
    }
}

/// Default API base URL for a provider.
pub fn default_endpoint(name: &str) -> &'static str {
    match name {
        "gemini" => "https://generativelanguage.googleapis.com/v1beta",
        "ollama" => "http://localhost:11434",
        _ => "https://api.openai.com/v1",
    }
}

/// Default embedding model for a provider.
pub fn default_model(name: &str) -> &'static str {
    match name {
        "gemini" => "text-embedding-004",
        "ollama" => "nomic-embed-text",
        _ => "text-embedding-3-small",
    }
}

/// Native output dimension of well-known embedding models.
pub fn native_dimension(model: &str) -> Option<usize> {
    const KNOWN: &[(&str, usize)] = &[
        ("text-embedding-004", 768),
        ("embedding-001", 768),
        ("text-embedding-3-small", 1536),
        ("text-embedding-3-large", 3072),
        ("text-embedding-ada-002", 1536),
        ("nomic-embed-text", 768),
        ("mxbai-embed-large", 1024),
        ("all-minilm", 384),
    ];
    KNOWN
        .iter()
        .find(|(name, _)| model.contains(name))
        .map(|(_, dim)| *dim)
}

// ============================================================================
// Provider responses
// ============================================================================

#[derive(Debug, Deserialize)]
struct GeminiBatchResponse {
    #[serde(default)]
    embeddings: Vec<GeminiEmbedding>,
}

#[derive(Debug, Deserialize)]
struct GeminiEmbedding {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct OpenAIEmbedResponse {
    #[serde(default)]
    data: Vec<OpenAIEmbedding>,
}

#[derive(Debug, Deserialize)]
struct OpenAIEmbedding {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct OllamaEmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

// ============================================================================
// Service
// ============================================================================

/// Text embeddings with priority-ordered provider fallback.
#[derive(Clone)]
pub struct EmbeddingService {
    inner: Arc<EmbeddingServiceInner>,
}

struct EmbeddingServiceInner {
    providers: RwLock<Vec<EmbeddingProviderConfig>>,
    dimension: usize,
    client: Client,
}

impl EmbeddingService {
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        let mut providers = config.providers.clone();
        providers.sort_by_key(|p| p.priority);
        warn_on_dimension_mismatch(&providers, config.dimension);

        if providers.is_empty() {
            warn!(
                dimension = config.dimension,
                "No embedding providers configured - using hash-based placeholders"
            );
        } else {
            info!(
                providers = ?providers.iter().map(|p| &p.name).collect::<Vec<_>>(),
                dimension = config.dimension,
                "Embedding service initialized"
            );
        }

        Ok(Self {
            inner: Arc::new(EmbeddingServiceInner {
                providers: RwLock::new(providers),
                dimension: config.dimension,
                client,
            }),
        })
    }

    /// Replace the providers at runtime.
    pub async fn set_providers(&self, mut providers: Vec<EmbeddingProviderConfig>) {
        providers.sort_by_key(|p| p.priority);
        warn_on_dimension_mismatch(&providers, self.inner.dimension);
        *self.inner.providers.write().await = providers;
    }

    pub fn dimension(&self) -> usize {
        self.inner.dimension
    }

    /// Provider names in priority order
    pub async fn providers(&self) -> Vec<String> {
        self.inner
            .providers
            .read()
            .await
            .iter()
            .map(|p| p.name.clone())
            .collect()
    }

    pub async fn has_providers(&self) -> bool {
        !self.inner.providers.read().await.is_empty()
    }

    /// One embedding per text, in input order.
    ///
    /// Inputs larger than a provider request are split into consecutive
    /// requests against the same provider. With providers configured but all
    /// failing, the last error is returned; placeholder vectors are only used
    /// when no provider is configured at all.
    pub async fn embed(&self, texts: Vec<String>, mode: EmbedMode) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let providers = self.inner.providers.read().await.clone();
        if providers.is_empty() {
            debug!(count = texts.len(), "Generating hash-based placeholder embeddings");
            return Ok(texts
                .iter()
                .map(|t| hash_embedding(t, self.inner.dimension))
                .collect());
        }

        let mut last_error = None;
        for provider in providers.iter().filter(|p| p.has_credentials()) {
            match self.embed_with_provider(provider, &texts, mode).await {
                Ok(embeddings) => return Ok(embeddings),
                Err(e) => {
                    warn!(provider = %provider.name, error = %e, "Embedding provider failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(Error::AllProvidersFailed))
    }

    pub async fn embed_single(&self, text: &str, mode: EmbedMode) -> Result<Vec<f32>> {
        self.embed(vec![text.to_string()], mode)
            .await?
            .pop()
            .ok_or_else(|| Error::Provider("No embedding returned".to_string()))
    }

    async fn embed_with_provider(
        &self,
        provider: &EmbeddingProviderConfig,
        texts: &[String],
        mode: EmbedMode,
    ) -> Result<Vec<Vec<f32>>> {
        let mut all = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(MAX_BATCH_SIZE) {
            let embeddings = self.request_with_retry(provider, chunk, mode).await?;
            if embeddings.len() != chunk.len() {
                return Err(Error::Provider(format!(
                    "{} returned {} embeddings for {} texts",
                    provider.name,
                    embeddings.len(),
                    chunk.len()
                )));
            }
            all.extend(embeddings);
        }
        Ok(all)
    }

    async fn request_with_retry(
        &self,
        provider: &EmbeddingProviderConfig,
        texts: &[String],
        mode: EmbedMode,
    ) -> Result<Vec<Vec<f32>>> {
        let mut attempt = 1;
        let mut delay = Duration::from_millis(RETRY_DELAY_MS);

        loop {
            match self.request(provider, texts, mode).await {
                Ok(embeddings) => return Ok(embeddings),
                Err(e) if attempt < MAX_ATTEMPTS && e.is_retryable() => {
                    debug!(
                        provider = %provider.name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying embedding request"
                    );
                    sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn request(
        &self,
        provider: &EmbeddingProviderConfig,
        texts: &[String],
        mode: EmbedMode,
    ) -> Result<Vec<Vec<f32>>> {
        let client = &self.inner.client;

        match provider.name.as_str() {
            "gemini" => {
                let requests: Vec<Value> = texts
                    .iter()
                    .map(|text| {
                        json!({
                            "model": format!("models/{}", provider.model),
                            "content": { "parts": [{ "text": text }] },
                            "taskType": mode.gemini_task_type(),
                        })
                    })
                    .collect();
                let url = format!(
                    "{}/models/{}:batchEmbedContents",
                    provider.base_url, provider.model
                );
                let request = client
                    .post(url)
                    .query(&[("key", provider.api_key.as_str())])
                    .json(&json!({ "requests": requests }));

                let resp: GeminiBatchResponse = send_json("gemini", request).await?;
                Ok(resp.embeddings.into_iter().map(|e| e.values).collect())
            }
            "openai" => {
                let mut body = json!({ "model": provider.model, "input": texts });
                if provider.can_reduce_dimension() {
                    body["dimensions"] = json!(self.inner.dimension);
                }
                let request = client
                    .post(format!("{}/embeddings", provider.base_url))
                    .bearer_auth(&provider.api_key)
                    .json(&body);

                let mut resp: OpenAIEmbedResponse = send_json("openai", request).await?;
                resp.data.sort_by_key(|e| e.index);
                Ok(resp.data.into_iter().map(|e| e.embedding).collect())
            }
            "ollama" => {
                let input: Vec<String> = if provider.model.contains("nomic") {
                    texts
                        .iter()
                        .map(|t| format!("{}{}", mode.nomic_prefix(), t))
                        .collect()
                } else {
                    texts.to_vec()
                };
                let request = client
                    .post(format!("{}/api/embed", provider.base_url))
                    .json(&json!({ "model": provider.model, "input": input }));

                let resp: OllamaEmbedResponse = send_json("ollama", request).await?;
                Ok(resp.embeddings)
            }
            other => Err(Error::Internal(format!(
                "Unknown embedding provider: {}",
                other
            ))),
        }
    }
}

/// Send a request and decode a JSON success body.
async fn send_json<T: DeserializeOwned>(provider: &str, request: RequestBuilder) -> Result<T> {
    let response = request
        .send()
        .await
        .map_err(|e| Error::Transport(format!("{} request failed: {}", provider, e)))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| Error::Transport(format!("{} response unreadable: {}", provider, e)))?;

    if !status.is_success() {
        return Err(Error::Http {
            provider: provider.to_string(),
            status: status.as_u16(),
            message: error_message(&body),
        });
    }

    serde_json::from_str(&body)
        .map_err(|e| Error::Provider(format!("Failed to parse {} response: {}", provider, e)))
}

/// `error.message` or a string `error` from a JSON error body, else the
/// raw body cut short.
fn error_message(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let message = parsed.as_ref().and_then(|v| match v.get("error")? {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => obj.get("message")?.as_str().map(str::to_string),
        _ => None,
    });

    message.unwrap_or_else(|| body.chars().take(MAX_ERROR_BODY).collect())
}

fn warn_on_dimension_mismatch(providers: &[EmbeddingProviderConfig], dimension: usize) {
    for provider in providers.iter().filter(|p| !p.can_reduce_dimension()) {
        if let Some(native) = native_dimension(&provider.model) {
            if native != dimension {
                warn!(
                    provider = %provider.name,
                    model = %provider.model,
                    native,
                    configured = dimension,
                    "Provider model dimension differs from the collection dimension"
                );
            }
        }
    }
}

/// Deterministic unit-length placeholder vector. Not semantic.
///
/// Seeds a splitmix64 stream with a hash of the text.
pub fn hash_embedding(text: &str, dimension: usize) -> Vec<f32> {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    let mut state = hasher.finish();

    let mut vector: Vec<f32> = (0..dimension)
        .map(|_| {
            state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
            let mut z = state;
            z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
            z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
            z ^= z >> 31;
            (z as f64 / u64::MAX as f64 * 2.0 - 1.0) as f32
        })
        .collect();

    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|x| *x /= norm);
    }
    vector
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service_with(providers: Vec<EmbeddingProviderConfig>, dimension: usize) -> EmbeddingService {
        EmbeddingService::from_config(&EmbeddingConfig {
            providers,
            dimension,
        })
        .unwrap()
    }

    fn provider(name: &str, base_url: &str, model: &str, priority: u8) -> EmbeddingProviderConfig {
        EmbeddingProviderConfig {
            name: name.to_string(),
            base_url: base_url.to_string(),
            model: model.to_string(),
            api_key: "test-key".to_string(),
            priority,
        }
    }

    #[test]
    fn test_hash_embedding_is_deterministic_unit_vector() {
        let a = hash_embedding("res.partner record 1", 384);
        let b = hash_embedding("res.partner record 1", 384);
        let c = hash_embedding("res.partner record 2", 384);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 384);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_empty_input_returns_empty() {
        let service = service_with(vec![], 16);
        assert!(service.embed(vec![], EmbedMode::Document).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_providers_uses_placeholders() {
        let service = service_with(vec![], 16);
        assert!(!service.has_providers().await);

        let result = service
            .embed(vec!["hello".to_string(), "world".to_string()], EmbedMode::Document)
            .await
            .unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].len(), 16);
        assert_ne!(result[0], result[1]);
    }

    #[tokio::test]
    async fn test_openai_results_reordered_by_index() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(body_partial_json(json!({"dimensions": 2})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {"embedding": [0.0, 1.0], "index": 1},
                    {"embedding": [1.0, 0.0], "index": 0}
                ]
            })))
            .mount(&server)
            .await;

        let service = service_with(
            vec![provider("openai", &server.uri(), "text-embedding-3-small", 1)],
            2,
        );

        let result = service
            .embed(vec!["a".to_string(), "b".to_string()], EmbedMode::Document)
            .await
            .unwrap();

        assert_eq!(result, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn test_gemini_sends_task_type_for_mode() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/text-embedding-004:batchEmbedContents"))
            .and(query_param("key", "test-key"))
            .and(body_partial_json(json!({
                "requests": [{"taskType": "RETRIEVAL_QUERY"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "embeddings": [{"values": [0.5, 0.5]}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let service = service_with(
            vec![provider("gemini", &server.uri(), "text-embedding-004", 1)],
            2,
        );

        let result = service.embed_single("find acme", EmbedMode::Query).await.unwrap();
        assert_eq!(result, vec![0.5, 0.5]);
    }

    #[tokio::test]
    async fn test_client_error_falls_back_without_retry() {
        let failing = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"message": "invalid api key"}
            })))
            .expect(1)
            .mount(&failing)
            .await;

        let working = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .and(body_partial_json(json!({"input": ["search_document: x"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "embeddings": [[0.1, 0.2]]
            })))
            .mount(&working)
            .await;

        let service = service_with(
            vec![
                provider("ollama", &working.uri(), "nomic-embed-text", 2),
                provider("openai", &failing.uri(), "text-embedding-3-small", 1),
            ],
            2,
        );
        assert_eq!(service.providers().await, vec!["openai", "ollama"]);

        let result = service
            .embed(vec!["x".to_string()], EmbedMode::Document)
            .await
            .unwrap();
        assert_eq!(result, vec![vec![0.1, 0.2]]);
    }

    #[tokio::test]
    async fn test_server_error_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "embeddings": [[0.3, 0.4]]
            })))
            .mount(&server)
            .await;

        let service = service_with(vec![provider("ollama", &server.uri(), "all-minilm", 1)], 2);

        let result = service
            .embed(vec!["x".to_string()], EmbedMode::Document)
            .await
            .unwrap();
        assert_eq!(result, vec![vec![0.3, 0.4]]);
    }

    #[tokio::test]
    async fn test_all_providers_failing_returns_last_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "unauthorized"})))
            .mount(&server)
            .await;

        let service = service_with(vec![provider("ollama", &server.uri(), "all-minilm", 1)], 2);

        let err = service
            .embed(vec!["x".to_string()], EmbedMode::Document)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "ollama returned HTTP 401: unauthorized");
    }

    #[tokio::test]
    async fn test_count_mismatch_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "embeddings": [[0.1, 0.2]]
            })))
            .mount(&server)
            .await;

        let service = service_with(vec![provider("ollama", &server.uri(), "all-minilm", 1)], 2);

        let err = service
            .embed(vec!["a".to_string(), "b".to_string()], EmbedMode::Document)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("returned 1 embeddings for 2 texts"));
    }

    #[test]
    fn test_defaults_and_native_dimensions() {
        assert_eq!(default_endpoint("ollama"), "http://localhost:11434");
        assert_eq!(default_model("gemini"), "text-embedding-004");
        assert_eq!(native_dimension("text-embedding-004"), Some(768));
        assert_eq!(native_dimension("nomic-embed-text:latest"), Some(768));
        assert_eq!(native_dimension("my-custom-model"), None);
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(error_message(r#"{"error": {"message": "quota"}}"#), "quota");
        assert_eq!(error_message(r#"{"error": "model not found"}"#), "model not found");
        assert_eq!(error_message("Bad Gateway"), "Bad Gateway");
    }
}
