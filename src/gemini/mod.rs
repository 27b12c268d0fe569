
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, warn};
use url::Url;

use crate::config::Config;
use crate::{AskdocError, Result};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

/// Task type hints Gemini uses to specialize embeddings: documents and
/// queries are embedded differently for retrieval.
const TASK_TYPE_DOCUMENT: &str = "RETRIEVAL_DOCUMENT";
const TASK_TYPE_QUERY: &str = "RETRIEVAL_QUERY";

/// Blocking client for the Gemini REST API, covering batch document
/// embeddings, query embeddings, and answer generation.
///
/// Constructed once at startup with validated configuration; a missing API
/// key fails here instead of on first use.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    base_url: Url,
    api_key: String,
    embedding_model: String,
    chat_model: String,
    batch_size: usize,
    agent: ureq::Agent,
    retry_attempts: u32,
}

#[derive(Debug, Serialize)]
struct ContentPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest {
    model: String,
    content: Content,
    task_type: String,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest {
    requests: Vec<EmbedRequest>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    embeddings: Vec<EmbeddingValues>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl GeminiClient {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        if config.gemini.api_key.trim().is_empty() {
            return Err(AskdocError::Config(
                "GEMINI_API_KEY is not configured".to_string(),
            ));
        }

        let base_url = Url::parse(DEFAULT_BASE_URL)
            .map_err(|e| AskdocError::Config(format!("Invalid Gemini base URL: {e}")))?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)))
            .build()
            .into();

        Ok(Self {
            base_url,
            api_key: config.gemini.api_key.clone(),
            embedding_model: config.gemini.embedding_model.clone(),
            chat_model: config.gemini.chat_model.clone(),
            batch_size: config.gemini.batch_size,
            agent,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        })
    }

    /// Point the client at a different API host (used by tests).
    #[inline]
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    /// Embed document chunks for indexing, batching requests to stay under
    /// the API's per-request input limit. The result has the same length
    /// and order as the input.
    #[inline]
    pub fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            "Embedding {} texts in batches of {}",
            texts.len(),
            self.batch_size
        );

        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            embeddings.extend(self.embed_batch(batch, TASK_TYPE_DOCUMENT)?);
        }

        debug!("Embedded {} texts", embeddings.len());
        Ok(embeddings)
    }

    /// Embed a search query. Uses the query task type, which Gemini
    /// optimizes differently from document embeddings.
    #[inline]
    pub fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let request = EmbedRequest {
            model: format!("models/{}", self.embedding_model),
            content: Content {
                parts: vec![ContentPart {
                    text: query.to_string(),
                }],
            },
            task_type: TASK_TYPE_QUERY.to_string(),
        };

        let url = self.endpoint(&self.embedding_model, "embedContent")?;
        let body = serde_json::to_string(&request)
            .map_err(|e| AskdocError::Upstream(format!("Failed to serialize request: {e}")))?;
        let response_text = self.post_with_retry(&url, &body)?;

        let response: EmbedResponse = serde_json::from_str(&response_text).map_err(|e| {
            AskdocError::Upstream(format!("Failed to parse embedding response: {e}"))
        })?;

        debug!(
            "Generated query embedding with {} dimensions",
            response.embedding.values.len()
        );

        Ok(response.embedding.values)
    }

    /// Generate an answer to `question` grounded in `context` (the ranked
    /// chunk join produced by the retriever).
    #[inline]
    pub fn generate_answer(&self, question: &str, context: &str) -> Result<String> {
        let prompt = format!(
            "You are a helpful assistant that answers questions based on the \
             provided document context.\n\n\
             Context from the document:\n{context}\n\n\
             Question: {question}\n\n\
             Please provide a clear, accurate answer based solely on the context \
             provided. If the answer cannot be found in the context, say so politely."
        );

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![ContentPart { text: prompt }],
            }],
        };

        let url = self.endpoint(&self.chat_model, "generateContent")?;
        let body = serde_json::to_string(&request)
            .map_err(|e| AskdocError::Upstream(format!("Failed to serialize request: {e}")))?;
        let response_text = self.post_with_retry(&url, &body)?;

        let response: GenerateResponse = serde_json::from_str(&response_text).map_err(|e| {
            AskdocError::Upstream(format!("Failed to parse generation response: {e}"))
        })?;

        let answer = response
            .candidates
            .into_iter()
            .next()
            .map(|candidate| {
                candidate
                    .content
                    .parts
                    .into_iter()
                    .map(|part| part.text)
                    .collect::<String>()
            })
            .unwrap_or_default();

        if answer.trim().is_empty() {
            return Err(AskdocError::Upstream(
                "Generation response contained no candidates".to_string(),
            ));
        }

        Ok(answer)
    }

    fn embed_batch(&self, texts: &[String], task_type: &str) -> Result<Vec<Vec<f32>>> {
        let request = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| EmbedRequest {
                    model: format!("models/{}", self.embedding_model),
                    content: Content {
                        parts: vec![ContentPart { text: text.clone() }],
                    },
                    task_type: task_type.to_string(),
                })
                .collect(),
        };

        let url = self.endpoint(&self.embedding_model, "batchEmbedContents")?;
        let body = serde_json::to_string(&request)
            .map_err(|e| AskdocError::Upstream(format!("Failed to serialize request: {e}")))?;
        let response_text = self.post_with_retry(&url, &body)?;

        let response: BatchEmbedResponse = serde_json::from_str(&response_text).map_err(|e| {
            AskdocError::Upstream(format!("Failed to parse batch embedding response: {e}"))
        })?;

        if response.embeddings.len() != texts.len() {
            return Err(AskdocError::Upstream(format!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                response.embeddings.len()
            )));
        }

        Ok(response
            .embeddings
            .into_iter()
            .map(|embedding| embedding.values)
            .collect())
    }

    fn endpoint(&self, model: &str, method: &str) -> Result<Url> {
        self.base_url
            .join(&format!("/v1beta/models/{model}:{method}"))
            .map_err(|e| AskdocError::Upstream(format!("Failed to build API URL: {e}")))
    }

    fn post_with_retry(&self, url: &Url, body: &str) -> Result<String> {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("HTTP request attempt {}/{}", attempt, self.retry_attempts);

            let result = self
                .agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .header("x-goog-api-key", &self.api_key)
                .send(body)
                .and_then(|mut resp| resp.body_mut().read_to_string());

            match result {
                Ok(response_text) => {
                    debug!("Request succeeded on attempt {}", attempt);
                    return Ok(response_text);
                }
                Err(err) => {
                    let should_retry = match &err {
                        ureq::Error::StatusCode(status) => {
                            if *status >= 500 {
                                warn!(
                                    "Server error (status {}), attempt {}/{}",
                                    status, attempt, self.retry_attempts
                                );
                                true
                            } else {
                                warn!("Client error (status {}), not retrying", status);
                                return Err(AskdocError::Upstream(format!(
                                    "Gemini API returned HTTP {status}"
                                )));
                            }
                        }
                        ureq::Error::ConnectionFailed
                        | ureq::Error::HostNotFound
                        | ureq::Error::Timeout(_)
                        | ureq::Error::Io(_) => {
                            warn!(
                                "Transport error: {}, attempt {}/{}",
                                err, attempt, self.retry_attempts
                            );
                            true
                        }
                        _ => {
                            warn!("Non-retryable error: {}", err);
                            false
                        }
                    };

                    if !should_retry {
                        return Err(AskdocError::Upstream(format!("Request failed: {err}")));
                    }

                    last_error = Some(AskdocError::Upstream(format!("Request failed: {err}")));

                    if attempt < self.retry_attempts {
                        let delay_ms = EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) * 1000;
                        let delay = Duration::from_millis(delay_ms);
                        debug!("Waiting {:?} before retry", delay);
                        std::thread::sleep(delay);
                    }
                }
            }
        }

        error!("All retry attempts failed for request to {}", self.base_url);

        Err(last_error.unwrap_or_else(|| {
            AskdocError::Upstream("Request failed after retries".to_string())
        }))
    }
}
