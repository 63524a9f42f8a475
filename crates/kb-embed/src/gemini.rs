//! Gemini embedding API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use kb_core::{DocumentText, Embedder, KbError, Result};

/// Task type sent with document batches.
const DOCUMENT_TASK: &str = "RETRIEVAL_DOCUMENT";

/// Maximum requests per `batchEmbedContents` call.
const MAX_BATCH: usize = 100;

/// Async client for the Gemini `embedContent` / `batchEmbedContents` endpoints.
///
/// Makes exactly one request per call; wrap it in a
/// [`RetryingEmbedder`](crate::RetryingEmbedder) for retries.
#[derive(Clone)]
pub struct GeminiEmbedder {
    client: Client,
    base_url: String,
    model: String,
}

impl GeminiEmbedder {
    /// Build a client. `model` may be given with or without the `models/` prefix.
    pub fn new(api_key: String, base_url: String, model: String, timeout: Duration) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(KbError::config("missing Gemini API key"));
        }
        if model.trim().is_empty() {
            return Err(KbError::config("missing embedding model name"));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(api_key.trim())
                .map_err(|e| KbError::config(format!("invalid API key: {}", e)))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| KbError::embedding(format!("failed to build HTTP client: {}", e)))?;

        let model = model.trim().trim_start_matches("models/").to_string();

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, self.model, method)
    }

    fn model_path(&self) -> String {
        format!("models/{}", self.model)
    }

    fn batch_request<'a>(&self, docs: &[DocumentText<'a>]) -> BatchEmbedRequest<'a> {
        BatchEmbedRequest {
            requests: docs
                .iter()
                .map(|doc| EmbedRequest {
                    model: self.model_path(),
                    content: Content::text(doc.text),
                    task_type: Some(DOCUMENT_TASK),
                    title: doc.title,
                })
                .collect(),
        }
    }

    async fn post<B, R>(&self, method: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: for<'de> Deserialize<'de>,
    {
        let response = self
            .client
            .post(self.endpoint(method))
            .json(body)
            .send()
            .await
            .map_err(|e| KbError::embedding(format!("{} request failed: {}", method, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(KbError::embedding(format!(
                "{} returned {}: {}",
                method, status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| KbError::embedding(format!("failed to parse {} response: {}", method, e)))
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbedRequest {
            model: self.model_path(),
            content: Content::text(text),
            task_type: None,
            title: None,
        };

        let response: EmbedResponse = self.post("embedContent", &request).await?;
        Ok(response.embedding.values)
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let docs: Vec<DocumentText<'_>> = texts
            .iter()
            .map(|&text| DocumentText { text, title: None })
            .collect();
        self.embed_documents(&docs).await
    }

    async fn embed_documents(&self, docs: &[DocumentText<'_>]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(docs.len());

        for batch in docs.chunks(MAX_BATCH) {
            let request = self.batch_request(batch);

            let response: BatchEmbedResponse = self.post("batchEmbedContents", &request).await?;
            if response.embeddings.len() != batch.len() {
                return Err(KbError::embedding(format!(
                    "batchEmbedContents returned {} embeddings for {} inputs",
                    response.embeddings.len(),
                    batch.len()
                )));
            }

            debug!("Embedded batch of {}", batch.len());
            out.extend(response.embeddings.into_iter().map(|e| e.values));
        }

        Ok(out)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest<'a> {
    model: String,
    content: Content<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    task_type: Option<&'static str>,
    /// Only honoured by the API together with `RETRIEVAL_DOCUMENT`.
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

impl<'a> Content<'a> {
    fn text(text: &'a str) -> Self {
        Self {
            parts: vec![Part { text }],
        }
    }
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedRequest<'a>>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Values,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<Values>,
}

#[derive(Debug, Deserialize)]
struct Values {
    values: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedder() -> GeminiEmbedder {
        GeminiEmbedder::new(
            "test-key".to_string(),
            "https://example.invalid/v1beta/".to_string(),
            "models/text-embedding-004".to_string(),
            Duration::from_secs(1),
        )
        .unwrap()
    }

    #[test]
    fn test_endpoint() {
        let embedder = embedder();
        assert_eq!(
            embedder.endpoint("embedContent"),
            "https://example.invalid/v1beta/models/text-embedding-004:embedContent"
        );
        assert_eq!(embedder.model_path(), "models/text-embedding-004");
    }

    #[test]
    fn test_rejects_empty_key() {
        let result = GeminiEmbedder::new(
            " ".to_string(),
            "https://example.invalid".to_string(),
            "text-embedding-004".to_string(),
            Duration::from_secs(1),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_batch_request_shape() {
        let docs = [
            DocumentText {
                text: "hello",
                title: Some("herbs.txt"),
            },
            DocumentText {
                text: "untitled",
                title: None,
            },
        ];
        let request = embedder().batch_request(&docs);

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["requests"][0]["model"], "models/text-embedding-004");
        assert_eq!(json["requests"][0]["taskType"], "RETRIEVAL_DOCUMENT");
        assert_eq!(json["requests"][0]["title"], "herbs.txt");
        assert_eq!(json["requests"][0]["content"]["parts"][0]["text"], "hello");
        assert!(json["requests"][1].get("title").is_none());
    }

    #[test]
    fn test_parse_responses() {
        let single: EmbedResponse =
            serde_json::from_str(r#"{"embedding": {"values": [0.1, -0.2]}}"#).unwrap();
        assert_eq!(single.embedding.values, vec![0.1, -0.2]);

        let batch: BatchEmbedResponse =
            serde_json::from_str(r#"{"embeddings": [{"values": [1.0]}, {"values": [2.0]}]}"#)
                .unwrap();
        assert_eq!(batch.embeddings.len(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_embedding_error() {
        let embedder = embedder();
        let err = embedder.embed("hello").await.unwrap_err();
        assert_eq!(err.error_code(), "EMBEDDING_UNAVAILABLE");
    }
}
