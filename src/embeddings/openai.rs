// OpenAI embeddings API provider.
//
// Remote alternative to the local ONNX model. text-embedding-3-small accepts
// a `dimensions` parameter, so the configured deployment dimension is passed
// through and every returned vector is checked against it.
//
// API docs: https://platform.openai.com/docs/api-reference/embeddings

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::traits::{clean_text, EmbeddingProvider};

pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1/embeddings";
pub const DEFAULT_OPENAI_MODEL: &str = "text-embedding-3-small";

pub struct OpenAiEmbedder {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    dimension: usize,
}

impl OpenAiEmbedder {
    pub fn new(api_key: String, dimension: usize) -> Self {
        Self {
            client: Client::new(),
            api_key,
            endpoint: DEFAULT_OPENAI_URL.to_string(),
            model: DEFAULT_OPENAI_MODEL.to_string(),
            dimension,
        }
    }

    /// Point the provider at a different endpoint (proxies, compatible APIs).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
    dimensions: usize,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f64>,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f64>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| anyhow::anyhow!("OpenAI returned no embeddings"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f64>>> {
        let cleaned: Vec<Option<String>> = texts.iter().map(|t| clean_text(t)).collect();
        let present: Vec<String> = cleaned.iter().flatten().cloned().collect();

        let mut remote = if present.is_empty() {
            Vec::new()
        } else {
            self.request(&present).await?
        }
        .into_iter();

        Ok(cleaned
            .iter()
            .map(|c| match c {
                Some(_) => remote.next().unwrap_or_else(|| vec![0.0; self.dimension]),
                None => vec![0.0; self.dimension],
            })
            .collect())
    }
}

impl OpenAiEmbedder {
    async fn request(&self, input: &[String]) -> Result<Vec<Vec<f64>>> {
        let body = EmbeddingRequest {
            input,
            model: &self.model,
            dimensions: self.dimension,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to call OpenAI embeddings API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI embeddings API returned {}: {}", status, body);
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .context("Failed to parse OpenAI embeddings response")?;

        // The API documents `index`; don't trust response order
        parsed.data.sort_by_key(|d| d.index);

        if parsed.data.len() != input.len() {
            anyhow::bail!(
                "OpenAI returned {} embeddings for {} inputs",
                parsed.data.len(),
                input.len()
            );
        }
        for datum in &parsed.data {
            if datum.embedding.len() != self.dimension {
                anyhow::bail!(
                    "OpenAI returned a {}-dim embedding, expected {}",
                    datum.embedding.len(),
                    self.dimension
                );
            }
        }

        debug!(count = input.len(), model = %self.model, "Fetched remote embeddings");
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}
