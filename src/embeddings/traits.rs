// Embedding provider trait: the swap-ready abstraction.
//
// The default implementation runs all-MiniLM-L6-v2 locally via ONNX. The
// OpenAI embeddings API is available as a remote alternative. Tests plug in
// deterministic providers.

use anyhow::Result;
use async_trait::async_trait;

/// Trait for turning text into embedding vectors of a fixed dimension.
///
/// Blank text must yield the all-zero vector of `dimension()`, never an
/// error.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// The dimension `D` of every vector this provider returns.
    fn dimension(&self) -> usize;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f64>>;

    /// Embed multiple texts, returning vectors in the same order.
    /// Default implementation calls `embed` sequentially; providers
    /// can override for batching if they support it.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f64>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }
}

/// Collapse newlines to spaces and trim. Returns `None` for blank text,
/// which providers map to the zero vector.
pub fn clean_text(text: &str) -> Option<String> {
    let cleaned = text.replace(['\r', '\n'], " ");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}
