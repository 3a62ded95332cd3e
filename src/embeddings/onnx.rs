// Local sentence embeddings via all-MiniLM-L6-v2 on ONNX Runtime.
//
// Page text is tokenized, run through the BERT encoder, and mean-pooled over
// the attention mask into one 384-dimensional vector per text. No API calls,
// no rate limits: a full site can be embedded offline.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;
use tracing::debug;

use super::traits::{clean_text, EmbeddingProvider};

/// Output dimension of all-MiniLM-L6-v2.
pub const MINILM_DIM: usize = 384;

/// Sentence embedder backed by a local ONNX session.
///
/// The session sits behind Arc<Mutex<_>> because inference runs on
/// spawn_blocking threads and `Session::run` needs `&mut`.
pub struct OnnxEmbedder {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
}

impl OnnxEmbedder {
    /// Load `model.onnx` and `tokenizer.json` from `model_dir`.
    pub fn load(model_dir: &Path) -> Result<Self> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        for path in [&model_path, &tokenizer_path] {
            if !path.exists() {
                anyhow::bail!(
                    "Embedding model file not found: {}\nRun `apexseo download-model` to download it.",
                    path.display()
                );
            }
        }

        let session = Session::builder()
            .context("Failed to create ONNX session builder")?
            .commit_from_file(&model_path)
            .with_context(|| format!("Failed to load embedding model from {}", model_path.display()))?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("Failed to load embedding tokenizer: {}", e))?;

        debug!(model_dir = %model_dir.display(), "Loaded ONNX embedding model");

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OnnxEmbedder {
    fn dimension(&self) -> usize {
        MINILM_DIM
    }

    async fn embed(&self, text: &str) -> Result<Vec<f64>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| anyhow::anyhow!("Embedding model returned no vectors"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f64>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let session = Arc::clone(&self.session);
        let tokenizer = Arc::clone(&self.tokenizer);
        let cleaned: Vec<Option<String>> = texts.iter().map(|t| clean_text(t)).collect();

        tokio::task::spawn_blocking(move || {
            // Blank texts skip inference and come back as zero vectors
            let present: Vec<String> = cleaned.iter().flatten().cloned().collect();
            let mut encoded = run_encoder(&session, &tokenizer, &present)?.into_iter();
            Ok(cleaned
                .iter()
                .map(|c| match c {
                    Some(_) => encoded.next().unwrap_or_else(|| vec![0.0; MINILM_DIM]),
                    None => vec![0.0; MINILM_DIM],
                })
                .collect())
        })
        .await
        .context("spawn_blocking panicked")?
    }
}

/// Tokenize, run inference, and mean-pool. Blocking; call from spawn_blocking.
fn run_encoder(
    session: &Mutex<Session>,
    tokenizer: &Tokenizer,
    texts: &[String],
) -> Result<Vec<Vec<f64>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let encodings = texts
        .iter()
        .map(|t| {
            tokenizer
                .encode(t.as_str(), true)
                .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))
        })
        .collect::<Result<Vec<_>>>()?;

    let batch = encodings.len();
    let seq_len = encodings.iter().map(|e| e.get_ids().len()).max().unwrap_or(0);
    if seq_len == 0 {
        return Ok(vec![vec![0.0; MINILM_DIM]; batch]);
    }

    // Right-pad everything to seq_len with the BERT pad id (0)
    let mut ids = vec![0i64; batch * seq_len];
    let mut mask = vec![0i64; batch * seq_len];
    for (row, enc) in encodings.iter().enumerate() {
        let base = row * seq_len;
        for (col, (&id, &m)) in enc.get_ids().iter().zip(enc.get_attention_mask()).enumerate() {
            ids[base + col] = id as i64;
            mask[base + col] = m as i64;
        }
    }
    let type_ids = vec![0i64; batch * seq_len];

    let shape = [batch as i64, seq_len as i64];
    let ids_tensor = Tensor::from_array((shape, ids)).context("Failed to build input_ids tensor")?;
    let mask_tensor =
        Tensor::from_array((shape, mask.clone())).context("Failed to build attention_mask tensor")?;
    let type_tensor =
        Tensor::from_array((shape, type_ids)).context("Failed to build token_type_ids tensor")?;

    // last_hidden_state: [batch, seq_len, 384]
    let hidden = {
        let mut session = session
            .lock()
            .map_err(|e| anyhow::anyhow!("Session lock poisoned: {}", e))?;
        let outputs = session
            .run(ort::inputs! {
                "input_ids" => ids_tensor,
                "attention_mask" => mask_tensor,
                "token_type_ids" => type_tensor
            })
            .context("Embedding inference failed")?;
        let (_shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .context("Failed to extract embedding output tensor")?;
        data.to_vec()
    };

    let vectors = (0..batch)
        .map(|row| mean_pool(&hidden, &mask, row, seq_len))
        .collect::<Vec<_>>();

    debug!(batch_size = batch, dim = MINILM_DIM, "Computed page embeddings");
    Ok(vectors)
}

/// Average the token vectors of one row, weighted by its attention mask.
fn mean_pool(hidden: &[f32], mask: &[i64], row: usize, seq_len: usize) -> Vec<f64> {
    let mut pooled = vec![0.0_f64; MINILM_DIM];
    let mut weight = 0.0_f64;

    for token in 0..seq_len {
        let m = mask[row * seq_len + token] as f64;
        if m == 0.0 {
            continue;
        }
        weight += m;
        let offset = (row * seq_len + token) * MINILM_DIM;
        for (acc, &h) in pooled.iter_mut().zip(&hidden[offset..offset + MINILM_DIM]) {
            *acc += h as f64 * m;
        }
    }

    if weight > 0.0 {
        for v in &mut pooled {
            *v /= weight;
        }
    }
    pooled
}
