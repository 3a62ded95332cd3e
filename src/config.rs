use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};

use crate::cannibalization::DEFAULT_SIMILARITY_THRESHOLD;
use crate::cluster::DEFAULT_CLUSTER_SEED;
use crate::embeddings::onnx::MINILM_DIM;
use crate::scoring::content::DEFAULT_COMPETITOR_LIMIT;
use crate::scoring::ScoreWeights;

/// Which embedding backend to use.
#[derive(Debug, Clone, PartialEq)]
pub enum EmbedderBackend {
    /// Local ONNX all-MiniLM-L6-v2 (default), no API key needed
    Onnx,
    /// OpenAI embeddings API, requires OPENAI_API_KEY
    OpenAi,
}

/// Central configuration loaded from environment variables.
///
/// Secrets come from env vars only. The .env file is loaded at startup
/// via dotenvy.
#[derive(Clone)]
pub struct Config {
    pub db_path: String,
    /// Minimum cosine similarity for two pages to conflict
    pub similarity_threshold: f64,
    /// Dimension every stored embedding must have
    pub embedding_dimension: usize,
    pub score_weights: ScoreWeights,
    /// How many ranking competitors feed a content score
    pub competitor_limit: usize,
    pub cluster_seed: u64,
    pub embedder_backend: EmbedderBackend,
    /// Directory containing the ONNX model files
    pub model_dir: PathBuf,
    pub openai_api_key: String,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// Every setting has a default. A value that is set but doesn't parse
    /// is an error rather than a silent fallback.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let embedder_backend = match lookup("APEXSEO_EMBEDDER").as_deref().map(str::trim) {
            None | Some("") | Some("onnx") => EmbedderBackend::Onnx,
            Some("openai") => EmbedderBackend::OpenAi,
            Some(other) => anyhow::bail!(
                "APEXSEO_EMBEDDER must be \"onnx\" or \"openai\", got \"{other}\""
            ),
        };

        let model_dir = lookup("APEXSEO_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(crate::embeddings::download::default_model_dir);

        let defaults = ScoreWeights::default();
        let score_weights = ScoreWeights {
            authority_weight: parse_var(&lookup, "APEXSEO_AUTHORITY_WEIGHT", defaults.authority_weight)?,
            depth_weight: parse_var(&lookup, "APEXSEO_DEPTH_WEIGHT", defaults.depth_weight)?,
            ux_weight: parse_var(&lookup, "APEXSEO_UX_WEIGHT", defaults.ux_weight)?,
        };

        let config = Self {
            db_path: lookup("APEXSEO_DB_PATH").unwrap_or_else(|| "./apexseo.db".to_string()),
            similarity_threshold: parse_var(
                &lookup,
                "APEXSEO_SIMILARITY_THRESHOLD",
                DEFAULT_SIMILARITY_THRESHOLD,
            )?,
            embedding_dimension: parse_var(&lookup, "APEXSEO_EMBEDDING_DIM", MINILM_DIM)?,
            score_weights,
            competitor_limit: parse_var(&lookup, "APEXSEO_COMPETITOR_LIMIT", DEFAULT_COMPETITOR_LIMIT)?,
            cluster_seed: parse_var(&lookup, "APEXSEO_CLUSTER_SEED", DEFAULT_CLUSTER_SEED)?,
            embedder_backend,
            model_dir,
            openai_api_key: lookup("OPENAI_API_KEY").unwrap_or_default(),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        validate_threshold(self.similarity_threshold)?;
        if self.embedding_dimension == 0 {
            anyhow::bail!("APEXSEO_EMBEDDING_DIM must be greater than 0");
        }
        if self.competitor_limit == 0 {
            anyhow::bail!("APEXSEO_COMPETITOR_LIMIT must be greater than 0");
        }
        let w = &self.score_weights;
        for (name, value) in [
            ("APEXSEO_AUTHORITY_WEIGHT", w.authority_weight),
            ("APEXSEO_DEPTH_WEIGHT", w.depth_weight),
            ("APEXSEO_UX_WEIGHT", w.ux_weight),
        ] {
            if !value.is_finite() || value < 0.0 {
                anyhow::bail!("{name} must be a non-negative number, got {value}");
            }
        }
        // Weights above 1.0 in total would let a composite score exceed 100
        if w.total() > 1.0 + 1e-9 {
            anyhow::bail!(
                "Score weights must sum to at most 1.0, got {:.3}",
                w.total()
            );
        }
        Ok(())
    }

    /// Validate that the chosen embedding backend has what it needs.
    /// For ONNX: model files must exist (or user should run download-model).
    /// For OpenAI: the API key must be set.
    pub fn require_embedder(&self) -> Result<()> {
        match self.embedder_backend {
            EmbedderBackend::Onnx => {
                if self.embedding_dimension != MINILM_DIM {
                    anyhow::bail!(
                        "The ONNX embedder produces {MINILM_DIM}-dimensional vectors, \
                         but APEXSEO_EMBEDDING_DIM is {}.\n\
                         Unset it or switch to APEXSEO_EMBEDDER=openai.",
                        self.embedding_dimension
                    );
                }
                if !crate::embeddings::download::embedding_files_present(&self.model_dir) {
                    anyhow::bail!(
                        "ONNX model files not found in {}\n\
                         Run `apexseo download-model` to download them.\n\
                         Or set APEXSEO_EMBEDDER=openai to use the OpenAI API instead.",
                        self.model_dir.display()
                    );
                }
                Ok(())
            }
            EmbedderBackend::OpenAi => {
                if self.openai_api_key.is_empty() {
                    anyhow::bail!(
                        "OPENAI_API_KEY not set. Add it to your .env file.\n\
                         See .env.example for the required variables."
                    );
                }
                Ok(())
            }
        }
    }
}

/// Reject a similarity threshold outside [0, 1].
pub fn validate_threshold(threshold: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&threshold) {
        anyhow::bail!("Similarity threshold must be between 0 and 1, got {threshold}");
    }
    Ok(())
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {key}: \"{raw}\"")),
        _ => Ok(default),
    }
}
