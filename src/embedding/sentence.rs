//! Sentence embeddings with a BERT-family encoder (e.g. `all-MiniLM-L6-v2`).
//!
//! The model directory must contain the three files published with the
//! sentence-transformers checkpoints:
//!
//! ```text
//! models/all-MiniLM-L6-v2/
//! ├── config.json
//! ├── model.safetensors
//! └── tokenizer.json
//! ```
//!
//! Embeddings are the attention-masked mean of the last hidden state,
//! L2-normalised, which is what sentence-transformers produces for these
//! checkpoints.

use super::device::select_device;
use super::{EmbeddingError, TextEmbedder};
use crate::config::LabelerConfig;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};
use tracing::{debug, info, instrument};

const CONFIG_FILE: &str = "config.json";
const WEIGHTS_FILE: &str = "model.safetensors";
const TOKENIZER_FILE: &str = "tokenizer.json";

/// Transformer-backed [`TextEmbedder`].
pub struct SentenceEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    model_name: String,
}

impl std::fmt::Debug for SentenceEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SentenceEmbedder")
            .field("model_name", &self.model_name)
            .field("device", &self.device)
            .finish()
    }
}

impl SentenceEmbedder {
    /// Load the model named by the labeler configuration.
    ///
    /// Fails with [`EmbeddingError::ModelNotFound`] before touching any
    /// weights when one of the model files is missing.
    #[instrument(level = "info", skip_all, fields(model = %config.model_name, dir = %config.model_dir.display()))]
    pub fn load(config: &LabelerConfig) -> Result<Self, EmbeddingError> {
        let dir = config.model_dir.as_path();
        for file in [CONFIG_FILE, WEIGHTS_FILE, TOKENIZER_FILE] {
            let path = dir.join(file);
            if !path.is_file() {
                return Err(EmbeddingError::ModelNotFound { path });
            }
        }

        let t0 = Instant::now();
        let device = select_device();
        let model = load_bert(dir, &device)?;
        let tokenizer = load_tokenizer(&dir.join(TOKENIZER_FILE), config.max_seq_len)?;

        info!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            ?device,
            "Embedding model loaded"
        );

        Ok(Self {
            model,
            tokenizer,
            device,
            model_name: config.model_name.clone(),
        })
    }

    fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| EmbeddingError::TokenizationFailed {
                reason: e.to_string(),
            })?;

        let ids = encodings
            .iter()
            .map(|enc| Tensor::new(enc.get_ids(), &self.device))
            .collect::<Result<Vec<_>, _>>()?;
        let masks = encodings
            .iter()
            .map(|enc| Tensor::new(enc.get_attention_mask(), &self.device))
            .collect::<Result<Vec<_>, _>>()?;

        let input_ids = Tensor::stack(&ids, 0)?;
        let attention_mask = Tensor::stack(&masks, 0)?;
        let token_type_ids = input_ids.zeros_like()?;

        let hidden = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;

        // Mean over real tokens only; padding positions have mask 0.
        let mask = attention_mask.to_dtype(DType::F32)?.unsqueeze(2)?;
        let summed = hidden.broadcast_mul(&mask)?.sum(1)?;
        let counts = mask.sum(1)?;
        let pooled = summed.broadcast_div(&counts)?;

        let norms = pooled.sqr()?.sum_keepdim(1)?.sqrt()?;
        let normalized = pooled.broadcast_div(&norms)?;

        Ok(normalized.to_vec2::<f32>()?)
    }
}

impl TextEmbedder for SentenceEmbedder {
    #[instrument(level = "debug", skip_all, fields(count = texts.len()))]
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let t0 = Instant::now();
        let vectors = self.encode_batch(texts)?;
        if vectors.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                got: vectors.len(),
            });
        }
        debug!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            dim = vectors.first().map_or(0, Vec::len),
            "Encoded batch"
        );
        Ok(vectors)
    }
}

fn load_bert(dir: &Path, device: &Device) -> Result<BertModel, EmbeddingError> {
    let raw = std::fs::read_to_string(dir.join(CONFIG_FILE))?;
    let config: Config =
        serde_json::from_str(&raw).map_err(|e| EmbeddingError::ModelLoadFailed {
            reason: format!("failed to parse {CONFIG_FILE}: {e}"),
        })?;

    let weights: PathBuf = dir.join(WEIGHTS_FILE);
    // SAFETY: the weights file is opened read-only and not modified while mapped.
    let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights], DType::F32, device)? };

    // sentence-transformers exports drop the `bert.` prefix; raw HF checkpoints keep it.
    let model = if vb.contains_tensor("bert.embeddings.word_embeddings.weight") {
        BertModel::load(vb.pp("bert"), &config)?
    } else {
        BertModel::load(vb, &config)?
    };
    Ok(model)
}

fn load_tokenizer(path: &Path, max_len: usize) -> Result<Tokenizer, EmbeddingError> {
    let mut tokenizer =
        Tokenizer::from_file(path).map_err(|e| EmbeddingError::TokenizationFailed {
            reason: format!("failed to load tokenizer: {e}"),
        })?;

    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length: max_len,
            ..Default::default()
        }))
        .map_err(|e| EmbeddingError::TokenizationFailed {
            reason: format!("failed to configure truncation: {e}"),
        })?;
    tokenizer.with_padding(Some(PaddingParams {
        strategy: PaddingStrategy::BatchLongest,
        ..Default::default()
    }));

    Ok(tokenizer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_dir_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config = LabelerConfig {
            model_dir: dir.path().join("nope"),
            ..Default::default()
        };
        let err = SentenceEmbedder::load(&config).unwrap_err();
        match err {
            EmbeddingError::ModelNotFound { path } => {
                assert!(path.ends_with(CONFIG_FILE));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_weights_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "{}").unwrap();
        let config = LabelerConfig {
            model_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let err = SentenceEmbedder::load(&config).unwrap_err();
        assert!(
            matches!(err, EmbeddingError::ModelNotFound { ref path } if path.ends_with(WEIGHTS_FILE))
        );
    }
}
