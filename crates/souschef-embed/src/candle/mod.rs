//! BGE-M3 (XLM-RoBERTa) sentence embeddings through candle.
//!
//! Expects `tokenizer.json`, `config.json` and `pytorch_model.bin` in the
//! model directory.

mod device;
mod pool;
mod tokenize;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use souschef_core::error::{Error, Result};
use souschef_core::traits::Embedder;
use tokenizers::Tokenizer;
use tracing::{info, warn};

pub use device::select_device;
pub use pool::masked_mean_l2;
pub use tokenize::tokenize_on_device;

pub const BGE_M3_DIM: usize = 1024;
const PROVIDER: &str = "bge-m3";

pub struct BgeM3Embedder {
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
    max_len: usize,
}

impl BgeM3Embedder {
    pub fn load(model_dir: &Path, max_len: usize) -> Result<Self> {
        Self::try_load(model_dir, max_len).map_err(|e| Error::embedding(PROVIDER, format!("{e:#}")))
    }

    fn try_load(model_dir: &Path, max_len: usize) -> anyhow::Result<Self> {
        let device = select_device();
        info!(dir = %model_dir.display(), "loading BGE-M3 model");
        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let config_path = model_dir.join("config.json");
        let config: XLMRobertaConfig = serde_json::from_str(
            &std::fs::read_to_string(&config_path).with_context(|| format!("reading {}", config_path.display()))?,
        )?;
        let weights = candle_core::pickle::read_all(model_dir.join("pytorch_model.bin"))?;
        let weights: HashMap<String, Tensor> = weights.into_iter().collect();
        let vb = VarBuilder::from_tensors(weights, DType::F32, &device);
        let model = XLMRobertaModel::new(&config, vb)?;
        info!("BGE-M3 model loaded");
        Ok(Self { model, tokenizer, device, max_len })
    }

    fn embed_one(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let (input_ids, attention_mask) = tokenize_on_device(&self.tokenizer, text, self.max_len, &self.device)?;
        let token_type_ids = Tensor::zeros((1, self.max_len), DType::I64, &self.device)?;
        let hidden = self.model.forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let v: Vec<f32> = pooled.to_device(&Device::Cpu)?.squeeze(0)?.to_vec1()?;
        if v.len() != BGE_M3_DIM {
            return Err(anyhow!("unexpected embedding width {}", v.len()));
        }
        Ok(v)
    }
}

impl Embedder for BgeM3Embedder {
    fn dim(&self) -> usize {
        BGE_M3_DIM
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts
            .iter()
            .map(|t| self.embed_one(t).map_err(|e| Error::embedding(PROVIDER, format!("{e:#}"))))
            .collect()
    }
}

/// First existing of: configured dir, `SOUSCHEF_MODEL_DIR`, `models/bge-m3`.
pub fn resolve_model_dir(configured: Option<&Path>) -> Result<PathBuf> {
    let candidates = configured
        .map(Path::to_path_buf)
        .into_iter()
        .chain(std::env::var("SOUSCHEF_MODEL_DIR").ok().map(PathBuf::from))
        .chain(std::iter::once(PathBuf::from("models/bge-m3")));
    for dir in candidates {
        if dir.exists() {
            return Ok(dir);
        }
        warn!(dir = %dir.display(), "model directory does not exist");
    }
    Err(Error::embedding(PROVIDER, "could not locate BGE-M3 model directory"))
}
