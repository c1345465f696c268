use std::hash::Hasher;

use souschef_core::error::Result;
use souschef_core::text::terms;
use souschef_core::traits::Embedder;
use twox_hash::XxHash64;

/// Deterministic bag-of-terms embedder using signed feature hashing.
///
/// Each normalised, non-stop-word term lands in one of `dim` buckets with a
/// sign taken from the top hash bit, so unrelated terms that collide tend to
/// cancel rather than accumulate. Vectors are L2-normalised; text without any
/// term embeds to the zero vector.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub const DEFAULT_DIM: usize = 512;

    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for term in terms(text) {
            let mut hasher = XxHash64::with_seed(0);
            hasher.write(term.as_bytes());
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            let sign = if h >> 63 == 1 { -1.0 } else { 1.0 };
            v[idx] += sign;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        v
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIM)
    }
}

impl Embedder for HashEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_words_and_punctuation_do_not_change_the_vector() {
        let e = HashEmbedder::new(64);
        assert_eq!(e.embed_text("What is aloo?"), e.embed_text("aloo"));
    }

    #[test]
    fn empty_text_is_zero_vector() {
        let e = HashEmbedder::new(8);
        assert!(e.embed_text("the of ...").iter().all(|x| *x == 0.0));
    }
}
