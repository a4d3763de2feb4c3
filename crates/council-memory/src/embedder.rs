use crate::error::MemoryError;

/// Turns situation text into a fixed-width vector for similarity search.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError>;

    fn dimension(&self) -> usize;
}

/// Deterministic feature-hashing embedder over lowercase unigrams and bigrams.
///
/// Needs no model weights and gives identical vectors for identical text across
/// processes, so persisted embeddings stay comparable with fresh queries.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Result<Self, MemoryError> {
        if dimension == 0 {
            return Err(MemoryError::Embedding(
                "embedding dimension must be positive".to_string(),
            ));
        }
        Ok(Self { dimension })
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self { dimension: 512 }
    }
}

impl Embedder for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        let tokens = tokenize(text);
        let mut vector = vec![0.0f64; self.dimension];

        let mut add = |feature: &str| {
            let hash = fnv1a(feature.as_bytes());
            let index = (hash % self.dimension as u64) as usize;
            // Top bit picks the sign so collisions tend to cancel instead of pile up.
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[index] += sign;
        };

        for token in &tokens {
            add(token);
        }
        for pair in tokens.windows(2) {
            add(&format!("{} {}", pair[0], pair[1]));
        }

        let norm = vector.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }

        Ok(vector.into_iter().map(|x| x as f32).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

#[cfg(feature = "fastembed")]
pub use self::semantic::FastEmbedder;

#[cfg(feature = "fastembed")]
mod semantic {
    use std::sync::Mutex;

    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use tracing::info;

    use super::Embedder;
    use crate::error::MemoryError;

    /// Sentence embeddings from a local ONNX model via fastembed.
    ///
    /// Paraphrased situations land close together, unlike `HashingEmbedder`.
    /// Model weights are downloaded on first use and cached.
    pub struct FastEmbedder {
        model: Mutex<TextEmbedding>,
        name: String,
        dimension: usize,
    }

    impl FastEmbedder {
        pub const DEFAULT_MODEL: &'static str = "bge-small-en-v1.5";

        pub fn new(model_name: &str) -> Result<Self, MemoryError> {
            let (model, dimension) = lookup(model_name)?;
            let model = TextEmbedding::try_new(
                InitOptions::new(model).with_show_download_progress(false),
            )
            .map_err(|e| MemoryError::Embedding(format!("failed to load {model_name}: {e}")))?;
            info!(model = %model_name, dimension, "Loaded embedding model");

            Ok(Self {
                model: Mutex::new(model),
                name: model_name.to_string(),
                dimension,
            })
        }

        pub fn name(&self) -> &str {
            &self.name
        }
    }

    impl Embedder for FastEmbedder {
        fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
            let mut model = self
                .model
                .lock()
                .map_err(|e| MemoryError::Unavailable(format!("embedding model poisoned: {e}")))?;
            let vector = model
                .embed(&[text], None)
                .map_err(|e| MemoryError::Embedding(e.to_string()))?
                .pop()
                .ok_or_else(|| MemoryError::Embedding("model returned no embedding".to_string()))?;

            if vector.len() != self.dimension {
                return Err(MemoryError::Embedding(format!(
                    "{} produced {} values, expected {}",
                    self.name,
                    vector.len(),
                    self.dimension
                )));
            }
            Ok(vector)
        }

        fn dimension(&self) -> usize {
            self.dimension
        }
    }

    fn lookup(name: &str) -> Result<(EmbeddingModel, usize), MemoryError> {
        match name.to_ascii_lowercase().as_str() {
            "bge-small-en-v1.5" => Ok((EmbeddingModel::BGESmallENV15, 384)),
            "bge-base-en-v1.5" => Ok((EmbeddingModel::BGEBaseENV15, 768)),
            "bge-large-en-v1.5" => Ok((EmbeddingModel::BGELargeENV15, 1024)),
            "all-minilm-l6-v2" => Ok((EmbeddingModel::AllMiniLML6V2, 384)),
            "all-minilm-l12-v2" => Ok((EmbeddingModel::AllMiniLML12V2, 384)),
            other => Err(MemoryError::Embedding(format!(
                "unsupported embedding model {other:?}"
            ))),
        }
    }

}

/// Cosine similarity of two vectors. Returns 0.0 on a length mismatch or a zero vector.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| f64::from(*x) * f64::from(*y))
        .sum();
    let norm_a = a.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a * norm_b)) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_dimension_rejected() {
        assert!(HashingEmbedder::new(0).is_err());
    }

    #[test]
    fn embedding_has_configured_width_and_unit_norm() {
        let embedder = HashingEmbedder::new(64).unwrap();
        let v = embedder.embed("Rising interest rates, high inflation").unwrap();
        assert_eq!(v.len(), 64);

        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn identical_text_gives_identical_vectors() {
        let embedder = HashingEmbedder::default();
        let a = embedder.embed("Tech sector volatility").unwrap();
        let b = embedder.embed("tech SECTOR volatility!").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_text_is_zero_vector() {
        let embedder = HashingEmbedder::new(16).unwrap();
        let v = embedder.embed("  ...  ").unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn related_text_scores_higher_than_unrelated() {
        let embedder = HashingEmbedder::default();
        let query = embedder
            .embed("high inflation and rising interest rates hurt consumer spending")
            .unwrap();
        let related = embedder
            .embed("rising interest rates with high inflation and weak consumer spending")
            .unwrap();
        let unrelated = embedder
            .embed("strong smartphone launch lifts semiconductor suppliers")
            .unwrap();

        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[test]
    fn cosine_edge_cases() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 2.0], &[2.0, 4.0]) - 1.0).abs() < 1e-6);
    }
}
