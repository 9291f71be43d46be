//! # Embedding
//!
//! Text embedding behind a trait so the vector store stays independent of
//! how vectors are produced. The default implementation is a deterministic
//! feature-hashing embedder: no model weights, no network, stable across
//! runs, and good enough for token-overlap similarity.

/// Produces fixed-dimension vectors from text.
pub trait Embedder: Send + Sync {
    /// Embed a piece of text. All outputs must have [`Embedder::dimensions`]
    /// length.
    fn embed(&self, text: &str) -> Vec<f32>;

    /// Output dimensionality.
    fn dimensions(&self) -> usize;
}

/// Deterministic feature-hashing embedder.
///
/// Lowercased alphanumeric tokens are hashed into a fixed-dimension vector
/// with a signed contribution per token, then L2-normalized. Two texts score
/// high under cosine similarity in proportion to their token overlap.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

/// FNV-1a, 64-bit. Stable across platforms and Rust versions, unlike the
/// std hasher.
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

impl Embedder for HashEmbedder {
    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let lowered = token.to_lowercase();
            let hash = fnv1a(lowered.as_bytes());
            let index = (hash % self.dimensions as u64) as usize;
            let sign = if (hash >> 63) == 0 { 1.0 } else { -1.0 };
            vector[index] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        vector
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn embedding_is_deterministic() {
        let embedder = HashEmbedder::new(64);
        assert_eq!(
            embedder.embed("email subject lines"),
            embedder.embed("email subject lines")
        );
    }

    #[test]
    fn embedding_is_normalized() {
        let embedder = HashEmbedder::default();
        let v = embedder.embed("multi-touch campaign sequences");
        assert_eq!(v.len(), 384);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn overlapping_text_scores_higher_than_disjoint() {
        let embedder = HashEmbedder::default();
        let base = embedder.embed("email subject line best practices");
        let related = embedder.embed("how to write a better email subject line");
        let unrelated = embedder.embed("quarterly financial statements audit");

        assert!(cosine(&base, &related) > cosine(&base, &unrelated));
    }

    #[test]
    fn empty_text_embeds_to_zero_vector() {
        let embedder = HashEmbedder::new(16);
        let v = embedder.embed("   ");
        assert!(v.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn tokenization_is_case_insensitive() {
        let embedder = HashEmbedder::new(128);
        assert_eq!(embedder.embed("Email MARKETING"), embedder.embed("email marketing"));
    }
}
