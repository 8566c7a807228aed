//! Text embedding.
//!
//! The labeler only depends on the [`TextEmbedder`] trait, so tests can
//! swap the transformer for a lookup table of vectors.

pub mod device;
pub mod error;
pub mod sentence;

pub use error::EmbeddingError;
pub use sentence::SentenceEmbedder;

/// Turns strings into fixed-size vectors.
///
/// Implementations must be order preserving (vector `i` belongs to text `i`)
/// and deterministic for a given model and input.
pub trait TextEmbedder {
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}
