//! Text-to-vector port.
//!
//! `SagemakerEndpointEmbeddings` implements it with its configured chunk
//! size. Code that should not name the transport type takes
//! [`super::box_embedder::BoxEmbedder`] instead.

use colloquy_types::embedding::EmbeddingError;

/// Trait for converting text into embedding vectors.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait Embedder: Send + Sync {
    /// Embed one or more texts into vectors.
    ///
    /// Returns one vector per input text, in input order.
    fn embed(
        &self,
        texts: &[String],
    ) -> impl std::future::Future<Output = Result<Vec<Vec<f32>>, EmbeddingError>> + Send;

    /// The model or endpoint name used for embeddings.
    fn model_name(&self) -> &str;
}
