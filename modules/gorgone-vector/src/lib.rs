pub mod cache;
pub mod embedder;
pub mod ensure;

pub use cache::content_hash;
pub use embedder::{Embedder, TextEmbedder};
pub use ensure::{ensure_embeddings, PgVectorStore, VectorStore, VectorizeItem, VectorizeReport};

/// Embedding requests are batched at most this large to respect provider
/// limits.
pub const MAX_EMBED_BATCH: usize = 96;
