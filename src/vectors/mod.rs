//! Embedding-based nearest-neighbor index over taxonomy texts, used as the
//! semantic fallback search.
mod embed;
mod index;
mod remote;

pub use embed::{model_defaults, Embedder, HashEmbedder, HttpEmbedder, SearchDefaults};
pub use index::{
    cosine_similarity, IndexLocation, ScrollPoint, VectorHit, VectorIndex, VectorIndexConfig,
};
pub use remote::{RemoteCollection, RemotePoint};
