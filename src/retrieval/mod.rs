//! Hybrid retrieval & reranking
//!
//! Vector and lexical recall run concurrently, are merged by weighted score
//! fusion, rescored by an optional cross-encoder and finally selected for
//! diversity with MMR under a per-document cap.

mod candidate;
mod fusion;
mod language;
mod materialize;
mod mmr;
mod pipeline;
mod recall;
mod reranker;

pub use candidate::{Candidate, FusedScore, RetrievalSource};
pub use fusion::{fuse, FusionConfig, FusionError};
pub use language::detect_language;
pub use materialize::{materialize, Diagnostics, RankedPassage, RankedResult};
pub use mmr::{select_diverse, select_diverse_with_reserve};
pub use pipeline::{Retriever, RetrieverBuilder};
pub use recall::{recall_lexical, recall_vector};
pub use reranker::{
    bound_passage, sigmoid, CrossEncoder, FastEmbedReranker, RerankConfig, RerankError,
    RerankOutcome, Reranker,
};
