//! Knowledge Retrieval - hybrid retrieval core for knowledge-augmented chat
//!
//! Given a natural-language query, returns a ranked, deduplicated,
//! diversity-aware set of passages from a pre-ingested corpus: vector and
//! keyword recall, weighted score fusion, cross-encoder reranking and MMR
//! selection, all tuned per request by an adaptive strategy resolver.

pub mod config;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod retrieval;
pub mod strategy;
pub mod telemetry;

pub use config::Config;
pub use corpus::{Chunk, Corpus, IndexedCorpus};
pub use error::{Result, RetrievalError};
pub use retrieval::{RankedPassage, RankedResult, Retriever};
pub use strategy::{Channel, StrategyContext};
