//! Shared test doubles: deterministic embedder, cross-encoders and corpora

#![allow(dead_code)]

use async_trait::async_trait;
use knowledge_retrieval::corpus::{
    Chunk, ChunkId, Corpus, CorpusError, CorpusFilter, CorpusHit, IndexConfig, IndexedCorpus,
};
use knowledge_retrieval::embedding::{EmbeddingError, EmbeddingProvider};
use knowledge_retrieval::retrieval::{CrossEncoder, RerankError};
use std::sync::Arc;

pub const DIM: usize = 128;

pub fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

fn fnv1a(token: &str) -> u64 {
    token.bytes().fold(0xcbf29ce484222325u64, |hash, byte| {
        (hash ^ byte as u64).wrapping_mul(0x100000001b3)
    })
}

/// Bag-of-words hashing embedder: texts sharing words have similar vectors
pub struct HashingEmbedder;

impl HashingEmbedder {
    pub fn vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; DIM];
        for token in tokens(text) {
            let hash = fnv1a(&token);
            let slot = (hash % DIM as u64) as usize;
            let sign = if (hash >> 32) & 1 == 0 { 1.0 } else { -1.0 };
            v[slot] += sign;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

impl EmbeddingProvider for HashingEmbedder {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts
            .iter()
            .map(|t| {
                let v = Self::vector(t);
                if v.iter().all(|x| *x == 0.0) {
                    Err(EmbeddingError::InvalidInput(format!("no tokens in '{}'", t)))
                } else {
                    Ok(v)
                }
            })
            .collect()
    }

    fn dimension(&self) -> usize {
        DIM
    }

    fn model_name(&self) -> &str {
        "hashing"
    }
}

pub struct FailingEmbedder;

impl EmbeddingProvider for FailingEmbedder {
    fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Err(EmbeddingError::InitializationError(
            "model download failed".to_string(),
        ))
    }

    fn dimension(&self) -> usize {
        DIM
    }

    fn model_name(&self) -> &str {
        "failing"
    }
}

/// Logit = 2 * (query words present in the passage) - 1
pub struct OverlapCrossEncoder;

impl CrossEncoder for OverlapCrossEncoder {
    fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f32>, RerankError> {
        let query_tokens = tokens(query);
        Ok(passages
            .iter()
            .map(|p| {
                let passage_tokens = tokens(p);
                let overlap = query_tokens
                    .iter()
                    .filter(|t| passage_tokens.contains(t))
                    .count();
                2.0 * overlap as f32 - 1.0
            })
            .collect())
    }

    fn model_name(&self) -> &str {
        "overlap"
    }
}

pub struct FailingCrossEncoder;

impl CrossEncoder for FailingCrossEncoder {
    fn score(&self, _query: &str, _passages: &[String]) -> Result<Vec<f32>, RerankError> {
        Err(RerankError::RerankingError("onnx session crashed".to_string()))
    }

    fn model_name(&self) -> &str {
        "failing"
    }
}

/// Corpus whose keyword index is unreachable
pub struct NoKeywordCorpus(pub IndexedCorpus);

#[async_trait]
impl Corpus for NoKeywordCorpus {
    async fn vector_search(
        &self,
        query: &[f32],
        limit: usize,
        filter: &CorpusFilter,
    ) -> Result<Vec<CorpusHit>, CorpusError> {
        self.0.vector_search(query, limit, filter).await
    }

    async fn keyword_search(
        &self,
        _query: &str,
        _limit: usize,
        _filter: &CorpusFilter,
    ) -> Result<Vec<CorpusHit>, CorpusError> {
        Err(CorpusError::Unavailable("keyword shard offline".to_string()))
    }

    async fn get_chunks(&self, ids: &[ChunkId]) -> Result<Vec<Arc<Chunk>>, CorpusError> {
        self.0.get_chunks(ids).await
    }

    fn len(&self) -> usize {
        self.0.len()
    }

    fn dimension(&self) -> usize {
        self.0.dimension()
    }
}

pub fn chunk(id: ChunkId, document_id: &str, ordinal: u32, text: &str) -> Chunk {
    Chunk {
        id,
        document_id: document_id.to_string(),
        ordinal,
        text: text.to_string(),
        language: "en".to_string(),
        embedding: HashingEmbedder::vector(text),
    }
}

pub fn index_config() -> IndexConfig {
    IndexConfig {
        vector_dim: DIM,
        max_elements: 1_000,
        ..IndexConfig::default()
    }
}

pub fn build_corpus(chunks: Vec<Chunk>) -> IndexedCorpus {
    let mut corpus = IndexedCorpus::new(&index_config(), None).unwrap();
    if !chunks.is_empty() {
        corpus.insert_chunks(chunks).unwrap();
    }
    corpus.commit().unwrap();
    corpus
}

const TOPICS: [&str; 5] = ["proxy", "backup", "sso", "webhooks", "quotas"];

/// 50 chunks across 5 documents, each about configuring one topic
pub fn configuration_chunks() -> Vec<Chunk> {
    let mut chunks = Vec::new();
    for (d, topic) in TOPICS.iter().enumerate() {
        for i in 0..10u32 {
            let id = (d * 10) as u64 + i as u64;
            let text = format!(
                "How to configure X for {topic}: step {i} explains the {topic} settings, \
                 option {d}{i} and how the X {topic} defaults interact."
            );
            chunks.push(chunk(id, &format!("doc-{}", topic), i, &text));
        }
    }
    chunks
}
