//! Vector and lexical recall against the corpus

use super::candidate::Candidate;
use crate::corpus::{Chunk, ChunkId, Corpus, CorpusError, CorpusFilter, CorpusHit};
use ahash::AHashMap;
use std::sync::Arc;
use tracing::debug;

/// Oversampled nearest-neighbour recall
///
/// Similarity is `1 - cosine_distance`. An empty corpus yields no candidates.
pub async fn recall_vector(
    corpus: &dyn Corpus,
    query_vector: &[f32],
    oversample_k: usize,
    filter: &CorpusFilter,
) -> Result<Vec<Candidate>, CorpusError> {
    if oversample_k == 0 || corpus.is_empty() {
        return Ok(Vec::new());
    }

    let hits = corpus.vector_search(query_vector, oversample_k, filter).await?;
    let candidates = hydrate(corpus, hits, Candidate::from_vector).await?;
    debug!("Vector recall: {} candidates", candidates.len());
    Ok(candidates)
}

/// Full-text recall, ordered by descending keyword score
///
/// Scores are raw index scores; fusion is responsible for normalizing them.
pub async fn recall_lexical(
    corpus: &dyn Corpus,
    query_text: &str,
    candidate_ceiling: usize,
    filter: &CorpusFilter,
) -> Result<Vec<Candidate>, CorpusError> {
    if candidate_ceiling == 0 || corpus.is_empty() || query_text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let hits = corpus
        .keyword_search(query_text, candidate_ceiling, filter)
        .await?;
    let candidates = hydrate(corpus, hits, Candidate::from_lexical).await?;
    debug!("Lexical recall: {} candidates", candidates.len());
    Ok(candidates)
}

/// Fetch the chunks behind `hits`, preserving hit order
async fn hydrate(
    corpus: &dyn Corpus,
    hits: Vec<CorpusHit>,
    build: fn(Arc<Chunk>, f32) -> Candidate,
) -> Result<Vec<Candidate>, CorpusError> {
    if hits.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<ChunkId> = hits.iter().map(|h| h.chunk_id).collect();
    let mut chunks: AHashMap<ChunkId, Arc<Chunk>> = corpus
        .get_chunks(&ids)
        .await?
        .into_iter()
        .map(|chunk| (chunk.id, chunk))
        .collect();

    // Ids the corpus no longer knows are dropped; repeated ids keep their first hit
    Ok(hits
        .into_iter()
        .filter_map(|hit| chunks.remove(&hit.chunk_id).map(|chunk| build(chunk, hit.score)))
        .collect())
}
