/// In-process corpus backed by HNSW and tantivy
use super::{
    Chunk, ChunkId, Corpus, CorpusError, CorpusFilter, CorpusHit, IndexConfig, KeywordIndex,
    VectorIndex, VectorIndexError,
};
use crate::embedding::normalize;
use ahash::{AHashMap, AHashSet};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Chunks plus their vector and keyword indices
///
/// Built with [`IndexedCorpus::insert_chunks`] + [`IndexedCorpus::commit`],
/// then shared behind an `Arc` and only read.
pub struct IndexedCorpus {
    vector: VectorIndex,
    keyword: KeywordIndex,
    chunks: AHashMap<ChunkId, Arc<Chunk>>,
    // Sorted id lists backing filtered vector search
    by_document: AHashMap<String, Vec<ChunkId>>,
    by_language: AHashMap<String, Vec<ChunkId>>,
    dimension: usize,
}

impl IndexedCorpus {
    /// Create an empty corpus
    ///
    /// The keyword index lives in RAM unless `keyword_path` is given. An
    /// on-disk keyword index must start empty: chunk data is not persisted
    /// alongside it.
    pub fn new(config: &IndexConfig, keyword_path: Option<PathBuf>) -> Result<Self, CorpusError> {
        let vector = VectorIndex::new(config)?;
        let keyword = match keyword_path {
            Some(path) => {
                let index = KeywordIndex::open(path.clone())?;
                if !index.is_empty() {
                    return Err(CorpusError::Unavailable(format!(
                        "keyword index at {} already holds {} documents",
                        path.display(),
                        index.len()
                    )));
                }
                index
            }
            None => KeywordIndex::in_memory()?,
        };

        Ok(Self {
            vector,
            keyword,
            chunks: AHashMap::new(),
            by_document: AHashMap::new(),
            by_language: AHashMap::new(),
            dimension: config.vector_dim,
        })
    }

    /// Add a batch of chunks
    ///
    /// The whole batch is validated before anything is indexed: ids must be
    /// new, text non-empty and embeddings of the corpus dimension with a
    /// non-zero norm, and the vector index must have room for all of it.
    /// Embeddings are re-normalized to unit length.
    /// Keyword matches become visible after [`IndexedCorpus::commit`].
    pub fn insert_chunks(&mut self, chunks: Vec<Chunk>) -> Result<usize, CorpusError> {
        let mut seen = AHashSet::with_capacity(chunks.len());
        let mut prepared = Vec::with_capacity(chunks.len());

        for mut chunk in chunks {
            let invalid = |message: &str| CorpusError::InvalidChunk {
                id: chunk.id,
                message: message.to_string(),
            };

            if self.chunks.contains_key(&chunk.id) || !seen.insert(chunk.id) {
                return Err(invalid("duplicate chunk id"));
            }
            if chunk.text.trim().is_empty() {
                return Err(invalid("empty text"));
            }
            if chunk.embedding.len() != self.dimension {
                return Err(CorpusError::InvalidChunk {
                    id: chunk.id,
                    message: format!(
                        "embedding dimension {} does not match corpus dimension {}",
                        chunk.embedding.len(),
                        self.dimension
                    ),
                });
            }

            chunk.embedding = normalize(std::mem::take(&mut chunk.embedding))
                .ok_or_else(|| invalid("embedding has zero norm"))?;
            prepared.push(chunk);
        }

        let inserted = prepared.len();
        if inserted > self.vector.remaining_capacity() {
            return Err(VectorIndexError::InsertError(format!(
                "batch of {} chunks exceeds remaining capacity {} ({} indexed)",
                inserted,
                self.vector.remaining_capacity(),
                self.vector.len()
            ))
            .into());
        }

        for chunk in prepared {
            self.vector.insert(chunk.id, &chunk.embedding)?;
            self.keyword.insert(&chunk)?;

            insert_sorted(
                self.by_document.entry(chunk.document_id.clone()).or_default(),
                chunk.id,
            );
            insert_sorted(
                self.by_language.entry(chunk.language.clone()).or_default(),
                chunk.id,
            );
            self.chunks.insert(chunk.id, Arc::new(chunk));
        }

        debug!("Indexed {} chunks ({} total)", inserted, self.chunks.len());
        Ok(inserted)
    }

    /// Make inserted chunks searchable by keyword
    pub fn commit(&mut self) -> Result<(), CorpusError> {
        self.keyword.commit()?;
        info!(
            "Corpus committed: {} chunks across {} documents",
            self.chunks.len(),
            self.by_document.len()
        );
        Ok(())
    }

    pub fn document_count(&self) -> usize {
        self.by_document.len()
    }

    /// Sorted chunk ids admitted by `filter`, `None` when unfiltered
    fn allowed_ids(&self, filter: &CorpusFilter) -> Option<Vec<ChunkId>> {
        let lookup = |map: &AHashMap<String, Vec<ChunkId>>, key: &str| {
            map.get(key).cloned().unwrap_or_default()
        };

        match (&filter.document_id, &filter.language) {
            (None, None) => None,
            (Some(doc), None) => Some(lookup(&self.by_document, doc)),
            (None, Some(lang)) => Some(lookup(&self.by_language, lang)),
            (Some(doc), Some(lang)) => {
                let languages = self.by_language.get(lang.as_str());
                let ids = self
                    .by_document
                    .get(doc.as_str())
                    .map(|ids| {
                        ids.iter()
                            .copied()
                            .filter(|id| {
                                languages.map_or(false, |l| l.binary_search(id).is_ok())
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                Some(ids)
            }
        }
    }
}

fn insert_sorted(ids: &mut Vec<ChunkId>, id: ChunkId) {
    if let Err(position) = ids.binary_search(&id) {
        ids.insert(position, id);
    }
}

#[async_trait]
impl Corpus for IndexedCorpus {
    async fn vector_search(
        &self,
        query: &[f32],
        limit: usize,
        filter: &CorpusFilter,
    ) -> Result<Vec<CorpusHit>, CorpusError> {
        let allowed = self.allowed_ids(filter);
        let results = self.vector.search(query, limit, allowed.as_deref())?;

        Ok(results
            .into_iter()
            .filter(|r| self.chunks.contains_key(&r.id))
            .map(|r| CorpusHit {
                chunk_id: r.id,
                score: r.score,
            })
            .collect())
    }

    async fn keyword_search(
        &self,
        query: &str,
        limit: usize,
        filter: &CorpusFilter,
    ) -> Result<Vec<CorpusHit>, CorpusError> {
        // tantivy searches block; keep them off the async workers
        let searcher = self.keyword.searcher();
        let query = query.to_string();
        let filter = filter.clone();
        let results = tokio::task::spawn_blocking(move || searcher.search(&query, limit, &filter))
            .await
            .map_err(|e| CorpusError::Unavailable(format!("keyword search task failed: {}", e)))??;

        Ok(results
            .into_iter()
            .filter(|r| self.chunks.contains_key(&r.id))
            .map(|r| CorpusHit {
                chunk_id: r.id,
                score: r.score,
            })
            .collect())
    }

    async fn get_chunks(&self, ids: &[ChunkId]) -> Result<Vec<Arc<Chunk>>, CorpusError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.chunks.get(id).cloned())
            .collect())
    }

    fn len(&self) -> usize {
        self.chunks.len()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DIM: usize = 8;

    fn config() -> IndexConfig {
        IndexConfig {
            vector_dim: DIM,
            ..IndexConfig::default()
        }
    }

    fn chunk(id: u64, document_id: &str, language: &str, hot: usize, text: &str) -> Chunk {
        let mut embedding = vec![0.0; DIM];
        embedding[hot] = 2.0;
        Chunk {
            id,
            document_id: document_id.to_string(),
            ordinal: id as u32,
            text: text.to_string(),
            language: language.to_string(),
            embedding,
        }
    }

    fn corpus() -> IndexedCorpus {
        let mut corpus = IndexedCorpus::new(&config(), None).unwrap();
        corpus
            .insert_chunks(vec![
                chunk(1, "guide", "en", 0, "Configure the proxy in settings"),
                chunk(2, "guide", "de", 1, "Proxy konfigurieren in den Einstellungen"),
                chunk(3, "faq", "en", 0, "Resetting a forgotten password"),
                chunk(4, "faq", "en", 2, "Proxy errors and timeouts"),
            ])
            .unwrap();
        corpus.commit().unwrap();
        corpus
    }

    fn unit(hot: usize) -> Vec<f32> {
        let mut v = vec![0.0; DIM];
        v[hot] = 1.0;
        v
    }

    #[tokio::test]
    async fn test_vector_search_filters() {
        let corpus = corpus();
        assert_eq!(corpus.len(), 4);
        assert_eq!(corpus.document_count(), 2);

        let all = corpus
            .vector_search(&unit(0), 2, &CorpusFilter::default())
            .await
            .unwrap();
        let ids: Vec<_> = all.iter().map(|h| h.chunk_id).collect();
        assert_eq!(ids, vec![1, 3]);

        let faq = corpus
            .vector_search(&unit(0), 4, &CorpusFilter::document("faq"))
            .await
            .unwrap();
        assert!(faq.iter().all(|h| h.chunk_id == 3 || h.chunk_id == 4));

        let missing = corpus
            .vector_search(&unit(0), 4, &CorpusFilter::document("nope"))
            .await
            .unwrap();
        assert!(missing.is_empty());

        let guide_de = CorpusFilter {
            document_id: Some("guide".to_string()),
            language: Some("de".to_string()),
        };
        let hits = corpus.vector_search(&unit(1), 4, &guide_de).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, 2);
    }

    #[tokio::test]
    async fn test_keyword_search_and_fetch() {
        let corpus = corpus();
        let hits = corpus
            .keyword_search("proxy", 10, &CorpusFilter::document("faq"))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, 4);

        let chunks = corpus.get_chunks(&[4, 99, 1]).await.unwrap();
        let ids: Vec<_> = chunks.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![4, 1]);
        // stored embeddings are unit length
        assert!((chunks[0].embedding[2] - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_empty_corpus() {
        let corpus = IndexedCorpus::new(&config(), None).unwrap();
        assert!(corpus.is_empty());
        let hits = corpus
            .vector_search(&unit(0), 5, &CorpusFilter::default())
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_rejects_invalid_batches() {
        let mut corpus = corpus();

        let duplicate = corpus.insert_chunks(vec![chunk(1, "x", "en", 0, "dup")]);
        assert!(matches!(duplicate, Err(CorpusError::InvalidChunk { id: 1, .. })));

        let within_batch = corpus.insert_chunks(vec![
            chunk(10, "x", "en", 0, "a"),
            chunk(10, "x", "en", 0, "b"),
        ]);
        assert!(within_batch.is_err());
        // nothing from a rejected batch is indexed
        assert_eq!(corpus.len(), 4);

        let mut zero = chunk(11, "x", "en", 0, "zero");
        zero.embedding = vec![0.0; DIM];
        assert!(corpus.insert_chunks(vec![zero]).is_err());

        let mut short = chunk(12, "x", "en", 0, "short");
        short.embedding = vec![1.0; 3];
        assert!(corpus.insert_chunks(vec![short]).is_err());

        assert!(corpus.insert_chunks(vec![chunk(13, "x", "en", 0, "   ")]).is_err());
    }

    #[tokio::test]
    async fn test_over_capacity_batch_leaves_corpus_untouched() {
        let small = IndexConfig {
            max_elements: 2,
            ..config()
        };
        let mut corpus = IndexedCorpus::new(&small, None).unwrap();

        let overflow = corpus.insert_chunks(vec![
            chunk(1, "a", "en", 0, "first proxy"),
            chunk(2, "a", "en", 1, "second proxy"),
            chunk(3, "b", "en", 2, "third proxy"),
        ]);
        assert!(matches!(overflow, Err(CorpusError::VectorIndex(_))));
        assert_eq!(corpus.len(), 0);
        assert_eq!(corpus.document_count(), 0);

        corpus.commit().unwrap();
        let hits = corpus
            .keyword_search("proxy", 10, &CorpusFilter::default())
            .await
            .unwrap();
        assert!(hits.is_empty());

        // a batch that fits still goes in, and ids from the rejected batch stay free
        assert_eq!(
            corpus
                .insert_chunks(vec![chunk(1, "a", "en", 0, "first proxy")])
                .unwrap(),
            1
        );
        corpus.commit().unwrap();
        let hits = corpus
            .keyword_search("proxy", 10, &CorpusFilter::default())
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_keyword_searches() {
        let corpus = Arc::new(corpus());
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let corpus = Arc::clone(&corpus);
                tokio::spawn(async move {
                    corpus
                        .keyword_search("proxy", 10, &CorpusFilter::default())
                        .await
                        .unwrap()
                        .len()
                })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap(), 3);
        }
    }

    #[tokio::test]
    async fn test_on_disk_keyword_index() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("keywords");

        let mut corpus = IndexedCorpus::new(&config(), Some(path.clone())).unwrap();
        corpus
            .insert_chunks(vec![chunk(1, "a", "en", 0, "persisted text")])
            .unwrap();
        corpus.commit().unwrap();

        let hits = corpus
            .keyword_search("persisted", 5, &CorpusFilter::default())
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        drop(corpus);

        assert!(matches!(
            IndexedCorpus::new(&config(), Some(path)),
            Err(CorpusError::Unavailable(_))
        ));
    }
}
