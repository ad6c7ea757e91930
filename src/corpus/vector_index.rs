/// HNSW vector index for similarity search
use super::IndexConfig;
use hnsw_rs::filter::FilterT;
use hnsw_rs::prelude::*;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VectorIndexError {
    #[error("Index initialization failed: {0}")]
    InitializationError(String),

    #[error("Insert failed: {0}")]
    InsertError(String),

    #[error("Invalid dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },
}

/// Search result with ID and similarity score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchResult {
    /// Chunk ID of the item
    pub id: u64,
    /// Cosine similarity, `1 - cosine_distance`
    pub score: f32,
}

/// HNSW vector index wrapper
///
/// Provides approximate nearest neighbor search ordered by ascending
/// cosine distance. Built once by the corpus, then only read.
pub struct VectorIndex {
    index: Hnsw<'static, f32, DistCosine>,
    dimension: usize,
    ef_search: usize,
    max_elements: usize,
    count: usize,
}

impl VectorIndex {
    /// Create a new, empty vector index
    pub fn new(config: &IndexConfig) -> Result<Self, VectorIndexError> {
        if config.vector_dim == 0 {
            return Err(VectorIndexError::InitializationError(
                "vector dimension must be greater than 0".to_string(),
            ));
        }

        let index = Hnsw::<f32, DistCosine>::new(
            config.hnsw_m.max(2),
            config.max_elements.max(1),
            16, // max layers
            config.hnsw_ef_construction.max(1),
            DistCosine,
        );

        Ok(Self {
            index,
            dimension: config.vector_dim,
            ef_search: config.hnsw_ef_search.max(1),
            max_elements: config.max_elements,
            count: 0,
        })
    }

    /// Insert a vector into the index
    ///
    /// # Arguments
    /// * `id` - Chunk ID
    /// * `vector` - Unit-normalized embedding vector
    pub fn insert(&mut self, id: u64, vector: &[f32]) -> Result<(), VectorIndexError> {
        if vector.len() != self.dimension {
            return Err(VectorIndexError::InvalidDimension {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        if self.count >= self.max_elements {
            return Err(VectorIndexError::InsertError(format!(
                "index is full ({} elements)",
                self.max_elements
            )));
        }

        self.index.insert_slice((vector, id as usize));
        self.count += 1;

        Ok(())
    }

    /// Search for k nearest neighbors
    ///
    /// # Arguments
    /// * `query` - Query vector
    /// * `k` - Number of results to return
    /// * `allowed` - Optional sorted list of chunk IDs to restrict the search to
    ///
    /// # Returns
    /// Results sorted by similarity descending
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        allowed: Option<&[u64]>,
    ) -> Result<Vec<SearchResult>, VectorIndexError> {
        if query.len() != self.dimension {
            return Err(VectorIndexError::InvalidDimension {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        if k == 0 || self.count == 0 {
            return Ok(Vec::new());
        }

        let ef = self.ef_search.max(k);

        let neighbours = match allowed {
            None => self.index.search(query, k, ef),
            Some([]) => return Ok(Vec::new()),
            Some(ids) => {
                let filter: Vec<usize> = ids.iter().map(|id| *id as usize).collect();
                self.index
                    .search_filter(query, k, ef, Some(&filter as &dyn FilterT))
            }
        };

        let mut results: Vec<SearchResult> = neighbours
            .into_iter()
            .map(|neighbour| SearchResult {
                id: neighbour.d_id as u64,
                score: 1.0 - neighbour.distance,
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.id.cmp(&b.id))
        });

        Ok(results)
    }

    /// Get the number of vectors in the index
    pub fn len(&self) -> usize {
        self.count
    }

    /// Check if index is empty
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Vectors that can still be inserted before the index is full
    pub fn remaining_capacity(&self) -> usize {
        self.max_elements.saturating_sub(self.count)
    }

    /// Get vector dimension
    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dim: usize) -> IndexConfig {
        IndexConfig {
            vector_dim: dim,
            ..IndexConfig::default()
        }
    }

    fn unit(dim: usize, hot: usize) -> Vec<f32> {
        let mut v = vec![0.0; dim];
        v[hot] = 1.0;
        v
    }

    #[test]
    fn test_index_creation() {
        let index = VectorIndex::new(&config(384)).unwrap();
        assert_eq!(index.dimension(), 384);
        assert_eq!(index.len(), 0);
        assert!(index.is_empty());
    }

    #[test]
    fn test_empty_search() {
        let index = VectorIndex::new(&config(8)).unwrap();
        let results = index.search(&unit(8, 0), 5, None).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_insert_and_search() {
        let mut index = VectorIndex::new(&config(8)).unwrap();

        let mut close = vec![0.0; 8];
        close[0] = 0.9;
        close[1] = 0.1;
        let norm = (0.81f32 + 0.01).sqrt();
        close.iter_mut().for_each(|x| *x /= norm);

        index.insert(1, &unit(8, 0)).unwrap();
        index.insert(2, &unit(8, 1)).unwrap();
        index.insert(3, &close).unwrap();

        assert_eq!(index.len(), 3);

        let results = index.search(&unit(8, 0), 2, None).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, 1);
        assert!((results[0].score - 1.0).abs() < 1e-4);
        assert_eq!(results[1].id, 3);
    }

    #[test]
    fn test_filtered_search() {
        let mut index = VectorIndex::new(&config(8)).unwrap();
        for id in 0..8u64 {
            index.insert(id, &unit(8, id as usize)).unwrap();
        }

        let results = index.search(&unit(8, 0), 3, Some(&[5u64, 6][..])).unwrap();
        assert!(!results.is_empty());
        assert!(results.iter().all(|r| r.id == 5 || r.id == 6));

        let none = index.search(&unit(8, 0), 3, Some(&[][..])).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_dimension_validation() {
        let mut index = VectorIndex::new(&config(384)).unwrap();
        assert!(index.insert(1, &[1.0; 128]).is_err());
        assert!(index.search(&[1.0; 128], 1, None).is_err());
    }

    #[test]
    fn test_capacity_enforced() {
        let mut index = VectorIndex::new(&IndexConfig {
            vector_dim: 4,
            max_elements: 1,
            ..IndexConfig::default()
        })
        .unwrap();
        assert_eq!(index.remaining_capacity(), 1);
        index.insert(1, &unit(4, 0)).unwrap();
        assert_eq!(index.remaining_capacity(), 0);
        assert!(matches!(
            index.insert(2, &unit(4, 1)),
            Err(VectorIndexError::InsertError(_))
        ));
    }
}
