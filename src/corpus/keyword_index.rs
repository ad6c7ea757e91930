/// Tantivy keyword index for full-text search
use super::{Chunk, CorpusFilter};
use std::path::PathBuf;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, QueryParser, TermQuery};
use tantivy::schema::*;
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyError};
use thiserror::Error;

/// Writer heap budget
const WRITER_MEMORY_BYTES: usize = 50_000_000;

#[derive(Error, Debug)]
pub enum KeywordIndexError {
    #[error("Index initialization failed: {0}")]
    InitializationError(String),

    #[error("Insert failed: {0}")]
    InsertError(String),

    #[error("Search failed: {0}")]
    SearchError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Tantivy error: {0}")]
    TantivyError(#[from] TantivyError),
}

/// Search result with ID and relevance score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeywordSearchResult {
    /// Chunk ID
    pub id: u64,
    /// BM25 relevance score (unbounded, not comparable to cosine similarity)
    pub score: f32,
}

/// Tantivy keyword index wrapper
///
/// Provides full-text search with BM25 ranking, filterable by document and language.
pub struct KeywordIndex {
    writer: IndexWriter,
    searcher: KeywordSearcher,
}

/// Read side of a [`KeywordIndex`]
///
/// Cheap to clone and `'static`, so searches can move onto a blocking thread.
#[derive(Clone)]
pub struct KeywordSearcher {
    index: Index,
    reader: IndexReader,
    id_field: Field,
    text_field: Field,
    document_field: Field,
    language_field: Field,
}

impl KeywordIndex {
    /// Create an index held entirely in memory
    pub fn in_memory() -> Result<Self, KeywordIndexError> {
        Self::from_index(Index::create_in_ram(Self::schema()))
    }

    /// Open the index stored in `index_path`, creating it if absent
    pub fn open(index_path: PathBuf) -> Result<Self, KeywordIndexError> {
        if index_path.join("meta.json").exists() {
            let index = Index::open_in_dir(&index_path)
                .map_err(|e| KeywordIndexError::InitializationError(e.to_string()))?;
            Self::from_index(index)
        } else {
            std::fs::create_dir_all(&index_path)?;
            let index = Index::create_in_dir(&index_path, Self::schema())
                .map_err(|e| KeywordIndexError::InitializationError(e.to_string()))?;
            Self::from_index(index)
        }
    }

    fn schema() -> Schema {
        let mut schema_builder = Schema::builder();
        schema_builder.add_u64_field("id", INDEXED | STORED);
        schema_builder.add_text_field("text", TEXT);
        schema_builder.add_text_field("document_id", STRING);
        schema_builder.add_text_field("language", STRING);
        schema_builder.build()
    }

    fn from_index(index: Index) -> Result<Self, KeywordIndexError> {
        let schema = index.schema();
        let field = |name: &str| {
            schema.get_field(name).map_err(|_| {
                KeywordIndexError::InitializationError(format!(
                    "Missing '{}' field in schema",
                    name
                ))
            })
        };

        let id_field = field("id")?;
        let text_field = field("text")?;
        let document_field = field("document_id")?;
        let language_field = field("language")?;

        let writer = index
            .writer(WRITER_MEMORY_BYTES)
            .map_err(|e| KeywordIndexError::InitializationError(e.to_string()))?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .map_err(|e| KeywordIndexError::InitializationError(e.to_string()))?;

        Ok(Self {
            writer,
            searcher: KeywordSearcher {
                index,
                reader,
                id_field,
                text_field,
                document_field,
                language_field,
            },
        })
    }

    /// Add a chunk; visible to search after [`KeywordIndex::commit`]
    pub fn insert(&mut self, chunk: &Chunk) -> Result<(), KeywordIndexError> {
        let fields = &self.searcher;
        let doc = doc!(
            fields.id_field => chunk.id,
            fields.text_field => chunk.text.as_str(),
            fields.document_field => chunk.document_id.as_str(),
            fields.language_field => chunk.language.as_str(),
        );

        self.writer
            .add_document(doc)
            .map_err(|e| KeywordIndexError::InsertError(e.to_string()))?;

        Ok(())
    }

    /// Commit all pending changes
    pub fn commit(&mut self) -> Result<(), KeywordIndexError> {
        self.writer
            .commit()
            .map_err(|e| KeywordIndexError::InsertError(e.to_string()))?;

        // Make the commit visible immediately
        self.searcher
            .reader
            .reload()
            .map_err(|e| KeywordIndexError::SearchError(e.to_string()))?;

        Ok(())
    }

    /// Handle for searching this index off the caller's thread
    pub fn searcher(&self) -> KeywordSearcher {
        self.searcher.clone()
    }

    pub fn search(
        &self,
        query: &str,
        limit: usize,
        filter: &CorpusFilter,
    ) -> Result<Vec<KeywordSearchResult>, KeywordIndexError> {
        self.searcher.search(query, limit, filter)
    }

    pub fn len(&self) -> u64 {
        self.searcher.len()
    }

    pub fn is_empty(&self) -> bool {
        self.searcher.is_empty()
    }
}

impl KeywordSearcher {
    /// Search the index
    ///
    /// Natural-language queries are parsed leniently: syntax the query
    /// language rejects (stray quotes, `?`, `:`) is ignored rather than fatal.
    ///
    /// # Returns
    /// Up to `limit` results sorted by BM25 score descending
    pub fn search(
        &self,
        query: &str,
        limit: usize,
        filter: &CorpusFilter,
    ) -> Result<Vec<KeywordSearchResult>, KeywordIndexError> {
        if limit == 0 || query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let query_parser = QueryParser::for_index(&self.index, vec![self.text_field]);
        let (text_query, parse_errors) = query_parser.parse_query_lenient(query);
        if !parse_errors.is_empty() {
            tracing::debug!(
                "Ignored {} query syntax error(s) in keyword query",
                parse_errors.len()
            );
        }

        let query = self.apply_filter(text_query, filter);
        let searcher = self.reader.searcher();

        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(limit))
            .map_err(|e| KeywordIndexError::SearchError(e.to_string()))?;

        let mut results = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let retrieved_doc: TantivyDocument = searcher
                .doc(doc_address)
                .map_err(|e| KeywordIndexError::SearchError(e.to_string()))?;

            let id = retrieved_doc
                .get_first(self.id_field)
                .and_then(|v| v.as_u64())
                .ok_or_else(|| {
                    KeywordIndexError::SearchError("Missing or invalid ID field".to_string())
                })?;

            results.push(KeywordSearchResult { id, score });
        }

        Ok(results)
    }

    fn apply_filter(&self, text_query: Box<dyn Query>, filter: &CorpusFilter) -> Box<dyn Query> {
        let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();

        if let Some(document_id) = &filter.document_id {
            clauses.push((Occur::Must, self.term_query(self.document_field, document_id)));
        }
        if let Some(language) = &filter.language {
            clauses.push((Occur::Must, self.term_query(self.language_field, language)));
        }

        if clauses.is_empty() {
            return text_query;
        }

        clauses.push((Occur::Must, text_query));
        Box::new(BooleanQuery::new(clauses))
    }

    fn term_query(&self, field: Field, value: &str) -> Box<dyn Query> {
        Box::new(TermQuery::new(
            Term::from_field_text(field, value),
            IndexRecordOption::Basic,
        ))
    }

    /// Get the number of documents in the index
    pub fn len(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    /// Check if index is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
