//! End-to-end retrieval: strategy → embed → recall → fuse → rerank → MMR

use super::fusion::{fuse, FusionConfig};
use super::language::detect_language;
use super::materialize::{materialize, Diagnostics, RankedResult};
use super::mmr::select_diverse_with_reserve;
use super::recall::{recall_lexical, recall_vector};
use super::reranker::{CrossEncoder, FastEmbedReranker, RerankConfig, Reranker};
use crate::config::{Config, RerankerConfig};
use crate::corpus::{Corpus, CorpusFilter};
use crate::embedding::{embed_query, EmbeddingProvider, FastEmbedProvider, InferencePool};
use crate::error::{Result, RetrievalError};
use crate::strategy::{RetrievalParams, StrategyContext, StrategyResolver, StrategySettings};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, field, info, info_span, warn, Instrument, Span};

/// Hybrid retriever over a read-only corpus
///
/// Holds no per-request state; one instance serves concurrent requests.
pub struct Retriever {
    corpus: Arc<dyn Corpus>,
    embedder: Arc<dyn EmbeddingProvider>,
    reranker: Option<Reranker>,
    resolver: StrategyResolver,
    pool: InferencePool,
    params: RetrievalParams,
    rerank_settings: RerankerConfig,
}

impl Retriever {
    pub fn builder(
        corpus: Arc<dyn Corpus>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> RetrieverBuilder {
        RetrieverBuilder::new(corpus, embedder)
    }

    /// Build a retriever with FastEmbed models as configured
    ///
    /// Models are not loaded until the first request needs them.
    pub fn from_config(config: &Config, corpus: Arc<dyn Corpus>) -> Result<Self> {
        let embedder =
            FastEmbedProvider::new(&config.embedding.model, config.embedding.batch_size)
                .map_err(|e| RetrievalError::provider(&config.embedding.model, e))?;

        let mut builder = Self::builder(corpus, Arc::new(embedder))
            .with_params(config.retrieval.clone())
            .with_strategy(config.strategy.clone())
            .with_rerank_settings(config.reranker.clone())
            .with_max_concurrent(config.inference.max_concurrent);

        if config.reranker.enabled {
            let encoder = FastEmbedReranker::new(&config.reranker.model, config.reranker.batch_size)
                .map_err(|e| RetrievalError::provider(&config.reranker.model, e))?;
            builder = builder.with_cross_encoder(Arc::new(encoder));
        }

        builder.build()
    }

    /// Base parameters the strategy resolver adjusts per request
    pub fn params(&self) -> &RetrievalParams {
        &self.params
    }

    pub fn has_reranker(&self) -> bool {
        self.reranker.is_some()
    }

    /// Retrieve ranked passages for one request
    ///
    /// Returns at most `min(ctx.top_k, resolved top_k)` distinct passages in
    /// MMR selection order. An empty corpus or no matches is an empty result.
    /// Lexical and rerank failures degrade; embedding and vector recall
    /// failures fail the request. Dropping the future abandons the request.
    pub async fn retrieve(&self, ctx: &StrategyContext) -> Result<RankedResult> {
        let span = info_span!(
            "retrieve",
            request_id = %ctx.request_id,
            channel = ctx.channel.as_str(),
            scenario = field::Empty,
        );
        self.run(ctx).instrument(span).await
    }

    async fn run(&self, ctx: &StrategyContext) -> Result<RankedResult> {
        let started = Instant::now();

        if ctx.query.trim().is_empty() {
            return Err(RetrievalError::InvalidQuery(
                "Query text cannot be empty".to_string(),
            ));
        }

        let strategy = self.resolver.resolve(ctx, &self.params);
        Span::current().record("scenario", strategy.scenario.as_str());
        let params = &strategy.params;

        // Caller's top_k is an upper bound the strategy cannot raise
        let top_k = ctx.top_k.map_or(params.top_k, |k| k.min(params.top_k));

        let mut diagnostics = Diagnostics::new(ctx.request_id, strategy.scenario);
        diagnostics.adaptive = strategy.adaptive;
        diagnostics.effective_top_k = top_k;

        if top_k == 0 || self.corpus.is_empty() {
            debug!("Nothing to retrieve (top_k = {}, corpus size = {})", top_k, self.corpus.len());
            return Ok(RankedResult::empty(diagnostics));
        }

        let query_language = ctx
            .language
            .clone()
            .or_else(|| detect_language(&ctx.query).map(String::from));
        diagnostics.query_language = query_language.clone();

        let query_vector = embed_query(&self.embedder, &self.pool, &ctx.query).await?;

        let filter = CorpusFilter {
            document_id: ctx.document_id.clone(),
            language: None,
        };
        let corpus = self.corpus.as_ref();
        let (vector, lexical) = tokio::join!(
            recall_vector(corpus, &query_vector, params.vector_candidates(), &filter),
            recall_lexical(corpus, &ctx.query, params.lexical_candidates, &filter),
        );

        let vector = vector?;
        let lexical = match lexical {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("Lexical recall failed, continuing with vector candidates: {}", e);
                diagnostics.lexical_degraded = true;
                Vec::new()
            }
        };
        diagnostics.vector_candidates = vector.len();
        diagnostics.lexical_candidates = lexical.len();

        let fusion_config = FusionConfig::new(params, query_language)
            .map_err(|e| RetrievalError::InvalidConfiguration(e.to_string()))?;
        let fused = fuse(vector, lexical, &fusion_config);
        diagnostics.fused_candidates = fused.len();

        let (ranked, reserve) = match &self.reranker {
            Some(reranker) => {
                let config = RerankConfig::new(
                    params,
                    self.rerank_settings.batch_size,
                    self.rerank_settings.max_passage_chars,
                    self.rerank_settings.fallback_count,
                );
                let outcome = reranker.rerank(&ctx.query, fused, &config).await;
                diagnostics.reranked_candidates = outcome.scored;
                diagnostics.rerank_degraded = outcome.degraded;
                diagnostics.rerank_fallback = outcome.fallback_used;
                (outcome.candidates, outcome.reserve)
            }
            None => (fused, Vec::new()),
        };

        let selected = select_diverse_with_reserve(
            ranked,
            reserve,
            top_k,
            params.mmr_lambda,
            params.per_document_cap,
        );
        // Soft mode filled slots from below the threshold
        if selected
            .iter()
            .any(|c| c.rerank_score().is_some_and(|s| s < params.min_rerank_score))
        {
            diagnostics.rerank_fallback = true;
        }

        diagnostics.elapsed_ms = started.elapsed().as_millis() as u64;
        let result = materialize(selected, top_k, diagnostics);

        info!(
            scenario = %strategy.scenario,
            results = result.len(),
            fused = result.diagnostics.fused_candidates,
            elapsed_ms = result.diagnostics.elapsed_ms,
            "Retrieval complete"
        );

        Ok(result)
    }
}

/// Assembles a [`Retriever`] from its collaborators
pub struct RetrieverBuilder {
    corpus: Arc<dyn Corpus>,
    embedder: Arc<dyn EmbeddingProvider>,
    cross_encoder: Option<Arc<dyn CrossEncoder>>,
    params: RetrievalParams,
    strategy: StrategySettings,
    rerank_settings: RerankerConfig,
    max_concurrent: usize,
}

impl RetrieverBuilder {
    pub fn new(corpus: Arc<dyn Corpus>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            corpus,
            embedder,
            cross_encoder: None,
            params: RetrievalParams::default(),
            strategy: StrategySettings::default(),
            rerank_settings: RerankerConfig::default(),
            max_concurrent: InferencePool::default().max_concurrent(),
        }
    }

    pub fn with_cross_encoder(mut self, encoder: Arc<dyn CrossEncoder>) -> Self {
        self.cross_encoder = Some(encoder);
        self
    }

    pub fn with_params(mut self, params: RetrievalParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_strategy(mut self, strategy: StrategySettings) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_rerank_settings(mut self, settings: RerankerConfig) -> Self {
        self.rerank_settings = settings;
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    pub fn build(self) -> Result<Retriever> {
        if self.embedder.dimension() != self.corpus.dimension() {
            return Err(RetrievalError::Config(format!(
                "Embedding model {} produces {}-dim vectors but the corpus holds {}-dim vectors",
                self.embedder.model_name(),
                self.embedder.dimension(),
                self.corpus.dimension()
            )));
        }

        let pool = InferencePool::new(self.max_concurrent);
        let reranker = self
            .cross_encoder
            .map(|encoder| Reranker::new(encoder, pool.clone()));

        Ok(Retriever {
            corpus: self.corpus,
            embedder: self.embedder,
            reranker,
            resolver: StrategyResolver::new(self.strategy)?,
            pool,
            params: self.params,
            rerank_settings: self.rerank_settings,
        })
    }
}
