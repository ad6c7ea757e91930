/// Single-initialization cell for heavyweight model handles
use std::sync::{Arc, Mutex, OnceLock};

type Loader<M> = Box<dyn Fn() -> anyhow::Result<M> + Send + Sync>;

/// Lazily loaded, shared, read-only model handle.
///
/// The first caller of [`LazyModel::get`] runs the loader while holding the
/// init mutex; concurrent callers wait and then observe the same handle.
/// A failed load is not cached, so the next call retries.
pub struct LazyModel<M> {
    name: String,
    cell: OnceLock<Arc<M>>,
    init: Mutex<()>,
    loader: Loader<M>,
}

impl<M> LazyModel<M> {
    pub fn new(
        name: impl Into<String>,
        loader: impl Fn() -> anyhow::Result<M> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            cell: OnceLock::new(),
            init: Mutex::new(()),
            loader: Box::new(loader),
        }
    }

    /// Get the model, loading it on first use
    pub fn get(&self) -> anyhow::Result<Arc<M>> {
        if let Some(model) = self.cell.get() {
            return Ok(Arc::clone(model));
        }

        let _guard = self.init.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        // Another caller may have finished loading while we waited
        if let Some(model) = self.cell.get() {
            return Ok(Arc::clone(model));
        }

        tracing::info!("Loading model: {}", self.name);
        let start = std::time::Instant::now();
        let model = Arc::new((self.loader)()?);
        tracing::info!(
            "Model {} loaded in {}ms",
            self.name,
            start.elapsed().as_millis()
        );

        let _ = self.cell.set(Arc::clone(&model));
        Ok(model)
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
