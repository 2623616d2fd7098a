//! In-memory dataset cache with a reload-on-expiry policy.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};

use crate::config::ApiConfig;
use crate::models::comprobante::{Dataset, RawRow};
use crate::services::source::{fetch_all, ComprobanteSource, SourceError};

/// A loaded snapshot of the receipts table.
#[derive(Clone)]
pub struct CachedDataset {
    pub dataset: Arc<Dataset>,
    pub loaded_at: Instant,
    pub loaded_at_utc: DateTime<Utc>,
}

pub struct DatasetService {
    source: Arc<dyn ComprobanteSource>,
    ttl: Duration,
    page_size: usize,
    max_rows: usize,
    active_only: bool,
    cache: RwLock<Option<CachedDataset>>,
    /// Held for the duration of a load so only one runs at a time.
    reload: Mutex<()>,
}

impl DatasetService {
    pub fn new(source: Arc<dyn ComprobanteSource>, config: &ApiConfig) -> Self {
        Self {
            source,
            ttl: Duration::from_secs(config.cache_ttl_secs),
            page_size: config.page_size,
            max_rows: config.max_rows,
            active_only: config.active_only,
            cache: RwLock::new(None),
            reload: Mutex::new(()),
        }
    }

    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    /// The cached dataset, reloading it when missing or expired.
    ///
    /// While another request is reloading, an expired snapshot is served as
    /// is. A failed reload keeps serving the stale snapshot. With nothing
    /// cached an empty dataset is returned and the next call retries.
    pub async fn current(&self) -> Arc<Dataset> {
        let stale = {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref().filter(|c| self.is_fresh(c)) {
                crate::metrics::cache_hit();
                return cached.dataset.clone();
            }
            cache.as_ref().map(|c| c.dataset.clone())
        };

        let _reload = match (self.reload.try_lock(), stale) {
            (Ok(guard), _) => guard,
            (Err(_), Some(stale)) => return stale,
            (Err(_), None) => self.reload.lock().await,
        };

        // Another request may have finished a load while this one waited.
        if let Some(cached) = self.cache.read().await.as_ref().filter(|c| self.is_fresh(c)) {
            return cached.dataset.clone();
        }

        match self.load().await {
            Ok(loaded) => {
                let dataset = loaded.dataset.clone();
                *self.cache.write().await = Some(loaded);
                dataset
            }
            Err(e) => {
                tracing::warn!(source = self.source.name(), "Dataset reload failed: {e}");
                crate::metrics::dataset_refresh_failed(self.source.name());
                let cache = self.cache.read().await;
                match cache.as_ref() {
                    Some(stale) => stale.dataset.clone(),
                    None => Arc::new(Dataset::default()),
                }
            }
        }
    }

    /// Reload unconditionally, replacing the cache on success.
    pub async fn refresh(&self) -> Result<CachedDataset, SourceError> {
        let _reload = self.reload.lock().await;
        let loaded = self.load().await.inspect_err(|_| {
            crate::metrics::dataset_refresh_failed(self.source.name());
        })?;
        *self.cache.write().await = Some(loaded.clone());
        Ok(loaded)
    }

    /// Every active row straight from the source, bypassing the cache and
    /// the row cap. The active-rows filter applies regardless of
    /// `FETCH_ACTIVE_ONLY`.
    pub async fn fetch_raw(&self) -> Result<Vec<RawRow>, SourceError> {
        fetch_all(self.source.as_ref(), self.page_size, None, true).await
    }

    fn is_fresh(&self, cached: &CachedDataset) -> bool {
        cached.loaded_at.elapsed() < self.ttl
    }

    async fn load(&self) -> Result<CachedDataset, SourceError> {
        let started = Instant::now();
        let raw = fetch_all(
            self.source.as_ref(),
            self.page_size,
            Some(self.max_rows),
            self.active_only,
        )
        .await?;
        let dataset = Dataset::from_raw(&raw);

        crate::metrics::dataset_refreshed(dataset.len(), started.elapsed());
        tracing::info!(
            source = self.source.name(),
            rows = dataset.len(),
            dropped = dataset.dropped,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Dataset loaded"
        );

        Ok(CachedDataset {
            dataset: Arc::new(dataset),
            loaded_at: Instant::now(),
            loaded_at_utc: Utc::now(),
        })
    }
}
