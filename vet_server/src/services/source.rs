//! Receipt sources: the upstream store the dashboard data is read from.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::comprobante::RawRow;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// A paginated, read-only view of the `comprobantes` table ordered by `id`.
#[async_trait]
pub trait ComprobanteSource: Send + Sync {
    /// Short name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Fetch up to `limit` rows starting at `offset`, only `is_active` ones
    /// when `active_only` is set.
    ///
    /// The upstream may return fewer than `limit` rows even mid-table.
    async fn fetch_page(
        &self,
        offset: usize,
        limit: usize,
        active_only: bool,
    ) -> Result<Vec<RawRow>, SourceError>;
}

/// Walk the source page by page until an empty page.
///
/// The offset advances by the rows actually returned, so a server-side page
/// cap smaller than `page_size` does not truncate the walk. With a `max_rows`
/// cap, loading stops as soon as the collected rows exceed it.
pub async fn fetch_all(
    source: &dyn ComprobanteSource,
    page_size: usize,
    max_rows: Option<usize>,
    active_only: bool,
) -> Result<Vec<RawRow>, SourceError> {
    let page_size = page_size.max(1);
    let mut rows = Vec::new();
    let mut offset = 0;

    loop {
        let page = source.fetch_page(offset, page_size, active_only).await?;
        let fetched = page.len();
        if fetched == 0 {
            break;
        }
        rows.extend(page);
        offset += fetched;

        if let Some(cap) = max_rows {
            if rows.len() > cap {
                tracing::warn!(
                    source = source.name(),
                    rows = rows.len(),
                    cap,
                    "Row cap exceeded, stopping pagination"
                );
                break;
            }
        }
    }

    tracing::debug!(source = source.name(), rows = rows.len(), "Fetched receipts");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_rows, MemorySource};

    #[tokio::test]
    async fn paginates_until_empty_page() {
        let source = MemorySource::new(sample_rows());
        let rows = fetch_all(&source, 2, None, true).await.unwrap();
        assert_eq!(rows.len(), 9);
        assert_eq!(source.calls(), 6);
    }

    #[tokio::test]
    async fn exact_multiple_needs_a_trailing_empty_page() {
        let source = MemorySource::new(sample_rows());
        let rows = fetch_all(&source, 3, None, true).await.unwrap();
        assert_eq!(rows.len(), 9);
        assert_eq!(source.calls(), 4);
    }

    #[tokio::test]
    async fn server_page_cap_does_not_truncate() {
        let source = MemorySource::new(sample_rows()).with_page_cap(4);
        let rows = fetch_all(&source, 1000, None, true).await.unwrap();

        let ids: Vec<i64> = rows.iter().filter_map(|r| r["id"].as_i64()).collect();
        assert_eq!(ids, (1..=9).collect::<Vec<_>>());
        assert_eq!(source.calls(), 4);
    }

    #[tokio::test]
    async fn active_only_skips_inactive_rows() {
        let mut rows = sample_rows();
        rows[0].insert("is_active".to_string(), false.into());
        let source = MemorySource::new(rows);

        assert_eq!(fetch_all(&source, 100, None, true).await.unwrap().len(), 8);
        assert_eq!(fetch_all(&source, 100, None, false).await.unwrap().len(), 9);
    }

    #[tokio::test]
    async fn stops_once_cap_is_exceeded() {
        let source = MemorySource::new(sample_rows());
        let rows = fetch_all(&source, 2, Some(3), true).await.unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn propagates_source_failures() {
        let source = MemorySource::new(sample_rows());
        source.set_failing(true);
        let err = fetch_all(&source, 100, None, true).await.unwrap_err();
        assert!(matches!(err, SourceError::Status { status: 503, .. }));
    }
}
