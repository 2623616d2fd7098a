//! Dashboard API, nested at `/api/dashboard`.

use std::collections::BTreeMap;
use std::time::Instant;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::dashboard::customers::{search_client_history, ClientHistory};
use crate::dashboard::filters::DashboardFilters;
use crate::dashboard::golden::{verify, GoldenCheck};
use crate::dashboard::report::{
    build_insights, build_report, build_summary, build_transactions, AnalyticsReport, DashboardResponse,
    InsightsResponse, SummaryResponse, TransactionsResponse,
};
use crate::routes::AppState;

const DEFAULT_LIMIT: usize = 500;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stats", get(stats))
        .route("/summary", get(summary))
        .route("/insights", get(insights))
        .route("/transactions", get(transactions))
        .route("/client_search", get(client_search))
        .route("/golden-verification", get(golden_verification))
        .route("/refresh", post(refresh))
}

/// Run an analytics pass off the async runtime and record its duration.
async fn compute<T, F>(endpoint: &'static str, work: F) -> Result<T, StatusCode>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let started = Instant::now();
    let out = tokio::task::spawn_blocking(work).await.map_err(|e| {
        tracing::error!(endpoint, "Analytics task failed: {e}");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    crate::metrics::analytics_duration(endpoint, started.elapsed());
    Ok(out)
}

// ── Analytics ──

async fn stats(
    State(state): State<AppState>,
    Query(filters): Query<DashboardFilters>,
) -> Result<Json<DashboardResponse<AnalyticsReport>>, StatusCode> {
    let dataset = state.datasets.current().await;
    compute("stats", move || {
        DashboardResponse::from_dataset(&dataset, |ds| build_report(ds, &filters))
    })
    .await
    .map(Json)
}

async fn summary(
    State(state): State<AppState>,
    Query(filters): Query<DashboardFilters>,
) -> Result<Json<DashboardResponse<SummaryResponse>>, StatusCode> {
    let dataset = state.datasets.current().await;
    compute("summary", move || {
        DashboardResponse::from_dataset(&dataset, |ds| build_summary(ds, &filters))
    })
    .await
    .map(Json)
}

async fn insights(
    State(state): State<AppState>,
    Query(filters): Query<DashboardFilters>,
) -> Result<Json<DashboardResponse<InsightsResponse>>, StatusCode> {
    let dataset = state.datasets.current().await;
    compute("insights", move || {
        DashboardResponse::from_dataset(&dataset, |ds| build_insights(ds, &filters))
    })
    .await
    .map(Json)
}

#[derive(Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

async fn transactions(
    State(state): State<AppState>,
    Query(filters): Query<DashboardFilters>,
    Query(page): Query<LimitQuery>,
) -> Result<Json<DashboardResponse<TransactionsResponse>>, StatusCode> {
    let dataset = state.datasets.current().await;
    let limit = page.limit.unwrap_or(DEFAULT_LIMIT);
    compute("transactions", move || {
        DashboardResponse::from_dataset(&dataset, |ds| build_transactions(ds, &filters, limit))
    })
    .await
    .map(Json)
}

#[derive(Deserialize)]
pub struct ClientSearchQuery {
    #[serde(default)]
    pub query: String,
}

async fn client_search(
    State(state): State<AppState>,
    Query(params): Query<ClientSearchQuery>,
) -> Result<Json<Vec<ClientHistory>>, StatusCode> {
    if params.query.trim().is_empty() {
        return Ok(Json(Vec::new()));
    }
    let dataset = state.datasets.current().await;
    compute("client_search", move || {
        search_client_history(&dataset.rows, &params.query)
    })
    .await
    .map(Json)
}

// ── Golden dataset ──

fn detail(status: StatusCode, message: impl ToString) -> (StatusCode, Json<Value>) {
    (status, Json(json!({"detail": message.to_string()})))
}

async fn golden_verification(
    State(state): State<AppState>,
) -> Result<Json<BTreeMap<String, GoldenCheck>>, (StatusCode, Json<Value>)> {
    let rows = state.datasets.fetch_raw().await.map_err(|e| {
        tracing::error!(source = state.datasets.source_name(), "Golden verification fetch failed: {e}");
        detail(StatusCode::INTERNAL_SERVER_ERROR, e)
    })?;

    let expectations = state.golden.clone();
    let results = compute("golden_verification", move || verify(&rows, &expectations))
        .await
        .map_err(|status| detail(status, "verification task failed"))?;

    for (key, check) in &results {
        crate::metrics::golden_check(key, check.status.passed());
    }
    let failed = results.values().filter(|c| !c.status.passed()).count();
    tracing::info!(checks = results.len(), failed, "Golden verification completed");

    Ok(Json(results))
}

// ── Cache control ──

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub rows: usize,
    pub loaded_at: String,
}

async fn refresh(State(state): State<AppState>) -> Result<Json<RefreshResponse>, StatusCode> {
    state
        .datasets
        .refresh()
        .await
        .map(|loaded| {
            Json(RefreshResponse {
                rows: loaded.dataset.len(),
                loaded_at: loaded.loaded_at_utc.to_rfc3339(),
            })
        })
        .map_err(|e| {
            tracing::error!(source = state.datasets.source_name(), "Dataset refresh failed: {e}");
            StatusCode::BAD_GATEWAY
        })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use tower::ServiceExt;

    use super::*;
    use crate::config::ApiConfig;
    use crate::dashboard::golden::GoldenExpectations;
    use crate::routes::app_router;
    use crate::services::dataset_service::DatasetService;
    use crate::test_support::{sample_rows, MemorySource};

    fn app(source: Arc<MemorySource>) -> Router {
        let state = AppState {
            datasets: Arc::new(DatasetService::new(source, &ApiConfig::default())),
            golden: Arc::new(GoldenExpectations::default()),
        };
        app_router(state, Duration::from_secs(5))
    }

    async fn send(app: Router, method: Method, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        send(app, Method::GET, uri).await
    }

    #[tokio::test]
    async fn root_and_health() {
        let source = Arc::new(MemorySource::new(sample_rows()));
        let (status, body) = get_json(app(source.clone()), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"Hello": "World", "Project": "Vet Animal Wellness Backend"}));

        let (status, body) = get_json(app(source), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn stats_applies_query_filters() {
        let source = Arc::new(MemorySource::new(sample_rows()));
        let (status, body) = get_json(app(source), "/api/dashboard/stats?year=2024&status=all").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ytd_comparison"]["current_year"], 2024);
        assert_eq!(body["data_quality"]["total_records"], 3);
        assert_eq!(body["top_debtors_2025"], json!([]));
    }

    #[tokio::test]
    async fn stats_keeps_the_dashboard_keys() {
        let source = Arc::new(MemorySource::new(sample_rows()));
        let (status, body) = get_json(app(source.clone()), "/api/dashboard/stats").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["top_debtors_2025"][0]["cliente"], "Clínica Sur");
        assert_eq!(body["aging_analysis_2025"][1]["amount"], 30000.0);
        assert_eq!(body["customer_insights"]["total_clients_2025"], 3);
        assert_eq!(body["ytd_comparison"]["facturado_2025"], 80000.0);
        assert_eq!(body["ytd_comparison"]["facturado_2024"], 5000.0);
        assert_eq!(body["ytd_comparison"]["tx_2025"], 4);
        assert_eq!(body["ytd_comparison"]["tx_2024"], 1);
        assert!(body.get("top_debtors").is_none());

        let (_, body) = get_json(app(source), "/api/dashboard/stats?year=2019").await;
        assert_eq!(body["ytd_comparison"], json!({}));
    }

    #[tokio::test]
    async fn stats_without_data_reports_unavailable() {
        let source = Arc::new(MemorySource::new(Vec::new()));
        let (status, body) = get_json(app(source), "/api/dashboard/stats").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"error": "No data available"}));
    }

    #[tokio::test]
    async fn transactions_honour_the_limit() {
        let source = Arc::new(MemorySource::new(sample_rows()));
        let (status, body) = get_json(app(source), "/api/dashboard/transactions?limit=2&search=ana").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["drilldown_data"].as_array().map(Vec::len), Some(2));
        assert_eq!(body["drilldown_data"][0]["estado"], "ANULADO");
        assert_eq!(body["pending_invoices"], json!([]));
    }

    #[tokio::test]
    async fn summary_and_insights_respond() {
        let source = Arc::new(MemorySource::new(sample_rows()));
        let (status, body) = get_json(app(source.clone()), "/api/dashboard/summary").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["summary"]["tx_count"], 7);

        let (status, body) = get_json(app(source), "/api/dashboard/insights?tipo=boleta").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["customer_insights"]["total_clients"], 2);
    }

    #[tokio::test]
    async fn client_search_returns_histories() {
        let source = Arc::new(MemorySource::new(sample_rows()));
        let (status, body) = get_json(app(source.clone()), "/api/dashboard/client_search?query=Bruno").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["cliente"], "Bruno Díaz");
        assert_eq!(body[0]["tx_count"], 2);

        let (_, body) = get_json(app(source.clone()), "/api/dashboard/client_search?query=").await;
        assert_eq!(body, json!([]));
        assert_eq!(source.loads(), 1);
    }

    #[tokio::test]
    async fn golden_verification_reports_each_check() {
        let source = Arc::new(MemorySource::new(sample_rows()));
        let (status, body) = get_json(app(source), "/api/dashboard/golden-verification").await;

        assert_eq!(status, StatusCode::OK);
        let checks = body.as_object().unwrap();
        assert_eq!(checks.len(), 9);
        assert_eq!(body["test_1"]["name"], "Total de transacciones");
        assert_eq!(body["test_1"]["status"], "FAIL");
        assert_eq!(body["test_1"]["actual"], 8);
    }

    #[tokio::test]
    async fn golden_verification_surfaces_source_errors() {
        let source = Arc::new(MemorySource::new(sample_rows()));
        source.set_failing(true);
        let (status, body) = get_json(app(source), "/api/dashboard/golden-verification").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["detail"].as_str().is_some_and(|d| d.contains("503")));
    }

    #[tokio::test]
    async fn refresh_reloads_or_reports_bad_gateway() {
        let source = Arc::new(MemorySource::new(sample_rows()));
        let (status, body) = send(app(source.clone()), Method::POST, "/api/dashboard/refresh").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["rows"], 8);
        assert!(body["loaded_at"].is_string());

        source.set_failing(true);
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/dashboard/refresh")
            .body(Body::empty())
            .unwrap();
        let response = app(source).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
