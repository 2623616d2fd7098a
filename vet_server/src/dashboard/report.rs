//! Response documents of the dashboard endpoints.

use serde::{Serialize, Serializer};

use crate::dashboard::customers::{
    aging_analysis, customer_insights, top_debtors, AgingBucket, ClientRevenue, CustomerInsights, Debtor,
};
use crate::dashboard::filters::DashboardFilters;
use crate::dashboard::kpi::{kpis_by_month, kpis_by_year, summary, ytd_comparison, KpiItem, SummaryKpis, YtdComparison};
use crate::dashboard::operations::{daily_trends, demand_heatmap, dow_analysis, DailyTrend, DowItem, HeatmapCell};
use crate::dashboard::payments::{payment_mix_data, yearly_payment_shares, PaymentMixItem, YearlyPaymentShare};
use crate::dashboard::quality::{
    anuladas_audit, data_quality, discounts_analysis, DataQuality, DataQualitySummary, DiscountsAnalysis,
};
use crate::dashboard::transactions::{drilldown, pending_invoices, PendingInvoice, TransactionItem};
use crate::models::comprobante::{Comprobante, Dataset};

pub const NO_DATA: &str = "No data available";

/// Either a document or the marker the dashboard shows when nothing is loaded.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum DashboardResponse<T> {
    Data(T),
    Unavailable { error: &'static str },
}

impl<T> DashboardResponse<T> {
    /// Build the document unless the dataset is empty.
    pub fn from_dataset(dataset: &Dataset, build: impl FnOnce(&Dataset) -> T) -> Self {
        if dataset.is_empty() {
            Self::Unavailable { error: NO_DATA }
        } else {
            Self::Data(build(dataset))
        }
    }
}

/// Missing sections go out as `{}` rather than `null`.
fn empty_object_if_none<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Serialize,
    S: Serializer,
{
    match value {
        Some(value) => value.serialize(serializer),
        None => serde_json::Map::new().serialize(serializer),
    }
}

/// `GET /api/dashboard/stats`.
///
/// Per-year sections keep their `_2025` keys; they hold the reference year.
#[derive(Debug, Serialize)]
pub struct AnalyticsReport {
    pub kpis_by_year: Vec<KpiItem>,
    #[serde(serialize_with = "empty_object_if_none")]
    pub ytd_comparison: Option<YtdComparison>,
    pub monthly_seasonality: Vec<KpiItem>,
    pub dow_analysis: Vec<DowItem>,
    pub daily_trends: Vec<DailyTrend>,
    pub demanda_heatmap: Vec<HeatmapCell>,
    pub payment_mix: Vec<YearlyPaymentShare>,
    pub payment_mix_data: Vec<PaymentMixItem>,
    #[serde(rename = "top_debtors_2025")]
    pub top_debtors: Vec<Debtor>,
    pub customer_insights: CustomerInsights,
    #[serde(rename = "aging_analysis_2025")]
    pub aging_analysis: Vec<AgingBucket>,
    pub data_quality: DataQuality,
}

pub fn build_report(dataset: &Dataset, filters: &DashboardFilters) -> AnalyticsReport {
    let sel = filters.select(dataset);
    let year_valid = sel.valid_in_reference_year();
    let scoped_valid: Vec<&Comprobante> = sel.scoped.iter().copied().filter(|c| !c.is_anulado()).collect();

    AnalyticsReport {
        kpis_by_year: kpis_by_year(&sel.rows),
        ytd_comparison: sel
            .reference_year
            .and_then(|year| ytd_comparison(&scoped_valid, year)),
        monthly_seasonality: kpis_by_month(&sel.rows),
        dow_analysis: dow_analysis(&sel.valid),
        daily_trends: daily_trends(&sel.valid),
        demanda_heatmap: demand_heatmap(&sel.valid),
        payment_mix: yearly_payment_shares(&sel.valid),
        payment_mix_data: payment_mix_data(&sel.valid),
        top_debtors: top_debtors(&year_valid),
        customer_insights: customer_insights(&year_valid),
        aging_analysis: aging_analysis(&year_valid, sel.reference_date),
        data_quality: data_quality(dataset, &sel.rows),
    }
}

/// `GET /api/dashboard/summary`.
#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub summary: SummaryKpis,
    pub kpis_by_year: Vec<KpiItem>,
    pub monthly_seasonality: Vec<KpiItem>,
    pub daily_trends: Vec<DailyTrend>,
    pub dow_analysis: Vec<DowItem>,
    pub demanda_heatmap: Vec<HeatmapCell>,
}

pub fn build_summary(dataset: &Dataset, filters: &DashboardFilters) -> SummaryResponse {
    let sel = filters.select(dataset);
    SummaryResponse {
        summary: summary(&sel.rows),
        kpis_by_year: kpis_by_year(&sel.rows),
        monthly_seasonality: kpis_by_month(&sel.rows),
        daily_trends: daily_trends(&sel.valid),
        dow_analysis: dow_analysis(&sel.valid),
        demanda_heatmap: demand_heatmap(&sel.valid),
    }
}

/// Customer insights under the insights endpoint's field names.
#[derive(Debug, Serialize)]
pub struct CustomerInsightsSummary {
    pub total_clients: usize,
    pub retention_rate: f64,
    pub pareto_share: f64,
    pub top_20_clients: Vec<ClientRevenue>,
}

impl From<CustomerInsights> for CustomerInsightsSummary {
    fn from(c: CustomerInsights) -> Self {
        Self {
            total_clients: c.total_clients,
            retention_rate: c.retention_rate_percentage,
            pareto_share: c.pareto_top_20_share_percentage,
            top_20_clients: c.top_20_clients,
        }
    }
}

/// `GET /api/dashboard/insights`.
#[derive(Debug, Serialize)]
pub struct InsightsResponse {
    pub customer_insights: CustomerInsightsSummary,
    pub data_quality: DataQualitySummary,
    pub payment_mix_data: Vec<PaymentMixItem>,
    pub aging_analysis: Vec<AgingBucket>,
    pub discounts_analysis: DiscountsAnalysis,
    pub anuladas_audit: Vec<TransactionItem>,
}

pub fn build_insights(dataset: &Dataset, filters: &DashboardFilters) -> InsightsResponse {
    let sel = filters.select(dataset);
    let year_valid = sel.valid_in_reference_year();
    InsightsResponse {
        customer_insights: customer_insights(&year_valid).into(),
        data_quality: DataQualitySummary::from(&data_quality(dataset, &sel.rows)),
        payment_mix_data: payment_mix_data(&sel.valid),
        aging_analysis: aging_analysis(&year_valid, sel.reference_date),
        discounts_analysis: discounts_analysis(&sel.valid),
        anuladas_audit: anuladas_audit(&sel.rows),
    }
}

/// `GET /api/dashboard/transactions`.
#[derive(Debug, Serialize)]
pub struct TransactionsResponse {
    pub drilldown_data: Vec<TransactionItem>,
    pub pending_invoices: Vec<PendingInvoice>,
}

pub fn build_transactions(dataset: &Dataset, filters: &DashboardFilters, limit: usize) -> TransactionsResponse {
    let sel = filters.select(dataset);
    TransactionsResponse {
        drilldown_data: drilldown(&sel.rows, limit),
        pending_invoices: pending_invoices(&sel.valid, sel.reference_date),
    }
}
