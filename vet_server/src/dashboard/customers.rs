//! Customer-facing analytics: debtors, retention/concentration, receivable
//! aging and client history search.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::dashboard::kpi::Totals;
use crate::dashboard::transactions::TransactionItem;
use crate::dashboard::{count_percentage, percentage, to_f64};
use crate::models::comprobante::{Comprobante, ISO_FORMAT};

const TOP_DEBTORS: usize = 5;
const TOP_CLIENTS: usize = 20;
const MAX_SEARCH_RESULTS: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Debtor {
    pub cliente: String,
    pub pendiente: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientRevenue {
    pub cliente: String,
    pub facturado: f64,
    pub tx_count: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CustomerInsights {
    #[serde(rename = "total_clients_2025")]
    pub total_clients: usize,
    pub retention_rate_percentage: f64,
    pub pareto_top_20_share_percentage: f64,
    pub top_20_clients: Vec<ClientRevenue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgingBucket {
    pub range: &'static str,
    pub amount: f64,
}

fn by_client<'a>(rows: impl IntoIterator<Item = &'a Comprobante>) -> BTreeMap<&'a str, Totals> {
    let mut clients: BTreeMap<&str, Totals> = BTreeMap::new();
    for c in rows {
        if let Some(cliente) = c.cliente.as_deref() {
            clients.entry(cliente).or_default().add(c);
        }
    }
    clients
}

/// Clients with the largest outstanding balance, largest first.
pub fn top_debtors(year_valid: &[&Comprobante]) -> Vec<Debtor> {
    let pending = year_valid.iter().copied().filter(|c| c.has_pending());
    let mut debtors: Vec<(&str, Decimal)> = by_client(pending)
        .into_iter()
        .map(|(cliente, totals)| (cliente, totals.pendiente))
        .collect();
    debtors.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    debtors
        .into_iter()
        .take(TOP_DEBTORS)
        .map(|(cliente, pendiente)| Debtor {
            cliente: cliente.to_string(),
            pendiente: to_f64(pendiente),
        })
        .collect()
}

/// Retention and revenue concentration over one year's valid receipts.
pub fn customer_insights(year_valid: &[&Comprobante]) -> CustomerInsights {
    let clients = by_client(year_valid.iter().copied());
    if clients.is_empty() {
        return CustomerInsights::default();
    }

    let total_clients = clients.len();
    let returning = clients.values().filter(|t| t.tx_count > 1).count();

    let mut ranked: Vec<(&str, Totals)> = clients.into_iter().collect();
    ranked.sort_by(|a, b| b.1.facturado.cmp(&a.1.facturado).then_with(|| a.0.cmp(b.0)));
    ranked.truncate(TOP_CLIENTS);

    let top_revenue: Decimal = ranked.iter().map(|(_, t)| t.facturado).sum();
    let total_revenue: Decimal = year_valid.iter().map(|c| c.facturado).sum();

    CustomerInsights {
        total_clients,
        retention_rate_percentage: count_percentage(returning, total_clients),
        pareto_top_20_share_percentage: percentage(top_revenue, total_revenue),
        top_20_clients: ranked
            .into_iter()
            .map(|(cliente, t)| ClientRevenue {
                cliente: cliente.to_string(),
                facturado: to_f64(t.facturado),
                tx_count: t.tx_count,
            })
            .collect(),
    }
}

const AGING_RANGES: [&str; 4] = ["0-7 días", "8-30 días", "31-60 días", "60+ días"];

fn aging_bucket(days: i64) -> usize {
    match days {
        d if d <= 7 => 0,
        d if d <= 30 => 1,
        d if d <= 60 => 2,
        _ => 3,
    }
}

/// Outstanding amounts by age relative to `reference`. Empty when nothing is pending.
pub fn aging_analysis(year_valid: &[&Comprobante], reference: Option<NaiveDateTime>) -> Vec<AgingBucket> {
    let Some(reference) = reference else {
        return Vec::new();
    };
    let pending: Vec<&Comprobante> = year_valid.iter().copied().filter(|c| c.has_pending()).collect();
    if pending.is_empty() {
        return Vec::new();
    }

    let mut amounts = [Decimal::ZERO; 4];
    for c in pending {
        let days = (reference - c.fecha_emision).num_days();
        let bucket = &mut amounts[aging_bucket(days)];
        *bucket = bucket.saturating_add(c.pendiente);
    }

    AGING_RANGES
        .iter()
        .zip(amounts)
        .map(|(range, amount)| AgingBucket {
            range,
            amount: to_f64(amount),
        })
        .collect()
}

/// One client's history as returned by the client search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientHistory {
    pub cliente: String,
    pub facturado: f64,
    pub pagado: f64,
    pub pendiente: f64,
    pub tx_count: usize,
    pub first_visit: String,
    pub last_visit: String,
    pub transactions: Vec<TransactionItem>,
}

/// Clients whose name contains `query` (case-insensitive), best customers first.
///
/// Totals cover valid receipts; the transaction list also shows voided ones.
pub fn search_client_history(rows: &[Comprobante], query: &str) -> Vec<ClientHistory> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }

    let mut matches: BTreeMap<&str, Vec<&Comprobante>> = BTreeMap::new();
    for c in rows {
        if let Some(cliente) = c.cliente.as_deref() {
            if cliente.to_lowercase().contains(&needle) {
                matches.entry(cliente).or_default().push(c);
            }
        }
    }

    let mut histories: Vec<ClientHistory> = matches
        .into_iter()
        .map(|(cliente, mut receipts)| {
            receipts.sort_by(|a, b| b.fecha_emision.cmp(&a.fecha_emision));
            let totals = Totals::of(receipts.iter().copied().filter(|c| !c.is_anulado()));
            let visit = |c: Option<&&Comprobante>| {
                c.map(|c| c.fecha_emision.format(ISO_FORMAT).to_string())
                    .unwrap_or_default()
            };
            ClientHistory {
                cliente: cliente.to_string(),
                facturado: to_f64(totals.facturado),
                pagado: to_f64(totals.pagado),
                pendiente: to_f64(totals.pendiente),
                tx_count: totals.tx_count,
                first_visit: visit(receipts.last()),
                last_visit: visit(receipts.first()),
                transactions: receipts.into_iter().map(TransactionItem::from).collect(),
            }
        })
        .collect();

    histories.sort_by(|a, b| {
        b.facturado
            .total_cmp(&a.facturado)
            .then_with(|| a.cliente.cmp(&b.cliente))
    });
    histories.truncate(MAX_SEARCH_RESULTS);
    histories
}
