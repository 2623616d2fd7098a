//! Data-quality scan, discount breakdown and the voided-receipt audit.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::dashboard::kpi::Totals;
use crate::dashboard::transactions::TransactionItem;
use crate::dashboard::{count_percentage, ratio, to_f64};
use crate::models::comprobante::{Comprobante, Dataset};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataQuality {
    pub total_records: usize,
    pub missing_payment_percentage: f64,
    pub missing_client_percentage: f64,
    pub anuladas_percentage: f64,
    pub with_discounts_percentage: f64,
}

/// The same scan under the short names used by the insights endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataQualitySummary {
    pub total_records: usize,
    pub missing_payment_pct: f64,
    pub missing_client_pct: f64,
    pub anuladas_pct: f64,
}

impl From<&DataQuality> for DataQualitySummary {
    fn from(q: &DataQuality) -> Self {
        Self {
            total_records: q.total_records,
            missing_payment_pct: q.missing_payment_percentage,
            missing_client_pct: q.missing_client_percentage,
            anuladas_pct: q.anuladas_percentage,
        }
    }
}

fn count_where(rows: &[&Comprobante], pred: impl Fn(&Comprobante) -> bool) -> usize {
    rows.iter().filter(|c| pred(c)).count()
}

/// Scan the filtered rows, voided ones included.
///
/// A column the source never returned is not counted as missing.
pub fn data_quality(dataset: &Dataset, rows: &[&Comprobante]) -> DataQuality {
    let total = rows.len();
    let missing_payment = if dataset.has_forma_pago {
        count_where(rows, |c| c.forma_pago.is_none())
    } else {
        0
    };
    let missing_client = if dataset.has_cliente {
        count_where(rows, |c| c.cliente.is_none())
    } else {
        0
    };

    DataQuality {
        total_records: total,
        missing_payment_percentage: count_percentage(missing_payment, total),
        missing_client_percentage: count_percentage(missing_client, total),
        anuladas_percentage: count_percentage(count_where(rows, Comprobante::is_anulado), total),
        with_discounts_percentage: count_percentage(
            count_where(rows, |c| c.descuento > Decimal::ZERO),
            total,
        ),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyDiscount {
    pub year: i32,
    pub month: u32,
    pub descuento: f64,
    pub tx_with_discount: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscountsAnalysis {
    pub total_descuento: f64,
    pub tx_with_discount: usize,
    pub tx_with_discount_pct: f64,
    /// Mean discount over the receipts that carry one.
    pub avg_discount: f64,
    pub discount_rate_percentage: f64,
    pub monthly: Vec<MonthlyDiscount>,
}

pub fn discounts_analysis(valid: &[&Comprobante]) -> DiscountsAnalysis {
    let totals = Totals::of(valid.iter().copied());

    let mut months: BTreeMap<(i32, u32), (Decimal, usize)> = BTreeMap::new();
    for c in valid.iter().filter(|c| c.descuento > Decimal::ZERO) {
        let month = months.entry((c.year(), c.month())).or_default();
        month.0 = month.0.saturating_add(c.descuento);
        month.1 += 1;
    }

    DiscountsAnalysis {
        total_descuento: to_f64(totals.descuento),
        tx_with_discount: totals.with_discount,
        tx_with_discount_pct: count_percentage(totals.with_discount, totals.tx_count),
        avg_discount: ratio(totals.descuento, Decimal::from(totals.with_discount)),
        discount_rate_percentage: totals.discount_rate(),
        monthly: months
            .into_iter()
            .map(|((year, month), (descuento, tx_with_discount))| MonthlyDiscount {
                year,
                month,
                descuento: to_f64(descuento),
                tx_with_discount,
            })
            .collect(),
    }
}

/// Voided receipts, newest first.
pub fn anuladas_audit(rows: &[&Comprobante]) -> Vec<TransactionItem> {
    let mut voided: Vec<&Comprobante> = rows.iter().copied().filter(|c| c.is_anulado()).collect();
    voided.sort_by(|a, b| b.fecha_emision.cmp(&a.fecha_emision));
    voided.into_iter().map(TransactionItem::from).collect()
}
