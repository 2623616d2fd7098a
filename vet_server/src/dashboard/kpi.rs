//! KPI aggregates for the dashboard: yearly/monthly breakdowns, headline
//! summary and the year-to-date comparison.

use std::collections::BTreeMap;

use chrono::Datelike;
use rust_decimal::Decimal;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::dashboard::{count_percentage, percentage, ratio, to_f64};
use crate::models::comprobante::{Comprobante, ISO_FORMAT};

/// Running sums over a group of receipts.
#[derive(Debug, Clone, Copy, Default)]
pub struct Totals {
    pub tx_count: usize,
    pub facturado: Decimal,
    pub pagado: Decimal,
    pub pendiente: Decimal,
    pub descuento: Decimal,
    pub with_discount: usize,
}

impl Totals {
    pub fn add(&mut self, c: &Comprobante) {
        self.tx_count += 1;
        self.facturado = self.facturado.saturating_add(c.facturado);
        self.pagado = self.pagado.saturating_add(c.pagado);
        self.pendiente = self.pendiente.saturating_add(c.pendiente);
        self.descuento = self.descuento.saturating_add(c.descuento);
        if c.descuento > Decimal::ZERO {
            self.with_discount += 1;
        }
    }

    pub fn of<'a>(rows: impl IntoIterator<Item = &'a Comprobante>) -> Self {
        let mut totals = Self::default();
        for c in rows {
            totals.add(c);
        }
        totals
    }

    pub fn ticket(&self) -> f64 {
        ratio(self.facturado, Decimal::from(self.tx_count))
    }

    /// Discount over gross (billed + discount), as a percentage.
    pub fn discount_rate(&self) -> f64 {
        percentage(self.descuento, self.facturado + self.descuento)
    }
}

/// One row of the yearly or monthly KPI tables.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiItem {
    pub year: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<u32>,
    pub estado: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tipo: Option<String>,
    pub tx_count: usize,
    pub facturado: f64,
    pub pagado: f64,
    pub pendiente: f64,
    pub descuento: f64,
    pub ticket_prom: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desc_rate_percentage: Option<f64>,
    pub count_with_discount: usize,
}

type GroupKey = (i32, Option<u32>, String, Option<String>);

fn grouped(
    rows: &[&Comprobante],
    key: impl Fn(&Comprobante) -> GroupKey,
) -> BTreeMap<GroupKey, Totals> {
    let mut groups: BTreeMap<GroupKey, Totals> = BTreeMap::new();
    for &c in rows {
        groups.entry(key(c)).or_default().add(c);
    }
    groups
}

fn kpi_item(key: GroupKey, totals: Totals, with_rate: bool) -> KpiItem {
    let (year, month, estado, tipo) = key;
    KpiItem {
        year,
        month,
        estado,
        tipo,
        tx_count: totals.tx_count,
        facturado: to_f64(totals.facturado),
        pagado: to_f64(totals.pagado),
        pendiente: to_f64(totals.pendiente),
        descuento: to_f64(totals.descuento),
        ticket_prom: totals.ticket(),
        desc_rate_percentage: with_rate.then(|| totals.discount_rate()),
        count_with_discount: totals.with_discount,
    }
}

/// KPIs per (year, estado, tipo), sorted by key.
pub fn kpis_by_year(rows: &[&Comprobante]) -> Vec<KpiItem> {
    grouped(rows, |c| (c.year(), None, c.estado.clone(), c.tipo.clone()))
        .into_iter()
        .map(|(key, totals)| kpi_item(key, totals, true))
        .collect()
}

/// KPIs per (year, month, estado, tipo), sorted by key.
pub fn kpis_by_month(rows: &[&Comprobante]) -> Vec<KpiItem> {
    grouped(rows, |c| {
        (c.year(), Some(c.month()), c.estado.clone(), c.tipo.clone())
    })
    .into_iter()
    .map(|(key, totals)| kpi_item(key, totals, false))
    .collect()
}

/// Headline figures of the summary endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryKpis {
    pub facturado: f64,
    pub pagado: f64,
    pub pendiente: f64,
    pub descuento: f64,
    pub tx_count: usize,
    pub avg_ticket: f64,
    pub anuladas_count: usize,
    pub anuladas_pct: f64,
    pub discount_percent: f64,
}

/// Totals over valid receipts; voided ones are only counted.
pub fn summary(rows: &[&Comprobante]) -> SummaryKpis {
    let valid = Totals::of(rows.iter().copied().filter(|c| !c.is_anulado()));
    let anuladas = rows.iter().filter(|c| c.is_anulado()).count();

    SummaryKpis {
        facturado: to_f64(valid.facturado),
        pagado: to_f64(valid.pagado),
        pendiente: to_f64(valid.pendiente),
        descuento: to_f64(valid.descuento),
        tx_count: valid.tx_count,
        avg_ticket: valid.ticket(),
        anuladas_count: anuladas,
        anuladas_pct: count_percentage(anuladas, rows.len()),
        discount_percent: valid.discount_rate(),
    }
}

/// Reference year against the previous one, both cut at the reference
/// year's latest day-of-year.
///
/// Serialized with neutral keys plus year-suffixed ones (`facturado_2025`,
/// `tx_2024`, ...) that the dashboard charts read.
#[derive(Debug, Clone, PartialEq)]
pub struct YtdComparison {
    pub limit_date: String,
    pub current_year: i32,
    pub previous_year: i32,
    pub facturado_current: f64,
    pub facturado_previous: f64,
    pub growth_rate_percentage: f64,
    pub tx_current: usize,
    pub tx_previous: usize,
}

impl Serialize for YtdComparison {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(12))?;
        map.serialize_entry("limit_date", &self.limit_date)?;
        map.serialize_entry("current_year", &self.current_year)?;
        map.serialize_entry("previous_year", &self.previous_year)?;
        map.serialize_entry("facturado_current", &self.facturado_current)?;
        map.serialize_entry("facturado_previous", &self.facturado_previous)?;
        map.serialize_entry(&format!("facturado_{}", self.current_year), &self.facturado_current)?;
        map.serialize_entry(&format!("facturado_{}", self.previous_year), &self.facturado_previous)?;
        map.serialize_entry("growth_rate_percentage", &self.growth_rate_percentage)?;
        map.serialize_entry("tx_current", &self.tx_current)?;
        map.serialize_entry("tx_previous", &self.tx_previous)?;
        map.serialize_entry(&format!("tx_{}", self.current_year), &self.tx_current)?;
        map.serialize_entry(&format!("tx_{}", self.previous_year), &self.tx_previous)?;
        map.end()
    }
}

/// `valid` must already exclude voided receipts.
pub fn ytd_comparison(valid: &[&Comprobante], reference_year: i32) -> Option<YtdComparison> {
    let limit = valid
        .iter()
        .filter(|c| c.year() == reference_year)
        .map(|c| c.fecha_emision)
        .max()?;
    let limit_day = limit.ordinal();
    let previous_year = reference_year - 1;

    let within = |year: i32| {
        Totals::of(
            valid
                .iter()
                .copied()
                .filter(|c| c.year() == year && c.fecha_emision.ordinal() <= limit_day),
        )
    };
    let current = within(reference_year);
    let previous = within(previous_year);

    Some(YtdComparison {
        limit_date: limit.format(ISO_FORMAT).to_string(),
        current_year: reference_year,
        previous_year,
        facturado_current: to_f64(current.facturado),
        facturado_previous: to_f64(previous.facturado),
        growth_rate_percentage: percentage(current.facturado - previous.facturado, previous.facturado),
        tx_current: current.tx_count,
        tx_previous: previous.tx_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::filters::DashboardFilters;
    use crate::test_support::sample_dataset;

    #[test]
    fn yearly_kpis_group_by_estado_and_tipo() {
        let ds = sample_dataset();
        let sel = DashboardFilters::default().select(&ds);
        let items = kpis_by_year(&sel.rows);

        let keys: Vec<(i32, &str, Option<&str>)> = items
            .iter()
            .map(|i| (i.year, i.estado.as_str(), i.tipo.as_deref()))
            .collect();
        assert_eq!(
            keys,
            vec![
                (2024, "PAGADO", Some("BOLETA")),
                (2025, "ANULADO", Some("BOLETA")),
                (2025, "PAGADO", Some("BOLETA")),
                (2025, "PENDIENTE", Some("BOLETA")),
                (2025, "PENDIENTE", Some("FACTURA")),
            ]
        );

        let first = &items[0];
        assert_eq!(first.tx_count, 3);
        assert_eq!(first.facturado, 35000.0);
        assert_eq!(first.descuento, 1000.0);
        assert_eq!(first.count_with_discount, 1);
        assert!((first.ticket_prom - 11666.666).abs() < 0.01);
        assert!((first.desc_rate_percentage.unwrap() - 2.7777).abs() < 0.001);
    }

    #[test]
    fn monthly_kpis_carry_the_month() {
        let ds = sample_dataset();
        let sel = DashboardFilters::default().select(&ds);
        let items = kpis_by_month(&sel.rows);

        assert_eq!(items.first().map(|i| (i.year, i.month)), Some((2024, Some(2))));
        assert!(items.iter().all(|i| i.desc_rate_percentage.is_none()));
        let feb_2025: usize = items
            .iter()
            .filter(|i| i.year == 2025 && i.month == Some(2))
            .map(|i| i.tx_count)
            .sum();
        assert_eq!(feb_2025, 2);
    }

    #[test]
    fn summary_excludes_voided_receipts() {
        let ds = sample_dataset();
        let sel = DashboardFilters::default().select(&ds);
        let s = summary(&sel.rows);

        assert_eq!(s.tx_count, 7);
        assert_eq!(s.facturado, 115000.0);
        assert_eq!(s.pagado, 77000.0);
        assert_eq!(s.pendiente, 38000.0);
        assert_eq!(s.descuento, 1500.0);
        assert_eq!(s.anuladas_count, 1);
        assert_eq!(s.anuladas_pct, 12.5);
        assert!((s.avg_ticket - 16428.57).abs() < 0.01);
    }

    #[test]
    fn ytd_compares_against_the_same_window() {
        let ds = sample_dataset();
        let sel = DashboardFilters::default().select(&ds);
        let ytd = ytd_comparison(&sel.valid, 2025).unwrap();

        assert_eq!(ytd.limit_date, "2025-03-03T10:00:00");
        assert_eq!(ytd.facturado_current, 80000.0);
        assert_eq!(ytd.tx_current, 4);
        assert_eq!(ytd.facturado_previous, 5000.0);
        assert_eq!(ytd.tx_previous, 1);
        assert_eq!(ytd.growth_rate_percentage, 1500.0);
    }

    #[test]
    fn ytd_serializes_year_suffixed_keys() {
        let ds = sample_dataset();
        let sel = DashboardFilters::default().select(&ds);
        let value = serde_json::to_value(ytd_comparison(&sel.valid, 2025).unwrap()).unwrap();

        assert_eq!(value["facturado_2025"], 80000.0);
        assert_eq!(value["facturado_2024"], 5000.0);
        assert_eq!(value["tx_2025"], 4);
        assert_eq!(value["tx_2024"], 1);
        assert_eq!(value["facturado_current"], 80000.0);
        assert_eq!(value["limit_date"], "2025-03-03T10:00:00");
    }

    #[test]
    fn totals_saturate_instead_of_overflowing() {
        let ds = sample_dataset();
        let mut huge = ds.rows[0].clone();
        huge.facturado = Decimal::MAX;
        let totals = Totals::of([&huge, &huge]);

        assert_eq!(totals.facturado, Decimal::MAX);
        assert_eq!(totals.tx_count, 2);
    }

    #[test]
    fn ytd_is_absent_without_reference_rows() {
        let ds = sample_dataset();
        let sel = DashboardFilters::default().select(&ds);
        assert!(ytd_comparison(&sel.valid, 2019).is_none());
    }
}
