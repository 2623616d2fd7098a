//! Operational analysis: weekday demand, hourly heatmap and daily trends.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate, Timelike};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::dashboard::{ratio, to_f64, DOW_NAMES};
use crate::models::comprobante::Comprobante;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DowItem {
    pub day: &'static str,
    pub facturado: f64,
    pub tx_count: usize,
    /// Billed amount per calendar day with at least one receipt on this weekday.
    pub avg_daily_sales: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapCell {
    pub day: &'static str,
    pub hour: u32,
    pub facturado: f64,
    pub tx_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyTrend {
    pub date: String,
    pub facturado: f64,
    pub tx_count: usize,
}

fn weekday_index(c: &Comprobante) -> usize {
    c.fecha_emision.weekday().num_days_from_monday() as usize
}

#[derive(Default)]
struct DaySums {
    facturado: Decimal,
    tx_count: usize,
    active_dates: BTreeSet<NaiveDate>,
}

/// Weekday breakdown, Monday first; weekdays without receipts are omitted.
pub fn dow_analysis(valid: &[&Comprobante]) -> Vec<DowItem> {
    let mut days: BTreeMap<usize, DaySums> = BTreeMap::new();
    for c in valid {
        let sums = days.entry(weekday_index(c)).or_default();
        sums.facturado += c.facturado;
        sums.tx_count += 1;
        sums.active_dates.insert(c.date());
    }

    days.into_iter()
        .map(|(idx, sums)| DowItem {
            day: DOW_NAMES[idx],
            facturado: to_f64(sums.facturado),
            tx_count: sums.tx_count,
            avg_daily_sales: ratio(sums.facturado, Decimal::from(sums.active_dates.len())),
        })
        .collect()
}

/// Demand per (weekday, hour).
pub fn demand_heatmap(valid: &[&Comprobante]) -> Vec<HeatmapCell> {
    let mut cells: BTreeMap<(usize, u32), (Decimal, usize)> = BTreeMap::new();
    for c in valid {
        let cell = cells
            .entry((weekday_index(c), c.fecha_emision.hour()))
            .or_default();
        cell.0 += c.facturado;
        cell.1 += 1;
    }

    cells
        .into_iter()
        .map(|((idx, hour), (facturado, tx_count))| HeatmapCell {
            day: DOW_NAMES[idx],
            hour,
            facturado: to_f64(facturado),
            tx_count,
        })
        .collect()
}

/// Per calendar date, oldest first.
pub fn daily_trends(valid: &[&Comprobante]) -> Vec<DailyTrend> {
    let mut dates: BTreeMap<NaiveDate, (Decimal, usize)> = BTreeMap::new();
    for c in valid {
        let day = dates.entry(c.date()).or_default();
        day.0 += c.facturado;
        day.1 += 1;
    }

    dates
        .into_iter()
        .map(|(date, (facturado, tx_count))| DailyTrend {
            date: date.format("%Y-%m-%d").to_string(),
            facturado: to_f64(facturado),
            tx_count,
        })
        .collect()
}
