//! Server-side filters shared by every dashboard endpoint.

use chrono::NaiveDateTime;
use serde::Deserialize;

use crate::models::comprobante::{Comprobante, Dataset};

const ALL: &str = "all";

/// Query-string filters. `0` and `"all"` mean "no filter".
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DashboardFilters {
    pub year: i32,
    pub month: u32,
    pub status: String,
    pub tipo: String,
    pub search: String,
}

impl Default for DashboardFilters {
    fn default() -> Self {
        Self {
            year: 0,
            month: 0,
            status: ALL.to_string(),
            tipo: ALL.to_string(),
            search: String::new(),
        }
    }
}

fn is_wildcard(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value.eq_ignore_ascii_case(ALL)
}

impl DashboardFilters {
    /// Status, tipo and free-text search.
    pub fn matches_scope(&self, c: &Comprobante) -> bool {
        if !is_wildcard(&self.status) && !c.estado.eq_ignore_ascii_case(self.status.trim()) {
            return false;
        }
        if !is_wildcard(&self.tipo) {
            match &c.tipo {
                Some(tipo) if tipo.to_lowercase() == self.tipo.trim().to_lowercase() => {}
                _ => return false,
            }
        }
        let needle = self.search.trim().to_lowercase();
        if !needle.is_empty() {
            let hit = |field: &Option<String>| {
                field
                    .as_deref()
                    .is_some_and(|v| v.to_lowercase().contains(&needle))
            };
            if !hit(&c.cliente) && !hit(&c.comprobante) {
                return false;
            }
        }
        true
    }

    /// Year and month.
    pub fn matches_period(&self, c: &Comprobante) -> bool {
        (self.year == 0 || c.year() == self.year) && (self.month == 0 || c.month() == self.month)
    }

    pub fn select<'a>(&self, dataset: &'a Dataset) -> Selection<'a> {
        let scoped: Vec<&Comprobante> = dataset.rows.iter().filter(|c| self.matches_scope(c)).collect();
        let rows: Vec<&Comprobante> = scoped
            .iter()
            .copied()
            .filter(|c| self.matches_period(c))
            .collect();
        let valid: Vec<&Comprobante> = rows.iter().copied().filter(|c| !c.is_anulado()).collect();

        let reference_year = if self.year != 0 {
            Some(self.year)
        } else {
            valid.iter().map(|c| c.year()).max()
        };
        let reference_date = rows.iter().map(|c| c.fecha_emision).max();

        Selection {
            scoped,
            rows,
            valid,
            reference_year,
            reference_date,
        }
    }
}

/// The slices of a dataset an analytics pass works on.
pub struct Selection<'a> {
    /// Rows matching status/tipo/search, any period.
    pub scoped: Vec<&'a Comprobante>,
    /// Rows matching every filter.
    pub rows: Vec<&'a Comprobante>,
    /// `rows` without voided receipts.
    pub valid: Vec<&'a Comprobante>,
    /// Filtered year, else the latest year with valid rows.
    pub reference_year: Option<i32>,
    /// Latest emission timestamp among `rows`; the "today" of aging figures.
    pub reference_date: Option<NaiveDateTime>,
}

impl<'a> Selection<'a> {
    /// Valid rows of the reference year.
    pub fn valid_in_reference_year(&self) -> Vec<&'a Comprobante> {
        match self.reference_year {
            Some(year) => self.valid.iter().copied().filter(|c| c.year() == year).collect(),
            None => Vec::new(),
        }
    }
}
