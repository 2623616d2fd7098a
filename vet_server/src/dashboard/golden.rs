//! Golden dataset reconciliation.
//!
//! Compares the live `comprobantes` table against a reconciled snapshot of
//! expected totals. Works on raw rows so that the figures are independent of
//! the dashboard's date normalization: rows with an unparsable emission date
//! still count here.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::dashboard::to_f64;
use crate::models::comprobante::{parse_money, raw_estado, raw_year, text_field, RawRow, ANULADO};

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct YearTotals {
    pub count: usize,
    pub facturado: Decimal,
    pub pagado: Decimal,
    pub pendiente: Decimal,
}

impl YearTotals {
    fn add(&mut self, row: &RawRow) {
        self.count += 1;
        self.facturado += parse_money(row.get("facturado"));
        self.pagado += parse_money(row.get("pagado"));
        self.pendiente += parse_money(row.get("pendiente"));
    }

    fn to_json(self) -> Value {
        json!({
            "count": self.count,
            "facturado": to_f64(self.facturado),
            "pagado": to_f64(self.pagado),
            "pendiente": to_f64(self.pendiente),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnchorExpectation {
    pub comprobante: String,
    pub facturado: Decimal,
    pub pagado: Decimal,
    pub pendiente: Decimal,
    pub delta: Decimal,
}

impl Default for AnchorExpectation {
    fn default() -> Self {
        Self {
            comprobante: "BOLETA: 001 - 004865".to_string(),
            facturado: dec!(623400.10),
            pagado: dec!(623400.00),
            pendiente: Decimal::ZERO,
            delta: dec!(0.10),
        }
    }
}

/// Expected figures. Defaults are the reconciled snapshot; a JSON file may
/// override any subset of them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GoldenExpectations {
    pub count: usize,
    pub facturado: Decimal,
    pub pagado: Decimal,
    pub pendiente: Decimal,
    pub invariant: Decimal,
    pub annual: BTreeMap<i32, YearTotals>,
    pub pagado_count: usize,
    pub pendiente_count: usize,
    pub receivables_count: usize,
    pub receivables_sum: Decimal,
    pub anchor: AnchorExpectation,
}

impl Default for GoldenExpectations {
    fn default() -> Self {
        let year = |count, facturado, pagado, pendiente| YearTotals {
            count,
            facturado,
            pagado,
            pendiente,
        };
        Self {
            count: 6296,
            facturado: dec!(246404811.64),
            pagado: dec!(246085710.64),
            pendiente: dec!(319100.90),
            invariant: dec!(0.10),
            annual: BTreeMap::from([
                (2022, year(49, dec!(1923180.00), dec!(1923180.00), Decimal::ZERO)),
                (2023, year(1302, dec!(55458499.90), dec!(55458499.90), Decimal::ZERO)),
                (2024, year(2350, dec!(89765761.64), dec!(89765761.64), Decimal::ZERO)),
                (2025, year(2595, dec!(99257370.10), dec!(98938269.10), dec!(319100.90))),
            ]),
            pagado_count: 6285,
            pendiente_count: 11,
            receivables_count: 11,
            receivables_sum: dec!(319100.90),
            anchor: AnchorExpectation::default(),
        }
    }
}

impl GoldenExpectations {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading golden expectations {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("parsing golden expectations {}", path.display()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckStatus {
    Pass,
    Fail,
}

impl CheckStatus {
    fn of(passed: bool) -> Self {
        if passed {
            Self::Pass
        } else {
            Self::Fail
        }
    }

    pub fn passed(self) -> bool {
        self == Self::Pass
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoldenCheck {
    pub name: &'static str,
    pub status: CheckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<AnnualCheck>>,
}

impl GoldenCheck {
    fn compare(name: &'static str, passed: bool, expected: Value, actual: Value) -> Self {
        Self {
            name,
            status: CheckStatus::of(passed),
            expected: Some(expected),
            actual: Some(actual),
            details: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnualCheck {
    pub year: i32,
    pub status: CheckStatus,
    pub expected: Value,
    pub actual: Option<Value>,
}

fn amounts(row: &RawRow) -> (Decimal, Decimal, Decimal) {
    (
        parse_money(row.get("facturado")),
        parse_money(row.get("pagado")),
        parse_money(row.get("pendiente")),
    )
}

/// Run every check over the raw rows of the table. Keys are `test_1` … `test_9`.
pub fn verify(rows: &[RawRow], expected: &GoldenExpectations) -> BTreeMap<String, GoldenCheck> {
    let valid: Vec<&RawRow> = rows.iter().filter(|r| raw_estado(r) != ANULADO).collect();
    let mut results = BTreeMap::new();

    let count = valid.len();
    results.insert(
        "test_1".to_string(),
        GoldenCheck::compare(
            "Total de transacciones",
            count == expected.count,
            json!(expected.count),
            json!(count),
        ),
    );

    let mut totals = YearTotals::default();
    for row in &valid {
        totals.add(row);
    }
    let invariant = totals.facturado - (totals.pagado + totals.pendiente);
    let money_checks = [
        ("test_2", "Total facturado histórico", expected.facturado, totals.facturado),
        ("test_3", "Total pagado histórico", expected.pagado, totals.pagado),
        ("test_4", "Total pendiente histórico", expected.pendiente, totals.pendiente),
        ("test_5", "Invariante contable global", expected.invariant, invariant),
    ];
    for (key, name, want, got) in money_checks {
        results.insert(
            key.to_string(),
            GoldenCheck::compare(name, got == want, json!(to_f64(want)), json!(to_f64(got))),
        );
    }

    results.insert("test_6".to_string(), annual_check(&valid, expected));

    let estado_count = |estado: &str| valid.iter().filter(|r| raw_estado(r) == estado).count();
    let pagado_count = estado_count("PAGADO");
    let pendiente_count = estado_count("PENDIENTE");
    results.insert(
        "test_7".to_string(),
        GoldenCheck::compare(
            "Estados operacionales reales",
            pagado_count == expected.pagado_count
                && pendiente_count == expected.pendiente_count
                && pagado_count + pendiente_count == expected.count,
            json!({
                "PAGADO": expected.pagado_count,
                "PENDIENTE": expected.pendiente_count,
                "TOTAL": expected.count,
            }),
            json!({
                "PAGADO": pagado_count,
                "PENDIENTE": pendiente_count,
                "TOTAL": pagado_count + pendiente_count,
            }),
        ),
    );

    let receivables: Vec<Decimal> = valid
        .iter()
        .map(|r| amounts(r).2)
        .filter(|p| *p > Decimal::ZERO)
        .collect();
    let receivables_sum: Decimal = receivables.iter().sum();
    results.insert(
        "test_8".to_string(),
        GoldenCheck::compare(
            "CxC real (pendientes)",
            receivables.len() == expected.receivables_count && receivables_sum == expected.receivables_sum,
            json!({"count": expected.receivables_count, "sum": to_f64(expected.receivables_sum)}),
            json!({"count": receivables.len(), "sum": to_f64(receivables_sum)}),
        ),
    );

    results.insert("test_9".to_string(), anchor_check(&valid, &expected.anchor));
    results
}

fn annual_check(valid: &[&RawRow], expected: &GoldenExpectations) -> GoldenCheck {
    let mut by_year: BTreeMap<i32, YearTotals> = BTreeMap::new();
    for row in valid {
        if let Some(year) = raw_year(row) {
            by_year.entry(year).or_default().add(row);
        }
    }

    let details: Vec<AnnualCheck> = expected
        .annual
        .iter()
        .map(|(&year, want)| {
            let got = by_year.get(&year).copied();
            AnnualCheck {
                year,
                status: CheckStatus::of(got.as_ref() == Some(want)),
                expected: want.to_json(),
                actual: got.map(YearTotals::to_json),
            }
        })
        .collect();

    GoldenCheck {
        name: "Totales anuales",
        status: CheckStatus::of(details.iter().all(|d| d.status.passed())),
        expected: None,
        actual: None,
        details: Some(details),
    }
}

fn anchor_check(valid: &[&RawRow], anchor: &AnchorExpectation) -> GoldenCheck {
    let found = valid
        .iter()
        .find(|r| text_field(r, "comprobante").as_deref() == Some(anchor.comprobante.as_str()));

    let (passed, actual) = match found {
        Some(row) => {
            let (facturado, pagado, pendiente) = amounts(row);
            let delta = facturado - (pagado + pendiente);
            let passed = facturado == anchor.facturado
                && pagado == anchor.pagado
                && pendiente == anchor.pendiente
                && delta == anchor.delta;
            let actual = json!({
                "facturado": to_f64(facturado),
                "pagado": to_f64(pagado),
                "pendiente": to_f64(pendiente),
                "delta": to_f64(delta),
            });
            (passed, actual)
        }
        None => (false, json!({})),
    };

    GoldenCheck::compare(
        "Registro ancla (Delta 0.10)",
        passed,
        json!({
            "facturado": to_f64(anchor.facturado),
            "pagado": to_f64(anchor.pagado),
            "delta": to_f64(anchor.delta),
        }),
        actual,
    )
}
