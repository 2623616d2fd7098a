//! Payment method mix.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::dashboard::{percentage, to_f64};
use crate::models::comprobante::Comprobante;

pub const TARJETA: &str = "Tarjeta/POS";
pub const TRANSFERENCIA: &str = "Transferencia";
pub const EFECTIVO: &str = "Efectivo";
pub const SIN_BOLETA: &str = "Sin Boleta";
pub const OTROS: &str = "Otros";

/// Map the free-text payment method onto a dashboard category.
pub fn categorize(forma_pago: Option<&str>) -> &'static str {
    let Some(raw) = forma_pago else {
        return OTROS;
    };
    let p = raw.to_lowercase();
    if p.contains("tarjeta") || p.contains("transbank") || p.contains("tbk") {
        TARJETA
    } else if p.contains("transferencia") {
        TRANSFERENCIA
    } else if p.contains("efectivo") {
        EFECTIVO
    } else if p.contains("sin boleta") {
        SIN_BOLETA
    } else {
        OTROS
    }
}

pub fn payment_type(c: &Comprobante) -> &'static str {
    categorize(c.forma_pago.as_deref())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentMixItem {
    pub year: i32,
    pub month: u32,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub amount: f64,
    pub count: usize,
}

/// Billed amount and count per (year, month, category).
pub fn payment_mix_data(valid: &[&Comprobante]) -> Vec<PaymentMixItem> {
    let mut groups: BTreeMap<(i32, u32, &'static str), (Decimal, usize)> = BTreeMap::new();
    for c in valid {
        let entry = groups
            .entry((c.year(), c.month(), payment_type(c)))
            .or_default();
        entry.0 += c.facturado;
        entry.1 += 1;
    }

    groups
        .into_iter()
        .map(|((year, month, kind), (amount, count))| PaymentMixItem {
            year,
            month,
            kind,
            amount: to_f64(amount),
            count,
        })
        .collect()
}

/// Share of each category in a year's billed amount, e.g.
/// `{"year": 2025, "Efectivo": 18.75, "Tarjeta/POS": 71.25}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearlyPaymentShare {
    pub year: i32,
    #[serde(flatten)]
    pub shares: BTreeMap<&'static str, f64>,
}

/// Yearly category shares; years with nothing billed are skipped.
pub fn yearly_payment_shares(valid: &[&Comprobante]) -> Vec<YearlyPaymentShare> {
    let mut years: BTreeMap<i32, BTreeMap<&'static str, Decimal>> = BTreeMap::new();
    for c in valid {
        *years
            .entry(c.year())
            .or_default()
            .entry(payment_type(c))
            .or_default() += c.facturado;
    }

    years
        .into_iter()
        .filter_map(|(year, by_type)| {
            let total: Decimal = by_type.values().copied().sum();
            if total.is_zero() {
                return None;
            }
            let shares = by_type
                .into_iter()
                .map(|(kind, amount)| (kind, percentage(amount, total)))
                .collect();
            Some(YearlyPaymentShare { year, shares })
        })
        .collect()
}
