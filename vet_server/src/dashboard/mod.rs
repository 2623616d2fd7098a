//! Dashboard analytics computed over the cached receipts.

pub mod customers;
pub mod filters;
pub mod golden;
pub mod kpi;
pub mod operations;
pub mod payments;
pub mod quality;
pub mod report;
pub mod transactions;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Spanish weekday names, Monday first.
pub const DOW_NAMES: [&str; 7] = [
    "Lunes",
    "Martes",
    "Miércoles",
    "Jueves",
    "Viernes",
    "Sábado",
    "Domingo",
];

pub fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// `num / den`, or 0 when the denominator is not positive.
pub fn ratio(num: Decimal, den: Decimal) -> f64 {
    if den <= Decimal::ZERO {
        return 0.0;
    }
    num.checked_div(den).map(to_f64).unwrap_or(0.0)
}

/// `num / den * 100`, or 0 when the denominator is not positive.
pub fn percentage(num: Decimal, den: Decimal) -> f64 {
    if den <= Decimal::ZERO {
        return 0.0;
    }
    num.checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|n| n.checked_div(den))
        .map(to_f64)
        .unwrap_or(0.0)
}

/// Share of `count` over `total` as a percentage.
pub fn count_percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    count as f64 / total as f64 * 100.0
}
