//! Issued receipts (boletas, facturas) as loaded from the upstream store.

use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use regex::Regex;
use rust_decimal::Decimal;
use serde_json::{Map, Value};

/// A row exactly as returned by the source (PostgREST JSON or `row_to_json`).
pub type RawRow = Map<String, Value>;

/// Voided receipts; excluded from every "valid" aggregate.
pub const ANULADO: &str = "ANULADO";

/// Estado assumed when the row carries none.
pub const DEFAULT_ESTADO: &str = "VIGENTE";

/// ISO layout used whenever a timestamp is echoed back to the dashboard.
pub const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

static THOUSANDS_GROUPED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d{1,3}(\.\d{3})+$").unwrap());
static PLAIN_DECIMAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d+(\.\d+)?$").unwrap());
static TIPO_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([^:\d]+?)\s*:").unwrap());

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%#z", "%Y-%m-%d %H:%M:%S%.f%#z"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"];

/// Parse a monetary cell into an exact decimal.
///
/// Numbers are taken verbatim. Strings may carry `$`, spaces and Chilean
/// formatting (`"$1.000,50"`); plain decimals (`"623400.10"`) parse as-is.
/// Missing or unparsable values count as zero.
pub fn parse_money(value: Option<&Value>) -> Decimal {
    match value {
        Some(Value::Number(n)) => {
            let text = n.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .unwrap_or(Decimal::ZERO)
        }
        Some(Value::String(s)) => parse_money_str(s),
        _ => Decimal::ZERO,
    }
}

pub fn parse_money_str(raw: &str) -> Decimal {
    let cleaned: String = raw
        .chars()
        .filter(|c| *c != '$' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return Decimal::ZERO;
    }

    let normalized = if cleaned.contains(',') {
        cleaned.replace('.', "").replace(',', ".")
    } else if THOUSANDS_GROUPED.is_match(&cleaned) {
        cleaned.replace('.', "")
    } else if PLAIN_DECIMAL.is_match(&cleaned) {
        cleaned
    } else {
        cleaned.replace('.', "")
    };

    Decimal::from_str(&normalized).unwrap_or(Decimal::ZERO)
}

/// Parse an emission timestamp. Offsets are dropped, keeping the wall clock.
pub fn parse_fecha(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Some(dt.naive_local());
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Text value of a cell; numbers are stringified, blanks are `None`.
pub fn text_field(row: &RawRow, key: &str) -> Option<String> {
    match row.get(key)? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Trimmed, upper-cased estado; empty string when absent.
pub fn raw_estado(row: &RawRow) -> String {
    text_field(row, "estado")
        .map(|s| s.to_uppercase())
        .unwrap_or_default()
}

/// Fiscal year of a raw row: `source_year`, else the first four characters
/// of `fecha_emision`.
pub fn raw_year(row: &RawRow) -> Option<i32> {
    let from_source = match row.get("source_year") {
        Some(Value::Number(n)) => n.as_i64().and_then(|y| i32::try_from(y).ok()),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    from_source.filter(|y| *y != 0).or_else(|| {
        text_field(row, "fecha_emision")
            .and_then(|fe| fe.get(..4).and_then(|prefix| prefix.parse().ok()))
    })
}

/// Document type from the receipt identifier, e.g. `"BOLETA: 001 - 004865"` → `BOLETA`.
pub fn tipo_from_comprobante(comprobante: &str) -> Option<String> {
    TIPO_PREFIX
        .captures(comprobante)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_uppercase())
        .filter(|t| !t.is_empty())
}

/// A receipt normalized for analytics.
#[derive(Debug, Clone, PartialEq)]
pub struct Comprobante {
    pub id: Option<i64>,
    pub fecha_emision: NaiveDateTime,
    pub comprobante: Option<String>,
    pub cliente: Option<String>,
    pub facturado: Decimal,
    pub pagado: Decimal,
    pub pendiente: Decimal,
    pub descuento: Decimal,
    pub estado: String,
    pub tipo: Option<String>,
    pub forma_pago: Option<String>,
}

impl Comprobante {
    /// Normalize a raw row. Rows without a usable `fecha_emision` are rejected.
    pub fn from_raw(row: &RawRow) -> Option<Self> {
        let fecha_emision = text_field(row, "fecha_emision").and_then(|s| parse_fecha(&s))?;
        let comprobante = text_field(row, "comprobante");
        let tipo = text_field(row, "tipo")
            .map(|t| t.to_uppercase())
            .or_else(|| comprobante.as_deref().and_then(tipo_from_comprobante));
        let estado = match raw_estado(row) {
            e if e.is_empty() => DEFAULT_ESTADO.to_string(),
            e => e,
        };

        Some(Self {
            id: row.get("id").and_then(Value::as_i64),
            fecha_emision,
            comprobante,
            cliente: text_field(row, "cliente"),
            facturado: parse_money(row.get("facturado")),
            pagado: parse_money(row.get("pagado")),
            pendiente: parse_money(row.get("pendiente")),
            descuento: parse_money(row.get("descuento")),
            estado,
            tipo,
            forma_pago: text_field(row, "forma_pago_raw"),
        })
    }

    pub fn is_anulado(&self) -> bool {
        self.estado == ANULADO
    }

    pub fn year(&self) -> i32 {
        self.fecha_emision.year()
    }

    pub fn month(&self) -> u32 {
        self.fecha_emision.month()
    }

    pub fn date(&self) -> NaiveDate {
        self.fecha_emision.date()
    }

    pub fn has_pending(&self) -> bool {
        self.pendiente > Decimal::ZERO
    }
}

/// The normalized working set behind every dashboard endpoint.
#[derive(Debug, Default)]
pub struct Dataset {
    pub rows: Vec<Comprobante>,
    /// Whether the source exposes a `forma_pago_raw` column at all.
    pub has_forma_pago: bool,
    /// Whether the source exposes a `cliente` column at all.
    pub has_cliente: bool,
    /// Raw rows discarded for lacking a valid emission date.
    pub dropped: usize,
}

impl Dataset {
    pub fn from_raw(raw: &[RawRow]) -> Self {
        let rows: Vec<Comprobante> = raw.iter().filter_map(Comprobante::from_raw).collect();
        Self {
            dropped: raw.len() - rows.len(),
            has_forma_pago: raw.iter().any(|r| r.contains_key("forma_pago_raw")),
            has_cliente: raw.iter().any(|r| r.contains_key("cliente")),
            rows,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}
