//! Receipt-level views: the drilldown table and the pending invoice list.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::dashboard::payments::payment_type;
use crate::dashboard::to_f64;
use crate::models::comprobante::{Comprobante, ISO_FORMAT};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionItem {
    pub fecha_emision: String,
    pub comprobante: String,
    pub cliente: String,
    pub facturado: f64,
    pub pagado: f64,
    pub pendiente: f64,
    pub descuento: f64,
    pub estado: String,
    pub payment_type: &'static str,
}

impl From<&Comprobante> for TransactionItem {
    fn from(c: &Comprobante) -> Self {
        Self {
            fecha_emision: c.fecha_emision.format(ISO_FORMAT).to_string(),
            comprobante: c.comprobante.clone().unwrap_or_default(),
            cliente: c.cliente.clone().unwrap_or_default(),
            facturado: to_f64(c.facturado),
            pagado: to_f64(c.pagado),
            pendiente: to_f64(c.pendiente),
            descuento: to_f64(c.descuento),
            estado: c.estado.clone(),
            payment_type: payment_type(c),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingInvoice {
    pub fecha_emision: String,
    pub comprobante: String,
    pub cliente: String,
    pub facturado: f64,
    pub pendiente: f64,
    pub days_overdue: i64,
}

/// Up to `limit` receipts, newest first.
pub fn drilldown(rows: &[&Comprobante], limit: usize) -> Vec<TransactionItem> {
    let mut sorted = rows.to_vec();
    sorted.sort_by(|a, b| b.fecha_emision.cmp(&a.fecha_emision));
    sorted.into_iter().take(limit).map(TransactionItem::from).collect()
}

/// Valid receipts with an outstanding balance, most overdue first.
/// Age is measured against `reference`, the latest date of the selection.
pub fn pending_invoices(valid: &[&Comprobante], reference: Option<NaiveDateTime>) -> Vec<PendingInvoice> {
    let Some(reference) = reference else {
        return Vec::new();
    };

    let mut pending: Vec<&Comprobante> = valid.iter().copied().filter(|c| c.has_pending()).collect();
    pending.sort_by(|a, b| a.fecha_emision.cmp(&b.fecha_emision));

    pending
        .into_iter()
        .map(|c| PendingInvoice {
            fecha_emision: c.fecha_emision.format(ISO_FORMAT).to_string(),
            comprobante: c.comprobante.clone().unwrap_or_default(),
            cliente: c.cliente.clone().unwrap_or_default(),
            facturado: to_f64(c.facturado),
            pendiente: to_f64(c.pendiente),
            days_overdue: (reference - c.fecha_emision).num_days().max(0),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::filters::DashboardFilters;
    use crate::test_support::sample_dataset;

    #[test]
    fn drilldown_is_newest_first_and_limited() {
        let ds = sample_dataset();
        let sel = DashboardFilters::default().select(&ds);
        let items = drilldown(&sel.rows, 3);

        let receipts: Vec<&str> = items.iter().map(|i| i.comprobante.as_str()).collect();
        assert_eq!(
            receipts,
            vec!["BOLETA: 001 - 000006", "BOLETA: 001 - 000005", "BOLETA: 001 - 000009"]
        );
        assert_eq!(items[0].estado, "ANULADO");
        assert_eq!(items[1].payment_type, "Otros");
        assert_eq!(items[2].fecha_emision, "2025-02-28T18:30:00");
    }

    #[test]
    fn blank_client_serializes_as_empty_string() {
        let ds = sample_dataset();
        let sel = DashboardFilters::default().select(&ds);
        let items = drilldown(&sel.rows, 500);

        assert_eq!(items.len(), 8);
        let last = items.last().unwrap();
        assert_eq!(last.comprobante, "BOLETA: 001 - 000008");
        assert_eq!(last.cliente, "");
        assert_eq!(last.payment_type, "Sin Boleta");
    }

    #[test]
    fn pending_invoices_carry_days_overdue() {
        let ds = sample_dataset();
        let sel = DashboardFilters::default().select(&ds);
        let pending = pending_invoices(&sel.valid, sel.reference_date);

        let summary: Vec<(&str, f64, i64)> = pending
            .iter()
            .map(|p| (p.comprobante.as_str(), p.pendiente, p.days_overdue))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("FACTURA: 002 - 000004", 30000.0, 16),
                ("BOLETA: 001 - 000005", 8000.0, 0),
            ]
        );
    }

    #[test]
    fn pending_invoices_empty_without_reference() {
        assert!(pending_invoices(&[], None).is_empty());
    }
}
