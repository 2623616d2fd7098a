//! Shared fixtures for unit tests.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::models::comprobante::{Dataset, RawRow};
use crate::services::source::{ComprobanteSource, SourceError};

/// In-memory source that counts page requests and can be switched to fail.
///
/// Optionally caps the rows per page like a PostgREST `max-rows` setting and
/// delays each page to simulate a slow upstream.
pub struct MemorySource {
    rows: Vec<RawRow>,
    page_cap: usize,
    calls: AtomicUsize,
    loads: AtomicUsize,
    delay_ms: AtomicU64,
    failing: AtomicBool,
}

impl MemorySource {
    pub fn new(rows: Vec<RawRow>) -> Self {
        Self {
            rows,
            page_cap: usize::MAX,
            calls: AtomicUsize::new(0),
            loads: AtomicUsize::new(0),
            delay_ms: AtomicU64::new(0),
            failing: AtomicBool::new(false),
        }
    }

    pub fn with_page_cap(mut self, cap: usize) -> Self {
        self.page_cap = cap;
        self
    }

    /// Page requests served.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Full walks started, i.e. requests for the first page.
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl ComprobanteSource for MemorySource {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn fetch_page(
        &self,
        offset: usize,
        limit: usize,
        active_only: bool,
    ) -> Result<Vec<RawRow>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if offset == 0 {
            self.loads.fetch_add(1, Ordering::SeqCst);
        }
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(SourceError::Status {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(self
            .rows
            .iter()
            .filter(|r| !active_only || r.get("is_active").and_then(Value::as_bool).unwrap_or(true))
            .skip(offset)
            .take(limit.min(self.page_cap))
            .cloned()
            .collect())
    }
}

pub fn raw(value: Value) -> RawRow {
    value.as_object().cloned().unwrap_or_default()
}

/// Nine receipts across 2024 and 2025.
///
/// Row 6 is voided, row 7 has no usable date, row 8 has a blank client and
/// row 5 has no payment method.
pub fn sample_rows() -> Vec<RawRow> {
    vec![
        raw(json!({
            "id": 1, "fecha_emision": "2024-03-04T10:15:00", "comprobante": "BOLETA: 001 - 000001",
            "cliente": "Ana Pérez", "facturado": 10000, "pagado": 10000, "pendiente": 0, "descuento": 0,
            "estado": "PAGADO", "forma_pago_raw": "Tarjeta de crédito", "is_active": true
        })),
        raw(json!({
            "id": 2, "fecha_emision": "2024-03-05T11:00:00", "comprobante": "BOLETA: 001 - 000002",
            "cliente": "Bruno Díaz", "facturado": "$20.000", "pagado": "20.000", "pendiente": 0, "descuento": "1.000",
            "estado": "pagado ", "forma_pago_raw": "Transferencia", "is_active": true
        })),
        raw(json!({
            "id": 3, "fecha_emision": "2025-01-10 09:30:00", "comprobante": "BOLETA: 001 - 000003",
            "cliente": "Ana Pérez", "facturado": 15000, "pagado": 15000, "pendiente": 0, "descuento": 500,
            "estado": "PAGADO", "forma_pago_raw": "Efectivo", "is_active": true
        })),
        raw(json!({
            "id": 4, "fecha_emision": "2025-02-14T16:45:00+00:00", "comprobante": "FACTURA: 002 - 000004",
            "cliente": "Clínica Sur", "facturado": 50000, "pagado": 20000, "pendiente": 30000, "descuento": 0,
            "estado": "PENDIENTE", "forma_pago_raw": "Transbank", "is_active": true
        })),
        raw(json!({
            "id": 5, "fecha_emision": "2025-03-03T10:00:00", "comprobante": "BOLETA: 001 - 000005",
            "cliente": "Bruno Díaz", "facturado": 8000, "pagado": 0, "pendiente": 8000, "descuento": 0,
            "estado": "PENDIENTE", "forma_pago_raw": null, "is_active": true
        })),
        raw(json!({
            "id": 6, "fecha_emision": "2025-03-03T12:00:00", "comprobante": "BOLETA: 001 - 000006",
            "cliente": "Ana Pérez", "facturado": 12000, "pagado": 12000, "pendiente": 0, "descuento": 0,
            "estado": "ANULADO", "forma_pago_raw": "Efectivo", "is_active": true
        })),
        raw(json!({
            "id": 7, "fecha_emision": "not a date", "comprobante": "BOLETA: 001 - 000007",
            "cliente": "Carla Soto", "facturado": 1000, "pagado": 1000, "pendiente": 0, "descuento": 0,
            "estado": "PAGADO", "forma_pago_raw": "Efectivo", "source_year": 2024, "is_active": true
        })),
        raw(json!({
            "id": 8, "fecha_emision": "2024-02-20T09:00:00", "comprobante": "BOLETA: 001 - 000008",
            "cliente": "", "facturado": 5000, "pagado": 5000, "pendiente": 0, "descuento": 0,
            "estado": "PAGADO", "forma_pago_raw": "sin boleta", "is_active": true
        })),
        raw(json!({
            "id": 9, "fecha_emision": "2025-02-28T18:30:00", "comprobante": "BOLETA: 001 - 000009",
            "cliente": "Ana Pérez", "facturado": 7000, "pagado": 7000, "pendiente": 0, "descuento": 0,
            "estado": "PAGADO", "forma_pago_raw": "tbk debito", "is_active": true
        })),
    ]
}

pub fn sample_dataset() -> Dataset {
    Dataset::from_raw(&sample_rows())
}
