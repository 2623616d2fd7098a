//! Data models for the receipts served to the dashboard.

pub mod comprobante;
