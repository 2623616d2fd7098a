//! API configuration: loaded from environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

const DEFAULT_TABLE: &str = "comprobantes";

#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Supabase project URL (e.g. `https://xyz.supabase.co`).
    pub supabase_url: String,
    /// Supabase API key (anon or service role).
    pub supabase_key: String,
    /// Table holding the receipts.
    pub table: String,
    /// Seconds before the in-memory dataset is reloaded.
    pub cache_ttl_secs: u64,
    /// Rows requested per page from the source.
    pub page_size: usize,
    /// Safety cap on rows loaded into the dashboard cache.
    pub max_rows: usize,
    /// Only load rows flagged `is_active`.
    pub active_only: bool,
    /// Optional JSON file overriding the golden dataset expectations.
    pub golden_path: Option<PathBuf>,
    /// Per-request timeout.
    pub request_timeout_secs: u64,
    /// Port of the Prometheus exporter.
    pub metrics_port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_key: String::new(),
            table: DEFAULT_TABLE.to_string(),
            cache_ttl_secs: 600,
            page_size: 1000,
            max_rows: 50_000,
            active_only: true,
            golden_path: None,
            request_timeout_secs: 30,
            metrics_port: 9000,
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let supabase_url = lookup("SUPABASE_URL").unwrap_or_default();
        let supabase_key = lookup("SUPABASE_KEY").unwrap_or_default();

        let table = match lookup("COMPROBANTES_TABLE") {
            Some(t) if IDENTIFIER.is_match(&t) => t,
            Some(t) => {
                tracing::warn!(table = %t, "COMPROBANTES_TABLE is not a plain identifier -- using default");
                defaults.table.clone()
            }
            None => defaults.table.clone(),
        };

        let active_only = match lookup("FETCH_ACTIVE_ONLY").map(|s| s.trim().to_lowercase()) {
            Some(v) => !matches!(v.as_str(), "0" | "false" | "no" | "off"),
            None => defaults.active_only,
        };

        let config = Self {
            supabase_url,
            supabase_key,
            table,
            cache_ttl_secs: parse_var(&lookup, "CACHE_TTL_SECS").unwrap_or(defaults.cache_ttl_secs),
            page_size: parse_var(&lookup, "FETCH_PAGE_SIZE")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.page_size),
            max_rows: parse_var(&lookup, "FETCH_MAX_ROWS").unwrap_or(defaults.max_rows),
            active_only,
            golden_path: lookup("GOLDEN_DATASET_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            request_timeout_secs: parse_var(&lookup, "REQUEST_TIMEOUT_SECS")
                .unwrap_or(defaults.request_timeout_secs),
            metrics_port: parse_var(&lookup, "METRICS_PORT").unwrap_or(defaults.metrics_port),
        };

        if config.supabase_url.is_empty() {
            tracing::warn!("SUPABASE_URL not set -- the supabase source will not be usable");
        }
        if config.supabase_key.is_empty() {
            tracing::warn!("SUPABASE_KEY not set -- requests will be anonymous");
        }

        config
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|s| s.trim().parse().ok())
}
