//! Supabase integration: receipts read through the PostgREST endpoint.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::ApiConfig;
use crate::models::comprobante::RawRow;
use crate::services::source::{ComprobanteSource, SourceError};

pub struct SupabaseSource {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    table: String,
}

impl SupabaseSource {
    pub fn new(config: &ApiConfig) -> Result<Self, SourceError> {
        if config.supabase_url.trim().is_empty() {
            return Err(SourceError::Config("SUPABASE_URL is not set".to_string()));
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("vetpraxis-api/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            api_key: config.supabase_key.clone(),
            table: config.table.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    fn page_params(offset: usize, limit: usize, active_only: bool) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("select", "*".to_string()),
            ("order", "id.asc".to_string()),
            ("offset", offset.to_string()),
            ("limit", limit.to_string()),
        ];
        if active_only {
            params.push(("is_active", "eq.true".to_string()));
        }
        params
    }
}

#[async_trait]
impl ComprobanteSource for SupabaseSource {
    fn name(&self) -> &'static str {
        "supabase"
    }

    async fn fetch_page(
        &self,
        offset: usize,
        limit: usize,
        active_only: bool,
    ) -> Result<Vec<RawRow>, SourceError> {
        let mut request = self
            .client
            .get(self.endpoint())
            .query(&Self::page_params(offset, limit, active_only))
            .header("Accept", "application/json");

        if !self.api_key.is_empty() {
            request = request
                .header("apikey", &self.api_key)
                .header("Authorization", format!("Bearer {}", self.api_key));
        }

        let resp = request.send().await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(status, offset, "Supabase page request failed");
            return Err(SourceError::Status { status, body });
        }

        let rows: Vec<RawRow> = resp.json().await?;
        Ok(rows)
    }
}
