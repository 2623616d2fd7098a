//! Direct PostgreSQL source: reads the receipts table over a diesel-async pool.
//!
//! Rows are returned as `row_to_json` text so both sources share the same
//! normalization path.

use async_trait::async_trait;
use diesel::sql_types::{BigInt, Text};
use diesel::QueryableByName;
use diesel_async::pooled_connection::deadpool::Pool;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use crate::config::ApiConfig;
use crate::models::comprobante::RawRow;
use crate::services::source::{ComprobanteSource, SourceError};

const POOL_SIZE: usize = 5;

#[derive(Debug, QueryableByName)]
struct JsonRow {
    #[diesel(sql_type = Text)]
    doc: String,
}

pub struct PostgresSource {
    pool: Pool<AsyncPgConnection>,
    active_sql: String,
    all_sql: String,
}

impl PostgresSource {
    pub fn connect(database_url: &str, config: &ApiConfig) -> Result<Self, SourceError> {
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
        let pool = Pool::builder(manager)
            .max_size(POOL_SIZE)
            .build()
            .map_err(|e| SourceError::Pool(e.to_string()))?;

        tracing::info!(table = %config.table, "PostgreSQL source configured");

        Ok(Self {
            pool,
            active_sql: page_sql(&config.table, true),
            all_sql: page_sql(&config.table, false),
        })
    }
}

/// Page query. `table` is validated as a plain identifier by `ApiConfig`.
fn page_sql(table: &str, active_only: bool) -> String {
    let filter = if active_only {
        "WHERE c.is_active "
    } else {
        ""
    };
    format!(
        "SELECT row_to_json(c)::text AS doc \
         FROM {table} c \
         {filter}\
         ORDER BY c.id \
         LIMIT $1 OFFSET $2"
    )
}

#[async_trait]
impl ComprobanteSource for PostgresSource {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn fetch_page(
        &self,
        offset: usize,
        limit: usize,
        active_only: bool,
    ) -> Result<Vec<RawRow>, SourceError> {
        let sql = if active_only { &self.active_sql } else { &self.all_sql };
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| SourceError::Pool(e.to_string()))?;

        let rows: Vec<JsonRow> = diesel::sql_query(sql)
            .bind::<BigInt, _>(limit as i64)
            .bind::<BigInt, _>(offset as i64)
            .load(&mut *conn)
            .await?;

        rows.into_iter()
            .map(|r| serde_json::from_str::<RawRow>(&r.doc).map_err(SourceError::from))
            .collect()
    }
}
