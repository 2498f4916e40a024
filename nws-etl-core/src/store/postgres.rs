use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{
    PgPool, Postgres, QueryBuilder, Row,
    postgres::PgPoolOptions,
    types::Json,
};

use crate::{
    config::{Config, LoadConfig, MAX_CHUNK_SIZE, is_identifier},
    error::{EtlError, Result},
    model::{CuratedRow, RawExtract},
};

use super::{CURATED_COLUMNS, CURATED_TABLE, ForecastStore, RAW_TABLE};

/// Both tables in PostgreSQL. The tables must already exist.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
    schema: String,
    chunk_size: usize,
}

impl PgStore {
    pub async fn connect(config: &Config) -> Result<Self> {
        let db = &config.database;
        tracing::debug!(host = %db.host, port = db.port, dbname = %db.dbname, "connecting to database");

        let pool = PgPoolOptions::new()
            .max_connections(db.max_connections)
            .connect_with(db.connect_options())
            .await?;

        Self::new(pool, &config.load)
    }

    pub fn new(pool: PgPool, load: &LoadConfig) -> Result<Self> {
        if !is_identifier(&load.schema) {
            return Err(EtlError::config(format!("invalid schema name {:?}", load.schema)));
        }
        if !(1..=MAX_CHUNK_SIZE).contains(&load.chunk_size) {
            return Err(EtlError::config(format!("invalid chunk size {}", load.chunk_size)));
        }
        Ok(Self { pool, schema: load.schema.clone(), chunk_size: load.chunk_size })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn raw_table(&self) -> String {
        format!("{}.{}", self.schema, RAW_TABLE)
    }
}

fn curated_insert_prefix(table: &str) -> String {
    let columns: Vec<&str> = CURATED_COLUMNS.iter().map(|(name, _)| *name).collect();
    format!("INSERT INTO {table} ({}) ", columns.join(", "))
}

#[async_trait]
impl ForecastStore for PgStore {
    async fn insert_raw_extract(&self, raw: &RawExtract) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} (run_ts_utc, location, lat, lon, source_url, payload) \
             VALUES ($1, $2, $3, $4, $5, $6)",
            self.raw_table()
        );

        let mut tx = self.pool.begin().await?;
        sqlx::query(&sql)
            .bind(raw.run_ts_utc)
            .bind(&raw.location)
            .bind(raw.lat)
            .bind(raw.lon)
            .bind(&raw.source_url)
            .bind(Json(&raw.payload))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(table = %self.raw_table(), run_ts_utc = %raw.run_ts_utc, "raw payload captured");
        Ok(())
    }

    async fn append_curated(&self, rows: &[CuratedRow]) -> Result<u64> {
        if rows.is_empty() {
            tracing::info!("no curated rows to append");
            return Ok(0);
        }

        let table = self.curated_table();
        let prefix = curated_insert_prefix(&table);
        let mut written = 0;

        let mut tx = self.pool.begin().await?;
        for chunk in rows.chunks(self.chunk_size) {
            let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(&prefix);
            qb.push_values(chunk, |mut b, row| {
                b.push_bind(row.run_ts_utc).push_unseparated("::timestamptz");
                b.push_bind(row.location.clone()).push_unseparated("::text");
                b.push_bind(row.start_time).push_unseparated("::timestamptz");
                b.push_bind(row.end_time).push_unseparated("::timestamptz");
                b.push_bind(row.is_daytime).push_unseparated("::boolean");
                b.push_bind(row.temperature).push_unseparated("::integer");
                b.push_bind(row.temperature_unit.clone()).push_unseparated("::text");
                b.push_bind(row.wind_speed.clone()).push_unseparated("::text");
                b.push_bind(row.wind_direction.clone()).push_unseparated("::text");
                b.push_bind(row.short_forecast.clone()).push_unseparated("::text");
                b.push_bind(row.detailed_forecast.clone()).push_unseparated("::text");
                b.push_bind(row.icon.clone()).push_unseparated("::text");
            });

            let result = qb.build().execute(&mut *tx).await?;
            written += result.rows_affected();
            tracing::debug!(table = %table, chunk = chunk.len(), "appended curated chunk");
        }
        tx.commit().await?;

        Ok(written)
    }

    async fn raw_extract_at(&self, run_ts_utc: DateTime<Utc>) -> Result<Option<RawExtract>> {
        let sql = format!(
            "SELECT run_ts_utc, location, lat, lon, source_url, payload \
             FROM {} WHERE run_ts_utc = $1 LIMIT 1",
            self.raw_table()
        );

        let row = sqlx::query(&sql).bind(run_ts_utc).fetch_optional(&self.pool).await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let Json(payload): Json<Value> = row.try_get("payload")?;
        Ok(Some(RawExtract {
            run_ts_utc: row.try_get("run_ts_utc")?,
            location: row.try_get("location")?,
            lat: row.try_get("lat")?,
            lon: row.try_get("lon")?,
            source_url: row.try_get("source_url")?,
            payload,
        }))
    }

    fn curated_table(&self) -> String {
        format!("{}.{}", self.schema, CURATED_TABLE)
    }
}
