use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt::Debug;

use crate::{
    error::Result,
    model::{CuratedRow, RawExtract},
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub const RAW_TABLE: &str = "nws_hourly_forecast_extract";
pub const CURATED_TABLE: &str = "nws_hourly_forecast";

/// Column order and PostgreSQL type of every curated row, in insert order.
pub const CURATED_COLUMNS: [(&str, &str); 12] = [
    ("run_ts_utc", "timestamptz"),
    ("location", "text"),
    ("start_time", "timestamptz"),
    ("end_time", "timestamptz"),
    ("is_daytime", "boolean"),
    ("temperature", "integer"),
    ("temperature_unit", "text"),
    ("wind_speed", "text"),
    ("wind_direction", "text"),
    ("short_forecast", "text"),
    ("detailed_forecast", "text"),
    ("icon", "text"),
];

/// Append-only destination for both tables. Implementations never update or
/// delete rows.
#[async_trait]
pub trait ForecastStore: Send + Sync + Debug {
    /// Write one raw payload row in its own transaction.
    async fn insert_raw_extract(&self, raw: &RawExtract) -> Result<()>;

    /// Append curated rows as a single logical operation and return how many
    /// were written. An empty slice writes nothing.
    async fn append_curated(&self, rows: &[CuratedRow]) -> Result<u64>;

    /// The raw payload captured by the run stamped `run_ts_utc`, if any.
    async fn raw_extract_at(&self, run_ts_utc: DateTime<Utc>) -> Result<Option<RawExtract>>;

    /// Qualified name of the curated table, for reporting.
    fn curated_table(&self) -> String;
}
