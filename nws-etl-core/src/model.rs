use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A fixed coordinate pair the forecast is requested for.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

/// One key of an upstream JSON object.
///
/// Unlike `Option<Value>`, a key that is present with a `null` value stays
/// distinguishable from a key that is missing altogether.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Field {
    #[default]
    Absent,
    Present(Value),
}

impl Field {
    pub fn is_present(&self) -> bool {
        matches!(self, Field::Present(_))
    }

    /// The raw value, treating an explicit `null` the same as an absent key.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Field::Present(Value::Null) | Field::Absent => None,
            Field::Present(v) => Some(v),
        }
    }
}

impl<'de> Deserialize<'de> for Field {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(Field::Present)
    }
}

/// One upstream-reported time window, decoded without any type expectations.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastPeriod {
    #[serde(default)]
    pub start_time: Field,
    #[serde(default)]
    pub end_time: Field,
    #[serde(default)]
    pub is_daytime: Field,
    #[serde(default)]
    pub temperature: Field,
    #[serde(default)]
    pub temperature_unit: Field,
    #[serde(default)]
    pub wind_speed: Field,
    #[serde(default)]
    pub wind_direction: Field,
    #[serde(default)]
    pub short_forecast: Field,
    #[serde(default)]
    pub detailed_forecast: Field,
    #[serde(default)]
    pub icon: Field,
}

/// Result of the second hop: the periods list, the full document it came
/// from, and the URL the document was fetched from.
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyForecast {
    pub source_url: String,
    pub periods: Vec<Value>,
    pub payload: Value,
}

/// Values shared by every write of a single run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunContext {
    pub run_ts_utc: DateTime<Utc>,
    pub location: String,
    pub point: GeoPoint,
}

/// One row of `nws_hourly_forecast_extract`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawExtract {
    pub run_ts_utc: DateTime<Utc>,
    pub location: String,
    pub lat: f64,
    pub lon: f64,
    pub source_url: String,
    pub payload: Value,
}

impl RawExtract {
    pub fn new(run: &RunContext, source_url: impl Into<String>, payload: Value) -> Self {
        Self {
            run_ts_utc: run.run_ts_utc,
            location: run.location.clone(),
            lat: run.point.lat,
            lon: run.point.lon,
            source_url: source_url.into(),
            payload,
        }
    }
}

/// One row of `nws_hourly_forecast`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CuratedRow {
    pub run_ts_utc: DateTime<Utc>,
    pub location: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub is_daytime: Option<bool>,
    pub temperature: Option<i32>,
    pub temperature_unit: Option<String>,
    pub wind_speed: Option<String>,
    pub wind_direction: Option<String>,
    pub short_forecast: Option<String>,
    pub detailed_forecast: Option<String>,
    pub icon: Option<String>,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub run_ts_utc: DateTime<Utc>,
    pub curated_rows: u64,
    /// Qualified name of the table the curated rows went to.
    pub curated_table: String,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Loaded {} rows into {} @ {}",
            self.curated_rows,
            self.curated_table,
            self.run_ts_utc.to_rfc3339_opts(SecondsFormat::Micros, false)
        )
    }
}
