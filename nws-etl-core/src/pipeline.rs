//! Single-pass run: fetch, capture raw, transform, load curated.

use chrono::{DateTime, SubsecRound, Utc};

use crate::{
    client::{ForecastSource, NwsClient, hourly_periods},
    config::{Config, LocationConfig},
    error::Result,
    model::{CuratedRow, GeoPoint, RawExtract, RunContext, RunSummary},
    store::{ForecastStore, PgStore},
    transform::transform,
};

#[derive(Debug)]
pub struct Pipeline<S, D> {
    source: S,
    store: D,
    location: String,
    point: GeoPoint,
}

impl Pipeline<NwsClient, PgStore> {
    /// Production wiring: api.weather.gov in, PostgreSQL out.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let source = NwsClient::from_config(&config.api)?;
        let store = PgStore::connect(config).await?;
        Ok(Self::new(source, store, &config.location))
    }
}

impl<S: ForecastSource, D: ForecastStore> Pipeline<S, D> {
    pub fn new(source: S, store: D, location: &LocationConfig) -> Self {
        Self { source, store, location: location.label.clone(), point: location.point() }
    }

    pub fn store(&self) -> &D {
        &self.store
    }

    /// Run once, stamped with the current time at microsecond precision (what
    /// `timestamptz` keeps).
    pub async fn run_once(&self) -> Result<RunSummary> {
        self.run_once_at(Utc::now().trunc_subsecs(6)).await
    }

    /// Run once with an explicit run stamp. The raw payload is committed before
    /// the transform starts and stays committed if anything after it fails.
    pub async fn run_once_at(&self, run_ts_utc: DateTime<Utc>) -> Result<RunSummary> {
        let run = RunContext { run_ts_utc, location: self.location.clone(), point: self.point };
        tracing::info!(run_ts_utc = %run.run_ts_utc, location = %run.location, "starting run");

        let forecast = self.source.fetch_hourly(run.point).await?;

        let raw = RawExtract::new(&run, forecast.source_url, forecast.payload);
        self.store.insert_raw_extract(&raw).await?;

        let rows = transform(&forecast.periods, &run)?;
        let curated_rows = self.store.append_curated(&rows).await?;

        tracing::info!(run_ts_utc = %run.run_ts_utc, curated_rows, "run complete");
        Ok(RunSummary { run_ts_utc, curated_rows, curated_table: self.store.curated_table() })
    }
}

/// Rebuild the curated rows of an earlier run from its stored raw payload,
/// with that run's stamp and location. Nothing is written. `None` if no raw
/// payload carries `run_ts_utc`.
pub async fn rederive<D>(store: &D, run_ts_utc: DateTime<Utc>) -> Result<Option<Vec<CuratedRow>>>
where
    D: ForecastStore + ?Sized,
{
    let Some(raw) = store.raw_extract_at(run_ts_utc).await? else {
        return Ok(None);
    };

    let run = RunContext {
        run_ts_utc: raw.run_ts_utc,
        location: raw.location,
        point: GeoPoint { lat: raw.lat, lon: raw.lon },
    };
    let periods = hourly_periods(&raw.payload)?;
    tracing::debug!(run_ts_utc = %run.run_ts_utc, periods = periods.len(), "re-deriving run");

    transform(periods, &run).map(Some)
}
