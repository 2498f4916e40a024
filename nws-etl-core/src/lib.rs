//! Core library for the NWS hourly forecast ETL.
//!
//! This crate defines:
//! - A two-hop client for api.weather.gov with response shape checks
//! - Raw payload capture and append-only curated loads into PostgreSQL
//! - Per-field coercion of forecast periods into typed rows
//! - The run orchestrator tying those together
//!
//! It is used by `nws-etl-cli`, but any scheduler able to call
//! [`Pipeline::run_once`] can drive it.

pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod store;
pub mod transform;

#[cfg(test)]
mod testing;

pub use client::{ForecastSource, HttpTransport, NwsClient, ReqwestTransport};
pub use config::Config;
pub use error::{EtlError, Hop, Result};
pub use model::{CuratedRow, ForecastPeriod, GeoPoint, HourlyForecast, RawExtract, RunContext, RunSummary};
pub use pipeline::{Pipeline, rederive};
pub use store::{ForecastStore, MemoryStore, PgStore};
