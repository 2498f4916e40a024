//! Flattens forecast periods into typed curated rows.
//!
//! Each field is coerced on its own: a value that cannot be read as the
//! column's type becomes `None` without affecting the rest of the row.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    error::{EtlError, Result},
    model::{CuratedRow, Field, ForecastPeriod, RunContext},
};

/// Decode the object entries of `periods` and coerce them into rows stamped
/// with the run's timestamp and location. Non-object entries are skipped.
pub fn transform(periods: &[Value], run: &RunContext) -> Result<Vec<CuratedRow>> {
    let decoded = decode_periods(periods);
    check_required_columns(&decoded)?;

    Ok(decoded.iter().map(|period| curate(period, run)).collect())
}

/// Keep only the entries that are JSON objects, decoded with every key optional.
pub fn decode_periods(periods: &[Value]) -> Vec<ForecastPeriod> {
    periods
        .iter()
        .enumerate()
        .filter_map(|(index, value)| {
            if !value.is_object() {
                tracing::warn!(index, "skipping forecast period that is not an object");
                return None;
            }
            match ForecastPeriod::deserialize(value) {
                Ok(period) => Some(period),
                Err(e) => {
                    tracing::warn!(index, error = %e, "skipping undecodable forecast period");
                    None
                }
            }
        })
        .collect()
}

/// A column exists once any period carries its key, even with a null value.
/// With no periods at all there is nothing to load and nothing to check.
pub fn check_required_columns(periods: &[ForecastPeriod]) -> Result<()> {
    if periods.is_empty() {
        return Ok(());
    }

    let columns = [
        ("start_time", periods.iter().any(|p| p.start_time.is_present())),
        ("end_time", periods.iter().any(|p| p.end_time.is_present())),
        ("temperature", periods.iter().any(|p| p.temperature.is_present())),
    ];
    let missing: Vec<&'static str> =
        columns.iter().filter(|(_, present)| !present).map(|(name, _)| *name).collect();

    if missing.is_empty() { Ok(()) } else { Err(EtlError::MissingColumns { missing }) }
}

pub fn curate(period: &ForecastPeriod, run: &RunContext) -> CuratedRow {
    CuratedRow {
        run_ts_utc: run.run_ts_utc,
        location: run.location.clone(),
        start_time: coerce_timestamp(&period.start_time),
        end_time: coerce_timestamp(&period.end_time),
        is_daytime: coerce_bool(&period.is_daytime),
        temperature: coerce_temperature(&period.temperature),
        temperature_unit: coerce_text(&period.temperature_unit),
        wind_speed: coerce_text(&period.wind_speed),
        wind_direction: coerce_text(&period.wind_direction),
        short_forecast: coerce_text(&period.short_forecast),
        detailed_forecast: coerce_text(&period.detailed_forecast),
        icon: coerce_text(&period.icon),
    }
}

/// RFC 3339 strings are converted to UTC; offset-less ISO 8601 strings are taken as UTC.
/// Narrower than a general date parser on purpose: date-only strings and
/// compact offsets such as `+0000` are not instants NWS emits, and become `None`.
pub fn coerce_timestamp(field: &Field) -> Option<DateTime<Utc>> {
    let s = field.value()?.as_str()?.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Integers pass through; fractional numbers (or numeric strings) are rounded
/// half-to-even. Anything else, or anything outside `i32`, is `None`.
pub fn coerce_temperature(field: &Field) -> Option<i32> {
    match field.value()? {
        Value::Number(n) => match n.as_i64() {
            Some(i) => i32::try_from(i).ok(),
            None => n.as_f64().and_then(round_to_i32),
        },
        Value::String(s) => {
            let s = s.trim();
            match s.parse::<i64>() {
                Ok(i) => i32::try_from(i).ok(),
                Err(_) => s.parse::<f64>().ok().and_then(round_to_i32),
            }
        }
        _ => None,
    }
}

fn round_to_i32(x: f64) -> Option<i32> {
    if !x.is_finite() {
        return None;
    }
    let rounded = x.round_ties_even();
    if rounded < f64::from(i32::MIN) || rounded > f64::from(i32::MAX) {
        return None;
    }
    Some(rounded as i32)
}

pub fn coerce_bool(field: &Field) -> Option<bool> {
    field.value()?.as_bool()
}

/// Strings verbatim; any other non-null value as its compact JSON text.
pub fn coerce_text(field: &Field) -> Option<String> {
    match field.value()? {
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
