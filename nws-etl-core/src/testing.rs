//! Fakes and fixture documents shared by the unit tests.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::{
    collections::VecDeque,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use crate::{
    client::{ForecastSource, HttpTransport},
    error::{EtlError, Hop, Result},
    model::{GeoPoint, HourlyForecast},
};

/// Replays canned responses in order and records every URL requested.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<Value>>>,
    requested: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<Result<Value>>) -> Self {
        Self { responses: Mutex::new(responses.into()), requested: Mutex::default() }
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn get_json(&self, hop: Hop, url: &str) -> Result<Value> {
        self.requested.lock().unwrap().push(url.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(EtlError::config(format!("no scripted response for {hop} {url}"))))
    }
}

pub fn points_doc(forecast_hourly: &str) -> Value {
    json!({
        "@context": ["https://geojson.org/geojson-ld/geojson-context.jsonld"],
        "type": "Feature",
        "properties": {
            "gridId": "HUN",
            "gridX": 62,
            "gridY": 46,
            "forecast": forecast_hourly.trim_end_matches("/hourly"),
            "forecastHourly": forecast_hourly
        }
    })
}

pub fn hourly_doc(periods: Vec<Value>) -> Value {
    json!({
        "type": "Feature",
        "geometry": { "type": "Polygon", "coordinates": [[[-86.6, 34.7], [-86.5, 34.7]]] },
        "properties": {
            "units": "us",
            "generatedAt": "2026-01-23T15:04:11+00:00",
            "updateTime": "2026-01-23T14:52:02+00:00",
            "periods": periods
        }
    })
}

/// A well-formed hourly period starting `hour` hours after 2026-01-23T10:00-06:00.
pub fn period(hour: u32, temperature: Value) -> Value {
    let start = format!("2026-01-23T{:02}:00:00-06:00", 10 + hour);
    let end = format!("2026-01-23T{:02}:00:00-06:00", 11 + hour);
    json!({
        "number": hour + 1,
        "name": "",
        "startTime": start,
        "endTime": end,
        "isDaytime": true,
        "temperature": temperature,
        "temperatureUnit": "F",
        "temperatureTrend": "",
        "probabilityOfPrecipitation": { "unitCode": "wmoUnit:percent", "value": 3 },
        "windSpeed": "5 mph",
        "windDirection": "SW",
        "icon": "https://api.weather.gov/icons/land/day/few?size=small",
        "shortForecast": "Sunny",
        "detailedForecast": ""
    })
}

/// Returns the same forecast on every call and counts the calls.
#[derive(Debug)]
pub struct FixedSource {
    forecast: HourlyForecast,
    calls: AtomicUsize,
}

impl FixedSource {
    pub fn new(forecast: HourlyForecast) -> Self {
        Self { forecast, calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ForecastSource for FixedSource {
    async fn fetch_hourly(&self, _point: GeoPoint) -> Result<HourlyForecast> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.forecast.clone())
    }
}

pub fn hourly_forecast(source_url: &str, periods: Vec<Value>) -> HourlyForecast {
    let payload = hourly_doc(periods.clone());
    HourlyForecast { source_url: source_url.to_string(), periods, payload }
}
