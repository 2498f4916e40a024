//! Two-hop client for api.weather.gov.
//!
//! The first hop resolves a coordinate pair to its forecast office grid via
//! `/points/{lat},{lon}`; the second fetches the hourly forecast document the
//! first one points at. Each document is checked for the fields the next step
//! depends on before anything else happens with it.

use async_trait::async_trait;
use reqwest::{
    Client,
    header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT},
};
use serde_json::Value;
use std::fmt::Debug;

use crate::{
    config::ApiConfig,
    error::{EtlError, Hop, Result},
    model::{GeoPoint, HourlyForecast},
};

/// Issues a single GET and decodes the body as JSON.
#[async_trait]
pub trait HttpTransport: Send + Sync + Debug {
    async fn get_json(&self, hop: Hop, url: &str) -> Result<Value>;
}

/// Anything that can produce an hourly forecast for a point.
#[async_trait]
pub trait ForecastSource: Send + Sync + Debug {
    async fn fetch_hourly(&self, point: GeoPoint) -> Result<HourlyForecast>;
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: Client,
}

impl ReqwestTransport {
    /// Every request carries the configured User-Agent and Accept headers and
    /// is bounded by the configured timeout.
    pub fn new(api: &ApiConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, header_value("user_agent", &api.user_agent)?);
        headers.insert(ACCEPT, header_value("accept", &api.accept)?);

        let http = Client::builder()
            .default_headers(headers)
            .timeout(api.timeout())
            .build()
            .map_err(|e| EtlError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http })
    }
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| EtlError::config(format!("api.{name} is not a valid header value")))
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get_json(&self, hop: Hop, url: &str) -> Result<Value> {
        let request_error = |source| EtlError::Request { hop, url: url.to_string(), source };

        let res = self.http.get(url).send().await.map_err(request_error)?;

        let status = res.status();
        if !status.is_success() {
            return Err(EtlError::Transport { hop, url: url.to_string(), status });
        }

        let body = res.text().await.map_err(request_error)?;
        serde_json::from_str(&body).map_err(|_| EtlError::MalformedResponse { hop, field: "<body>" })
    }
}

#[derive(Debug, Clone)]
pub struct NwsClient<T = ReqwestTransport> {
    base_url: String,
    transport: T,
}

impl NwsClient<ReqwestTransport> {
    pub fn from_config(api: &ApiConfig) -> Result<Self> {
        Ok(Self::with_transport(&api.base_url, ReqwestTransport::new(api)?))
    }
}

impl<T: HttpTransport> NwsClient<T> {
    pub fn with_transport(base_url: &str, transport: T) -> Self {
        Self { base_url: base_url.trim_end_matches('/').to_string(), transport }
    }

    pub fn points_url(&self, point: GeoPoint) -> String {
        format!("{}/points/{},{}", self.base_url, point.lat, point.lon)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

#[async_trait]
impl<T: HttpTransport> ForecastSource for NwsClient<T> {
    async fn fetch_hourly(&self, point: GeoPoint) -> Result<HourlyForecast> {
        let points_url = self.points_url(point);
        tracing::info!(url = %points_url, "resolving forecast point");

        let points = self.transport.get_json(Hop::Points, &points_url).await?;
        let source_url = forecast_hourly_url(&points)?.to_string();

        tracing::info!(url = %source_url, "fetching hourly forecast");
        let payload = self.transport.get_json(Hop::Hourly, &source_url).await?;
        let periods = hourly_periods(&payload)?.to_vec();

        tracing::debug!(periods = periods.len(), "hourly forecast received");
        Ok(HourlyForecast { source_url, periods, payload })
    }
}

/// `properties.forecastHourly` of a points document; must be a non-empty string.
pub fn forecast_hourly_url(points: &Value) -> Result<&str> {
    let props = points
        .get("properties")
        .filter(|p| p.is_object())
        .ok_or(EtlError::MalformedResponse { hop: Hop::Points, field: "properties" })?;

    props
        .get("forecastHourly")
        .and_then(Value::as_str)
        .filter(|url| !url.is_empty())
        .ok_or(EtlError::MalformedResponse { hop: Hop::Points, field: "properties.forecastHourly" })
}

/// `properties.periods` of an hourly forecast document. An empty list is fine.
pub fn hourly_periods(hourly: &Value) -> Result<&[Value]> {
    let props = hourly
        .get("properties")
        .filter(|p| p.is_object())
        .ok_or(EtlError::MalformedResponse { hop: Hop::Hourly, field: "properties" })?;

    props
        .get("periods")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .ok_or(EtlError::MalformedResponse { hop: Hop::Hourly, field: "properties.periods" })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedTransport, hourly_doc, period, points_doc};
    use reqwest::StatusCode;
    use serde_json::json;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
        task::JoinHandle,
    };

    const HUNTSVILLE: GeoPoint = GeoPoint { lat: 34.73, lon: -86.59 };
    const HOURLY_URL: &str = "https://api.weather.gov/gridpoints/HUN/62,46/forecast/hourly";

    #[test]
    fn points_url_uses_plain_coordinates() {
        let client = NwsClient::with_transport("https://api.weather.gov/", ScriptedTransport::default());
        assert_eq!(client.points_url(HUNTSVILLE), "https://api.weather.gov/points/34.73,-86.59");
    }

    #[test]
    fn forecast_hourly_url_requires_properties_object() {
        let err = forecast_hourly_url(&json!({ "properties": [] })).unwrap_err();
        assert!(matches!(err, EtlError::MalformedResponse { hop: Hop::Points, field: "properties" }));

        let err = forecast_hourly_url(&json!({})).unwrap_err();
        assert!(matches!(err, EtlError::MalformedResponse { field: "properties", .. }));
    }

    #[test]
    fn forecast_hourly_url_requires_non_empty_string() {
        for props in [json!({}), json!({ "forecastHourly": "" }), json!({ "forecastHourly": 42 })] {
            let err = forecast_hourly_url(&json!({ "properties": props })).unwrap_err();
            assert!(matches!(
                err,
                EtlError::MalformedResponse { hop: Hop::Points, field: "properties.forecastHourly" }
            ));
        }
    }

    #[test]
    fn hourly_periods_accepts_empty_list() {
        let doc = json!({ "properties": { "periods": [] } });
        assert!(hourly_periods(&doc).unwrap().is_empty());
    }

    #[test]
    fn hourly_periods_requires_a_list() {
        let err = hourly_periods(&json!({ "properties": { "periods": {} } })).unwrap_err();
        assert!(matches!(
            err,
            EtlError::MalformedResponse { hop: Hop::Hourly, field: "properties.periods" }
        ));

        let err = hourly_periods(&json!({ "properties": "nope" })).unwrap_err();
        assert!(matches!(err, EtlError::MalformedResponse { hop: Hop::Hourly, field: "properties" }));
    }

    #[tokio::test]
    async fn fetch_follows_forecast_hourly_link() {
        let doc = hourly_doc(vec![period(0, json!(71)), period(1, json!(70))]);
        let transport = ScriptedTransport::new(vec![Ok(points_doc(HOURLY_URL)), Ok(doc.clone())]);
        let client = NwsClient::with_transport("https://api.weather.gov", transport);

        let forecast = client.fetch_hourly(HUNTSVILLE).await.unwrap();

        assert_eq!(forecast.source_url, HOURLY_URL);
        assert_eq!(forecast.periods.len(), 2);
        assert_eq!(forecast.payload, doc);
        assert_eq!(
            client.transport().requested(),
            vec!["https://api.weather.gov/points/34.73,-86.59".to_string(), HOURLY_URL.to_string()]
        );
    }

    #[tokio::test]
    async fn malformed_points_document_skips_second_hop() {
        let transport = ScriptedTransport::new(vec![Ok(json!({ "properties": {} }))]);
        let client = NwsClient::with_transport("https://api.weather.gov", transport);

        let err = client.fetch_hourly(HUNTSVILLE).await.unwrap_err();

        assert!(matches!(err, EtlError::MalformedResponse { field: "properties.forecastHourly", .. }));
        assert_eq!(client.transport().requested().len(), 1);
    }

    #[tokio::test]
    async fn transport_error_on_second_hop_fails_fetch() {
        let transport = ScriptedTransport::new(vec![
            Ok(points_doc(HOURLY_URL)),
            Err(EtlError::Transport {
                hop: Hop::Hourly,
                url: HOURLY_URL.to_string(),
                status: StatusCode::INTERNAL_SERVER_ERROR,
            }),
        ]);
        let client = NwsClient::with_transport("https://api.weather.gov", transport);

        let err = client.fetch_hourly(HUNTSVILLE).await.unwrap_err();
        assert!(matches!(
            err,
            EtlError::Transport { hop: Hop::Hourly, status, .. } if status == StatusCode::INTERNAL_SERVER_ERROR
        ));
    }

    #[test]
    fn reqwest_transport_rejects_unprintable_user_agent() {
        let api = ApiConfig { user_agent: "bad\nagent".into(), ..ApiConfig::default() };
        let err = ReqwestTransport::new(&api).unwrap_err();
        assert!(err.to_string().contains("user_agent"));
    }

    /// Accept one connection on a local port, answer it with `response` and
    /// hand back the raw request head.
    async fn serve_once(response: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&request).to_lowercase()
        });

        (format!("http://{addr}/points/34.73,-86.59"), handle)
    }

    #[tokio::test]
    async fn non_success_status_is_a_transport_error_and_headers_are_sent() {
        let (url, server) = serve_once(
            "HTTP/1.1 503 Service Unavailable\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
        )
        .await;
        let transport = ReqwestTransport::new(&ApiConfig::default()).unwrap();

        let err = transport.get_json(Hop::Points, &url).await.unwrap_err();

        assert!(matches!(
            err,
            EtlError::Transport { hop: Hop::Points, status, .. } if status == StatusCode::SERVICE_UNAVAILABLE
        ));
        assert!(err.to_string().contains("503"));

        let request = server.await.unwrap();
        assert!(request.starts_with("get /points/34.73,-86.59 "));
        assert!(request.contains("user-agent: nws-hourly-etl/0.1 (ops@example.com)\r\n"));
        assert!(request.contains("accept: application/geo+json\r\n"));
    }

    #[tokio::test]
    async fn non_json_body_is_a_malformed_response() {
        let (url, server) = serve_once(
            "HTTP/1.1 200 OK\r\ncontent-type: text/html\r\ncontent-length: 9\r\nconnection: close\r\n\r\nnot json!",
        )
        .await;
        let transport = ReqwestTransport::new(&ApiConfig::default()).unwrap();

        let err = transport.get_json(Hop::Hourly, &url).await.unwrap_err();

        assert!(matches!(err, EtlError::MalformedResponse { hop: Hop::Hourly, field: "<body>" }));
        server.await.unwrap();
    }
}
