use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::{
    error::{Error, Result},
    model::{CurrentConditions, ForecastSeries, Locator},
};

use super::WeatherGateway;

/// Client for the OpenWeatherMap 2.5 API (`/weather` and `/forecast`).
#[derive(Debug, Clone)]
pub struct OpenWeatherGateway {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherGateway {
    /// Every request made by this gateway is bounded by `timeout`.
    pub fn new(api_key: String, base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            api_key,
            base_url,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[instrument(skip(self, locator), fields(locator = %locator))]
    async fn get<T: DeserializeOwned>(&self, endpoint: &str, locator: &Locator) -> Result<T> {
        let url = format!("{}/{}", self.base_url, endpoint);

        let mut query = locator.query_pairs();
        query.push(("units", "metric".to_string()));
        query.push(("appid", self.api_key.clone()));

        debug!("Requesting OpenWeather {endpoint}");

        let res = self
            .http
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(transport_error)?;

        let status = res.status();
        let body = res.text().await.map_err(transport_error)?;

        if !status.is_success() {
            let err = upstream_error(status, &body);
            warn!(%status, "OpenWeather {endpoint} request failed: {err}");
            return Err(err);
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl WeatherGateway for OpenWeatherGateway {
    async fn fetch_current(&self, locator: &Locator) -> Result<CurrentConditions> {
        self.get("weather", locator).await
    }

    async fn fetch_forecast(&self, locator: &Locator) -> Result<ForecastSeries> {
        self.get("forecast", locator).await
    }
}

/// Error body returned by the provider, e.g. `{"cod":"404","message":"city not found"}`.
#[derive(Debug, Deserialize)]
struct ProviderMessage {
    #[serde(default)]
    message: String,
}

fn transport_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Timeout
    } else {
        Error::Transport(err)
    }
}

fn upstream_error(status: StatusCode, body: &str) -> Error {
    let message = serde_json::from_str::<ProviderMessage>(body)
        .ok()
        .map(|m| m.message)
        .filter(|m| !m.is_empty());

    if status == StatusCode::NOT_FOUND {
        return Error::NotFound(message.unwrap_or_else(|| "City not found".to_string()));
    }

    Error::Upstream {
        status: status.as_u16(),
        message: message.unwrap_or_else(|| truncate_body(body)),
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.chars().count() > MAX {
        format!("{}...", body.chars().take(MAX).collect::<String>())
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn current_body() -> serde_json::Value {
        serde_json::json!({
            "coord": {"lon": 2.3488, "lat": 48.8534},
            "weather": [{"id": 800, "main": "Clear", "description": "clear sky", "icon": "01d"}],
            "main": {"temp": 22.1, "feels_like": 21.7, "pressure": 1018, "humidity": 48},
            "visibility": 10000,
            "wind": {"speed": 4.1, "deg": 240},
            "dt": 1718280000,
            "sys": {"country": "FR"},
            "timezone": 7200,
            "name": "Paris",
            "cod": 200
        })
    }

    fn gateway(server: &MockServer) -> OpenWeatherGateway {
        OpenWeatherGateway::new(
            "test_key".to_string(),
            format!("{}/data/2.5/", server.uri()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn current_by_place_sends_query_units_and_key() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("q", "Paris,FR"))
            .and(query_param("units", "metric"))
            .and(query_param("appid", "test_key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(current_body()))
            .expect(1)
            .mount(&server)
            .await;

        let current = gateway(&server)
            .fetch_current(&Locator::Place("Paris,FR".into()))
            .await
            .unwrap();

        assert_eq!(current.name, "Paris");
        assert_eq!(current.country(), "FR");
        assert_eq!(current.main.humidity, 48);
    }

    #[tokio::test]
    async fn forecast_by_coordinates_sends_lat_lon() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "cod": "200",
            "cnt": 2,
            "list": [
                {
                    "dt": 1718280000,
                    "main": {"temp": 20.0, "feels_like": 19.5, "pressure": 1015, "humidity": 60},
                    "weather": [
                        {"id": 801, "main": "Clouds", "description": "few clouds", "icon": "02d"}
                    ],
                    "dt_txt": "2024-06-13 12:00:00"
                },
                {
                    "dt": 1718290800,
                    "main": {"temp": 18.0, "feels_like": 17.5, "pressure": 1015, "humidity": 65},
                    "weather": [
                        {"id": 500, "main": "Rain", "description": "light rain", "icon": "10d"}
                    ],
                    "dt_txt": "2024-06-13 15:00:00"
                }
            ],
            "city": {
                "name": "Paris",
                "country": "FR",
                "coord": {"lat": 48.85, "lon": 2.35},
                "timezone": 7200
            }
        });

        Mock::given(method("GET"))
            .and(path("/data/2.5/forecast"))
            .and(query_param("lat", "48.85"))
            .and(query_param("lon", "2.35"))
            .and(query_param("units", "metric"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let paris = Locator::Coordinates {
            lat: 48.85,
            lon: 2.35,
        };
        let series = gateway(&server).fetch_forecast(&paris).await.unwrap();

        assert_eq!(series.list.len(), 2);
        assert_eq!(series.city.timezone, 7200);
        assert_eq!(series.extra.get("cnt"), Some(&serde_json::Value::from(2)));
    }

    #[tokio::test]
    async fn not_found_carries_provider_message() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(serde_json::json!({"cod": "404", "message": "city not found"})),
            )
            .mount(&server)
            .await;

        let err = gateway(&server)
            .fetch_current(&Locator::Place("Atlantis".into()))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "Not found: city not found");
    }

    #[tokio::test]
    async fn server_error_keeps_status() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/forecast"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
            .mount(&server)
            .await;

        let err = gateway(&server)
            .fetch_forecast(&Locator::Place("Paris".into()))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(err.status(), Some(503));
        match err {
            Error::Upstream { message, .. } => assert_eq!(message, "upstream unavailable"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unauthorized_uses_json_message() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "cod": 401,
                "message": "Invalid API key. Please see the provider FAQ for more info."
            })))
            .mount(&server)
            .await;

        let err = gateway(&server)
            .fetch_current(&Locator::Place("Paris".into()))
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(401));
        assert!(err.to_string().contains("Invalid API key"));
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(current_body())
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let gateway =
            OpenWeatherGateway::new("k".to_string(), server.uri(), Duration::from_millis(50))
                .unwrap();
        let err = gateway
            .fetch_current(&Locator::Place("Paris".into()))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Timeout));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn refused_connection_is_a_transport_error() {
        // Bind then drop a listener so nothing accepts on that port.
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let gateway = OpenWeatherGateway::new(
            "k".to_string(),
            format!("http://{addr}"),
            Duration::from_secs(5),
        )
        .unwrap();

        let err = gateway
            .fetch_current(&Locator::Place("Paris".into()))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(err.status(), None);
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn malformed_body_is_a_parse_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = gateway(&server)
            .fetch_current(&Locator::Place("Paris".into()))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let long = "é".repeat(300);
        let truncated = truncate_body(&long);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.chars().count(), 203);
        assert_eq!(truncate_body("short"), "short");
    }
}
