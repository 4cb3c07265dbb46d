use crate::{
    Config,
    error::Result,
    gateway::openweather::OpenWeatherGateway,
    model::{CurrentConditions, ForecastSeries, Locator},
};
use async_trait::async_trait;
use std::fmt::Debug;

pub mod openweather;

/// Read-only access to an upstream weather provider.
///
/// Implementations forward the locator verbatim and return the parsed body;
/// they have no side effects.
#[async_trait]
pub trait WeatherGateway: Send + Sync + Debug {
    async fn fetch_current(&self, locator: &Locator) -> Result<CurrentConditions>;

    /// 5-day series at 3-hour granularity.
    async fn fetch_forecast(&self, locator: &Locator) -> Result<ForecastSeries>;
}

/// Construct the OpenWeather gateway from config.
pub fn gateway_from_config(config: &Config) -> anyhow::Result<OpenWeatherGateway> {
    let api_key = config.api_key().ok_or_else(|| {
        anyhow::anyhow!(
            "No API key configured for the weather provider.\n\
                 Hint: run `skyfolio configure` or set WEATHER_API_KEY."
        )
    })?;

    let timeout = config.timeout();
    let gateway = OpenWeatherGateway::new(api_key.to_owned(), &config.base_url, timeout)?;
    Ok(gateway)
}
