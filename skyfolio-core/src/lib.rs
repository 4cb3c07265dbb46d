//! Core library for the `skyfolio` weather tool.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The gateway to the upstream weather provider
//! - Aggregation of the 3-hour forecast into one entry per day
//! - Favorites and search history storage
//! - The lookup service tying these together
//!
//! It is used by `skyfolio-cli`, but can also be reused by other binaries or services.

pub mod config;
pub mod error;
pub mod forecast;
pub mod gateway;
pub mod model;
pub mod service;
pub mod store;

pub use config::Config;
pub use error::{Error, ErrorKind, Result};
pub use forecast::{MAX_FORECAST_DAYS, daily_forecast};
pub use gateway::{WeatherGateway, gateway_from_config, openweather::OpenWeatherGateway};
pub use model::{
    CurrentConditions, Favorite, ForecastEntry, ForecastSeries, HistoryEntry, LocationQuery,
    Locator, NewFavorite, UserId, WeatherSnapshot,
};
pub use service::{DailyForecast, Lookup, WeatherService};
pub use store::{Database, FavoritesStore, HistoryStore};
