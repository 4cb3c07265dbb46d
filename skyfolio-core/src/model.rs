use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::{Error, Result};

/// Opaque identifier of the user owning favorites and history.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(Error::validation("User id cannot be empty"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a weather lookup is addressed.
#[derive(Debug, Clone, PartialEq)]
pub enum Locator {
    /// Free text such as "Paris", "Paris,FR" or "Ashta,MP,IN", forwarded verbatim.
    Place(String),
    Coordinates { lat: f64, lon: f64 },
}

impl Locator {
    /// Query parameters identifying this location to the provider.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        match self {
            Locator::Place(place) => vec![("q", place.clone())],
            Locator::Coordinates { lat, lon } => {
                vec![("lat", lat.to_string()), ("lon", lon.to_string())]
            }
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Place(place) => f.write_str(place),
            Locator::Coordinates { lat, lon } => write!(f, "{lat:.4},{lon:.4}"),
        }
    }
}

const MISSING_LOCATION: &str = "Please provide either city name or coordinates (lat, lon)";

/// Raw lookup input as received from a caller; any part may be missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationQuery {
    pub place: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

impl LocationQuery {
    pub fn place(place: impl Into<String>) -> Self {
        Self {
            place: Some(place.into()),
            ..Self::default()
        }
    }

    pub fn coordinates(lat: f64, lon: f64) -> Self {
        Self {
            place: None,
            lat: Some(lat),
            lon: Some(lon),
        }
    }

    /// Resolve into a [`Locator`]. A non-blank place takes precedence over coordinates.
    pub fn locator(&self) -> Result<Locator> {
        let place = self.place.as_deref().map(str::trim);
        if let Some(place) = place.filter(|p| !p.is_empty()) {
            return Ok(Locator::Place(place.to_string()));
        }

        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => {
                if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
                    return Err(Error::validation(format!("Latitude {lat} is out of range")));
                }
                if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
                    return Err(Error::validation(format!("Longitude {lon} is out of range")));
                }
                Ok(Locator::Coordinates { lat, lon })
            }
            _ => Err(Error::validation(MISSING_LOCATION)),
        }
    }
}

// Provider payloads. Field names follow the provider's JSON so that the
// parsed bodies serialize back to the same shape.

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub main: String,
    pub description: String,
    #[serde(default)]
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainReadings {
    pub temp: f64,
    pub feels_like: f64,
    pub humidity: u8,
    pub pressure: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    pub speed: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deg: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sys {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

/// Body of the provider's current-conditions endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub coord: Coord,
    pub weather: Vec<Condition>,
    pub main: MainReadings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<u32>,
    pub wind: Wind,
    pub dt: i64,
    #[serde(default)]
    pub sys: Sys,
    /// Shift from UTC in seconds.
    #[serde(default)]
    pub timezone: i32,
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CurrentConditions {
    pub fn country(&self) -> &str {
        self.sys.country.as_deref().unwrap_or_default()
    }

    pub fn snapshot(&self) -> WeatherSnapshot {
        WeatherSnapshot::from(self)
    }
}

/// One 3-hour step of the forecast series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub dt: i64,
    pub main: MainReadings,
    pub weather: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind: Option<Wind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dt_txt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastCity {
    pub name: String,
    #[serde(default)]
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coord: Option<Coord>,
    #[serde(default)]
    pub timezone: i32,
}

/// Body of the provider's 5-day / 3-hour forecast endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSeries {
    pub list: Vec<Observation>,
    pub city: ForecastCity,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Flattened view of a current-conditions lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub city: String,
    pub country: String,
    pub lat: f64,
    pub lon: f64,
    pub observed_at: DateTime<Utc>,
    pub temperature_c: f64,
    pub feels_like_c: f64,
    pub humidity_pct: u8,
    pub wind_speed_mps: f64,
    pub pressure_hpa: f64,
    pub visibility_m: Option<u32>,
    pub condition_code: String,
    pub description: String,
}

impl From<&CurrentConditions> for WeatherSnapshot {
    fn from(current: &CurrentConditions) -> Self {
        let (condition_code, description) = current
            .weather
            .first()
            .map(|w| (w.icon.clone(), w.description.clone()))
            .unwrap_or_else(|| (String::new(), "Unknown".to_string()));

        Self {
            city: current.name.clone(),
            country: current.country().to_string(),
            lat: current.coord.lat,
            lon: current.coord.lon,
            observed_at: DateTime::from_timestamp(current.dt, 0).unwrap_or_else(Utc::now),
            temperature_c: current.main.temp,
            feels_like_c: current.main.feels_like,
            humidity_pct: current.main.humidity,
            wind_speed_mps: current.wind.speed,
            pressure_hpa: current.main.pressure,
            visibility_m: current.visibility,
            condition_code,
            description,
        }
    }
}

/// Representative observation for one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastEntry {
    pub date: NaiveDate,
    pub observed_at: DateTime<Utc>,
    pub temperature_c: f64,
    pub condition_code: String,
    pub description: String,
}

/// Input for creating a favorite. Coordinates are optional so that a missing
/// value can be told apart from a legitimate zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewFavorite {
    pub city: String,
    pub country: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

impl NewFavorite {
    pub fn new(city: impl Into<String>, country: impl Into<String>, lat: f64, lon: f64) -> Self {
        Self {
            city: city.into(),
            country: country.into(),
            lat: Some(lat),
            lon: Some(lon),
        }
    }
}

impl From<&CurrentConditions> for NewFavorite {
    fn from(current: &CurrentConditions) -> Self {
        Self {
            city: current.name.clone(),
            country: current.country().to_string(),
            lat: Some(current.coord.lat),
            lon: Some(current.coord.lon),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Favorite {
    pub id: String,
    pub city: String,
    pub country: String,
    pub lat: f64,
    pub lon: f64,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
}

impl Favorite {
    pub fn location_query(&self) -> LocationQuery {
        LocationQuery::coordinates(self.lat, self.lon)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub city: String,
    pub country: String,
    pub user_id: UserId,
    pub searched_at: DateTime<Utc>,
}
