//! Weather lookups as seen by the application: validation, upstream calls,
//! daily aggregation and the search-history side effect.

use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::{
    error::{Error, Result},
    gateway::WeatherGateway,
    model::{CurrentConditions, ForecastEntry, ForecastSeries, LocationQuery, UserId},
    store::HistoryStore,
};

/// Daily forecast together with the raw series it was derived from.
#[derive(Debug, Clone)]
pub struct DailyForecast {
    pub series: ForecastSeries,
    pub days: Vec<ForecastEntry>,
}

impl From<ForecastSeries> for DailyForecast {
    fn from(series: ForecastSeries) -> Self {
        let days = series.daily();
        Self { series, days }
    }
}

/// Result of a combined current + forecast lookup.
///
/// The current conditions are mandatory; a forecast failure leaves `forecast`
/// empty and is reported in `forecast_error`.
#[derive(Debug)]
pub struct Lookup {
    pub current: CurrentConditions,
    pub forecast: Vec<ForecastEntry>,
    pub forecast_error: Option<Error>,
}

pub struct WeatherService {
    gateway: Arc<dyn WeatherGateway>,
    history: Arc<dyn HistoryStore>,
}

impl WeatherService {
    pub fn new(gateway: Arc<dyn WeatherGateway>, history: Arc<dyn HistoryStore>) -> Self {
        Self { gateway, history }
    }

    /// Current conditions for `query`, recorded in `user`'s search history.
    ///
    /// # Errors
    /// `Error::Validation` if the query names no location (no request is made),
    /// otherwise whatever the gateway reports. A failed history write is logged
    /// and never fails the lookup.
    #[instrument(skip(self, user, query), fields(user = %user))]
    pub async fn current(&self, user: &UserId, query: &LocationQuery) -> Result<CurrentConditions> {
        let locator = query.locator()?;
        let current = self.gateway.fetch_current(&locator).await?;
        self.record_search(user, &current);
        Ok(current)
    }

    /// Daily forecast for `query`. Never touches search history.
    #[instrument(skip(self, query))]
    pub async fn forecast(&self, query: &LocationQuery) -> Result<DailyForecast> {
        let locator = query.locator()?;
        let series = self.gateway.fetch_forecast(&locator).await?;
        Ok(DailyForecast::from(series))
    }

    /// Current conditions and daily forecast, fetched concurrently.
    ///
    /// # Errors
    /// Fails if the query is invalid or the current-conditions call fails.
    /// Forecast failures are tolerated, see [`Lookup`].
    #[instrument(skip(self, user, query), fields(user = %user))]
    pub async fn lookup(&self, user: &UserId, query: &LocationQuery) -> Result<Lookup> {
        let locator = query.locator()?;

        let (current, forecast) = tokio::join!(
            self.gateway.fetch_current(&locator),
            self.gateway.fetch_forecast(&locator),
        );

        let current = current?;
        self.record_search(user, &current);

        let (forecast, forecast_error) = match forecast {
            Ok(series) => (series.daily(), None),
            Err(e) => {
                warn!("Forecast unavailable for {locator}: {e}");
                (Vec::new(), Some(e))
            }
        };

        info!(city = %current.name, days = forecast.len(), "Lookup complete");
        Ok(Lookup {
            current,
            forecast,
            forecast_error,
        })
    }

    /// Best-effort history write.
    ///
    /// The store call is synchronous and holds the connection lock for a single
    /// insert. Hosting the service in a long-running server would call for
    /// `tokio::task::spawn_blocking` here.
    fn record_search(&self, user: &UserId, current: &CurrentConditions) {
        if let Err(e) = self.history.record(user, &current.name, current.country()) {
            warn!(user = %user, city = %current.name, "Failed to save search history: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::model::{
        Condition, Coord, ForecastCity, HistoryEntry, Locator, MainReadings, Observation, Sys, Wind,
    };
    use crate::store::Database;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Gateway double that records every call it receives.
    #[derive(Debug, Default)]
    struct RecordingGateway {
        current_calls: AtomicUsize,
        forecast_calls: AtomicUsize,
        fail_current: bool,
        fail_forecast: bool,
        seen: Mutex<Vec<Locator>>,
    }

    impl RecordingGateway {
        fn calls(&self) -> usize {
            self.current_calls.load(Ordering::SeqCst) + self.forecast_calls.load(Ordering::SeqCst)
        }
    }

    fn readings(temp: f64) -> MainReadings {
        MainReadings {
            temp,
            feels_like: temp,
            humidity: 40,
            pressure: 1012.0,
        }
    }

    fn clear_sky() -> Vec<Condition> {
        vec![Condition {
            id: 800,
            main: "Clear".into(),
            description: "clear sky".into(),
            icon: "01d".into(),
        }]
    }

    fn paris_now() -> CurrentConditions {
        CurrentConditions {
            coord: Coord {
                lat: 48.85,
                lon: 2.35,
            },
            weather: clear_sky(),
            main: readings(21.0),
            visibility: Some(10000),
            wind: Wind {
                speed: 3.0,
                deg: None,
            },
            dt: 1718280000,
            sys: Sys {
                country: Some("FR".into()),
            },
            timezone: 0,
            name: "Paris".into(),
            extra: Default::default(),
        }
    }

    fn paris_series() -> ForecastSeries {
        ForecastSeries {
            list: (0..16)
                .map(|i| Observation {
                    dt: 1718236800 + i * 3 * 3600,
                    main: readings(i as f64),
                    weather: clear_sky(),
                    wind: None,
                    visibility: None,
                    dt_txt: None,
                })
                .collect(),
            city: ForecastCity {
                name: "Paris".into(),
                country: "FR".into(),
                coord: None,
                timezone: 0,
            },
            extra: Default::default(),
        }
    }

    #[async_trait]
    impl WeatherGateway for RecordingGateway {
        async fn fetch_current(&self, locator: &Locator) -> Result<CurrentConditions> {
            self.current_calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().push(locator.clone());
            if self.fail_current {
                return Err(Error::not_found("city not found"));
            }
            Ok(paris_now())
        }

        async fn fetch_forecast(&self, locator: &Locator) -> Result<ForecastSeries> {
            self.forecast_calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().push(locator.clone());
            if self.fail_forecast {
                return Err(Error::Upstream {
                    status: 500,
                    message: "boom".into(),
                });
            }
            Ok(paris_series())
        }
    }

    /// History store whose writes always fail.
    struct BrokenHistory;

    impl HistoryStore for BrokenHistory {
        fn record(&self, _: &UserId, _: &str, _: &str) -> Result<HistoryEntry> {
            Err(Error::Storage(rusqlite::Error::InvalidQuery))
        }

        fn list(&self, _: &UserId, _: Option<usize>) -> Result<Vec<HistoryEntry>> {
            Ok(Vec::new())
        }

        fn clear(&self, _: &UserId) -> Result<usize> {
            Ok(0)
        }
    }

    fn user() -> UserId {
        UserId::new("u1").unwrap()
    }

    fn service(gateway: Arc<RecordingGateway>, db: &Database) -> WeatherService {
        WeatherService::new(gateway, Arc::new(db.history()))
    }

    #[tokio::test]
    async fn empty_query_fails_before_any_request() {
        let gateway = Arc::new(RecordingGateway::default());
        let db = Database::in_memory().unwrap();
        let svc = service(gateway.clone(), &db);

        let nowhere = LocationQuery::default();

        let err = svc.current(&user(), &nowhere).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = svc.lookup(&user(), &nowhere).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = svc.forecast(&nowhere).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        assert_eq!(gateway.calls(), 0);
    }

    #[tokio::test]
    async fn current_lookup_records_history() {
        let gateway = Arc::new(RecordingGateway::default());
        let db = Database::in_memory().unwrap();
        let svc = service(gateway.clone(), &db);

        let paris = LocationQuery::place("Paris");
        let current = svc.current(&user(), &paris).await.unwrap();
        assert_eq!(current.name, "Paris");

        let history = db.history().list(&user(), None).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].city, "Paris");
        assert_eq!(history[0].country, "FR");

        let expected = [Locator::Place("Paris".into())];
        assert_eq!(gateway.seen.lock().as_slice(), &expected);
    }

    #[tokio::test]
    async fn three_lookups_then_list_two() {
        let gateway = Arc::new(RecordingGateway::default());
        let db = Database::in_memory().unwrap();
        let svc = service(gateway, &db);

        let paris = LocationQuery::coordinates(48.85, 2.35);
        for _ in 0..3 {
            svc.current(&user(), &paris).await.unwrap();
        }

        let all = db.history().list(&user(), None).unwrap();
        let recent = db.history().list(&user(), Some(2)).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, all[0].id);
        assert_eq!(recent[1].id, all[1].id);
        assert!(recent[0].searched_at >= recent[1].searched_at);
    }

    #[tokio::test]
    async fn history_failure_does_not_fail_lookup() {
        let gateway = Arc::new(RecordingGateway::default());
        let svc = WeatherService::new(gateway, Arc::new(BrokenHistory));

        let paris = LocationQuery::place("Paris");
        let current = svc.current(&user(), &paris).await.unwrap();
        assert_eq!(current.name, "Paris");

        let lookup = svc.lookup(&user(), &paris).await.unwrap();
        assert_eq!(lookup.current.name, "Paris");
    }

    #[tokio::test]
    async fn forecast_never_writes_history() {
        let gateway = Arc::new(RecordingGateway::default());
        let db = Database::in_memory().unwrap();
        let svc = service(gateway.clone(), &db);

        let paris = LocationQuery::place("Paris");
        let forecast = svc.forecast(&paris).await.unwrap();
        assert_eq!(forecast.days.len(), 2);
        assert_eq!(forecast.series.list.len(), 16);

        assert!(db.history().list(&user(), None).unwrap().is_empty());
        assert_eq!(gateway.current_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn lookup_combines_current_and_daily_forecast() {
        let gateway = Arc::new(RecordingGateway::default());
        let db = Database::in_memory().unwrap();
        let svc = service(gateway.clone(), &db);

        let paris = LocationQuery::place("Paris");
        let lookup = svc.lookup(&user(), &paris).await.unwrap();

        assert_eq!(lookup.current.name, "Paris");
        assert_eq!(lookup.forecast.len(), 2);
        assert!(lookup.forecast_error.is_none());
        assert_eq!(gateway.current_calls.load(Ordering::SeqCst), 1);
        assert_eq!(gateway.forecast_calls.load(Ordering::SeqCst), 1);
        assert_eq!(db.history().list(&user(), None).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_current_fails_lookup_without_history() {
        let gateway = Arc::new(RecordingGateway {
            fail_current: true,
            ..Default::default()
        });
        let db = Database::in_memory().unwrap();
        let svc = service(gateway, &db);

        let atlantis = LocationQuery::place("Atlantis");
        let err = svc.lookup(&user(), &atlantis).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(db.history().list(&user(), None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_forecast_is_tolerated() {
        let gateway = Arc::new(RecordingGateway {
            fail_forecast: true,
            ..Default::default()
        });
        let db = Database::in_memory().unwrap();
        let svc = service(gateway, &db);

        let paris = LocationQuery::place("Paris");
        let lookup = svc.lookup(&user(), &paris).await.unwrap();

        assert!(lookup.forecast.is_empty());
        let status = lookup.forecast_error.as_ref().and_then(Error::status);
        assert_eq!(status, Some(500));
        assert_eq!(db.history().list(&user(), None).unwrap().len(), 1);
    }
}
