//! Reduction of the 3-hour forecast series to one entry per calendar day.

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use std::collections::HashSet;

use crate::model::{ForecastEntry, ForecastSeries, Observation};

/// Number of days shown in the daily forecast.
pub const MAX_FORECAST_DAYS: usize = 5;

/// Keep the first observation seen for each calendar day, up to
/// [`MAX_FORECAST_DAYS`] days, in input order.
///
/// Dates are computed in `offset`, so that the same series always splits into
/// the same days regardless of where the code runs. Observations whose
/// timestamp cannot be represented are skipped.
pub fn daily_forecast(observations: &[Observation], offset: FixedOffset) -> Vec<ForecastEntry> {
    let mut seen: HashSet<NaiveDate> = HashSet::with_capacity(MAX_FORECAST_DAYS);
    let mut daily = Vec::with_capacity(MAX_FORECAST_DAYS);

    for obs in observations {
        if daily.len() == MAX_FORECAST_DAYS {
            break;
        }

        let Some(observed_at) = DateTime::from_timestamp(obs.dt, 0) else {
            continue;
        };
        let date = observed_at.with_timezone(&offset).date_naive();

        if seen.insert(date) {
            daily.push(entry_for(obs, date, observed_at));
        }
    }

    daily
}

fn entry_for(obs: &Observation, date: NaiveDate, observed_at: DateTime<Utc>) -> ForecastEntry {
    let (condition_code, description) = obs
        .weather
        .first()
        .map(|w| (w.icon.clone(), w.description.clone()))
        .unwrap_or_else(|| (String::new(), "Unknown".to_string()));

    ForecastEntry {
        date,
        observed_at,
        temperature_c: obs.main.temp,
        condition_code,
        description,
    }
}

impl ForecastSeries {
    /// UTC offset of the forecast location, falling back to UTC.
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.city.timezone).unwrap_or_else(|| Utc.fix())
    }

    /// Daily forecast for this series, using the location's own calendar days.
    pub fn daily(&self) -> Vec<ForecastEntry> {
        daily_forecast(&self.list, self.offset())
    }
}
