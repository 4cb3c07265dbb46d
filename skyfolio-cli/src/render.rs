//! Plain-text rendering of lookups, favorites and history.

use skyfolio_core::{CurrentConditions, Favorite, ForecastEntry, HistoryEntry};
use std::fmt::Write;

fn degrees(celsius: f64) -> String {
    format!("{}°C", celsius.round() as i64)
}

/// Symbol for a provider icon code such as "10d". Unknown codes show a cloud.
fn glyph(condition_code: &str) -> &'static str {
    match condition_code.get(..2) {
        Some("01") => "☀",
        Some("02") => "⛅",
        Some("09" | "10") => "🌧",
        Some("11") => "⛈",
        Some("13") => "❄",
        Some("50") => "🌫",
        _ => "☁",
    }
}

pub fn current(current: &CurrentConditions) -> String {
    let snap = current.snapshot();
    let visibility = snap
        .visibility_m
        .map(|m| format!("{:.1} km", f64::from(m) / 1000.0))
        .unwrap_or_else(|| "n/a".to_string());

    let mut out = String::new();
    let _ = writeln!(out, "{}, {}", snap.city, snap.country);
    let _ = writeln!(out, "Coordinates: {:.2}°, {:.2}°", snap.lat, snap.lon);
    let _ = writeln!(out, "{} {}", glyph(&snap.condition_code), snap.description);
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "  {}  (feels like {})",
        degrees(snap.temperature_c),
        degrees(snap.feels_like_c)
    );
    let _ = writeln!(out, "  Wind        {} m/s", snap.wind_speed_mps);
    let _ = writeln!(out, "  Humidity    {}%", snap.humidity_pct);
    let _ = writeln!(out, "  Visibility  {visibility}");
    let _ = write!(out, "  Pressure    {:.0} hPa", snap.pressure_hpa);
    out
}

pub fn forecast(days: &[ForecastEntry]) -> String {
    if days.is_empty() {
        return "No forecast available".to_string();
    }

    let mut out = format!("{}-Day Forecast", days.len());
    for day in days {
        let _ = write!(
            out,
            "\n  {}  {}  {:>5}  {}",
            day.date.format("%a"),
            glyph(&day.condition_code),
            degrees(day.temperature_c),
            day.description
        );
    }
    out
}

pub fn favorites(favorites: &[Favorite]) -> String {
    if favorites.is_empty() {
        return "No favorites yet".to_string();
    }

    favorites
        .iter()
        .map(|f| {
            format!(
                "{}  {}, {}  ({:.2}°, {:.2}°)",
                f.id, f.city, f.country, f.lat, f.lon
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn history(entries: &[HistoryEntry]) -> String {
    if entries.is_empty() {
        return "No searches yet".to_string();
    }

    entries
        .iter()
        .map(|h| {
            let when = h.searched_at.format("%Y-%m-%d %H:%M");
            format!("{when}  {}, {}", h.city, h.country)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
