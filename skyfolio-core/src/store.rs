//! Persistence contracts for favorites and search history.
//!
//! Both stores are scoped by [`UserId`]: no operation reads or touches another
//! user's records. [`sqlite`] provides the implementation used by the CLI.

use crate::{
    error::{Error, Result},
    model::{Favorite, HistoryEntry, NewFavorite, UserId},
};

pub mod sqlite;

pub use sqlite::{Database, SqliteFavorites, SqliteHistory};

/// Number of history entries returned when the caller gives no limit.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Saved places of a user.
pub trait FavoritesStore: Send + Sync {
    /// All favorites of `user`, newest first.
    fn list(&self, user: &UserId) -> Result<Vec<Favorite>>;

    /// Save a new favorite.
    ///
    /// # Errors
    /// Returns `Error::Validation` if a field is missing, before touching storage.
    /// Returns `Error::Duplicate` if `user` already saved a favorite with this city.
    fn add(&self, user: &UserId, favorite: NewFavorite) -> Result<Favorite>;

    /// Delete a favorite by id and return the deleted record.
    ///
    /// # Errors
    /// Returns `Error::NotFound` if `user` has no favorite with this id.
    fn remove(&self, user: &UserId, id: &str) -> Result<Favorite>;
}

/// Append-only log of successful lookups.
pub trait HistoryStore: Send + Sync {
    fn record(&self, user: &UserId, city: &str, country: &str) -> Result<HistoryEntry>;

    /// The `limit` most recent entries, newest first. `None` or `0` means
    /// [`DEFAULT_HISTORY_LIMIT`].
    fn list(&self, user: &UserId, limit: Option<usize>) -> Result<Vec<HistoryEntry>>;

    /// Delete every entry of `user`, returning how many were removed.
    fn clear(&self, user: &UserId) -> Result<usize>;
}

/// Check a new favorite and return its coordinates.
///
/// # Errors
/// Returns `Error::Validation` naming the required fields if any is missing or blank.
pub fn validate_favorite(favorite: &NewFavorite) -> Result<(f64, f64)> {
    let missing = || Error::validation("City, country, latitude, and longitude are required");

    if favorite.city.trim().is_empty() || favorite.country.trim().is_empty() {
        return Err(missing());
    }

    match (favorite.lat, favorite.lon) {
        (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => Ok((lat, lon)),
        _ => Err(missing()),
    }
}

pub fn history_limit(limit: Option<usize>) -> usize {
    match limit {
        Some(n) if n > 0 => n,
        _ => DEFAULT_HISTORY_LIMIT,
    }
}
