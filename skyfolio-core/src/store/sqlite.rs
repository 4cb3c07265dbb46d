//! SQLite-backed favorites and search history.
//!
//! One connection is shared by both stores behind a mutex. Uniqueness of
//! (city, user) is enforced by the schema so that the duplicate check and the
//! insert are a single statement.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params, types::Type};
use std::{path::Path, sync::Arc};
use tracing::{debug, info};
use uuid::Uuid;

use super::{FavoritesStore, HistoryStore, history_limit, validate_favorite};
use crate::{
    error::{Error, Result},
    model::{Favorite, HistoryEntry, NewFavorite, UserId},
};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS favorites (
        id TEXT PRIMARY KEY,
        city TEXT NOT NULL,
        country TEXT NOT NULL,
        lat REAL NOT NULL,
        lon REAL NOT NULL,
        user_id TEXT NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE (city, user_id)
    );

    CREATE INDEX IF NOT EXISTS idx_favorites_user_created
        ON favorites(user_id, created_at DESC);

    CREATE TABLE IF NOT EXISTS search_history (
        id TEXT PRIMARY KEY,
        city TEXT NOT NULL,
        country TEXT NOT NULL,
        user_id TEXT NOT NULL,
        searched_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_history_user_searched
        ON search_history(user_id, searched_at DESC);
"#;

/// Handle to the database file. Cheap to clone.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database at `path` and ensure the schema exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        info!("Opened database at {}", path.display());
        Self::with_connection(conn)
    }

    /// Database that lives only as long as the handle.
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn favorites(&self) -> SqliteFavorites {
        SqliteFavorites {
            conn: Arc::clone(&self.conn),
        }
    }

    pub fn history(&self) -> SqliteHistory {
        SqliteHistory {
            conn: Arc::clone(&self.conn),
        }
    }
}

/// Current time at the precision that survives a round trip through the database.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Timestamps are stored as fixed-width RFC 3339 text so that they sort chronologically.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub struct SqliteFavorites {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteFavorites {
    fn row_to_favorite(row: &Row, user: &UserId) -> rusqlite::Result<Favorite> {
        Ok(Favorite {
            id: row.get(0)?,
            city: row.get(1)?,
            country: row.get(2)?,
            lat: row.get(3)?,
            lon: row.get(4)?,
            user_id: user.clone(),
            created_at: parse_timestamp(row, 5)?,
        })
    }
}

impl FavoritesStore for SqliteFavorites {
    fn list(&self, user: &UserId) -> Result<Vec<Favorite>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, city, country, lat, lon, created_at
             FROM favorites
             WHERE user_id = ?1
             ORDER BY created_at DESC, rowid DESC",
        )?;

        let rows = stmt.query_map(params![user.as_str()], |row| {
            Self::row_to_favorite(row, user)
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn add(&self, user: &UserId, favorite: NewFavorite) -> Result<Favorite> {
        let (lat, lon) = validate_favorite(&favorite)?;

        let record = Favorite {
            id: Uuid::new_v4().to_string(),
            city: favorite.city.trim().to_string(),
            country: favorite.country.trim().to_string(),
            lat,
            lon,
            user_id: user.clone(),
            created_at: now(),
        };

        let inserted = self.conn.lock().execute(
            "INSERT INTO favorites (id, city, country, lat, lon, user_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.id,
                record.city,
                record.country,
                record.lat,
                record.lon,
                user.as_str(),
                timestamp(record.created_at),
            ],
        );

        match inserted {
            Ok(_) => {
                debug!(user = %user, city = %record.city, id = %record.id, "Added favorite");
                Ok(record)
            }
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation
                    && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                Err(Error::Duplicate {
                    city: record.city,
                    user_id: user.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn remove(&self, user: &UserId, id: &str) -> Result<Favorite> {
        let conn = self.conn.lock();
        let deleted = conn
            .query_row(
                "DELETE FROM favorites
                 WHERE id = ?1 AND user_id = ?2
                 RETURNING id, city, country, lat, lon, created_at",
                params![id, user.as_str()],
                |row| Self::row_to_favorite(row, user),
            )
            .optional()?;

        match deleted {
            Some(favorite) => {
                debug!(user = %user, id, "Removed favorite");
                Ok(favorite)
            }
            None => Err(Error::not_found(format!("Favorite {id} not found"))),
        }
    }
}

pub struct SqliteHistory {
    conn: Arc<Mutex<Connection>>,
}

impl HistoryStore for SqliteHistory {
    fn record(&self, user: &UserId, city: &str, country: &str) -> Result<HistoryEntry> {
        if city.trim().is_empty() || country.trim().is_empty() {
            return Err(Error::validation("History entries need a city and a country"));
        }

        let entry = HistoryEntry {
            id: Uuid::new_v4().to_string(),
            city: city.trim().to_string(),
            country: country.trim().to_string(),
            user_id: user.clone(),
            searched_at: now(),
        };

        self.conn.lock().execute(
            "INSERT INTO search_history (id, city, country, user_id, searched_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.id,
                entry.city,
                entry.country,
                user.as_str(),
                timestamp(entry.searched_at),
            ],
        )?;

        Ok(entry)
    }

    fn list(&self, user: &UserId, limit: Option<usize>) -> Result<Vec<HistoryEntry>> {
        let limit = i64::try_from(history_limit(limit)).unwrap_or(i64::MAX);

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, city, country, searched_at
             FROM search_history
             WHERE user_id = ?1
             ORDER BY searched_at DESC, rowid DESC
             LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![user.as_str(), limit], |row| {
            Ok(HistoryEntry {
                id: row.get(0)?,
                city: row.get(1)?,
                country: row.get(2)?,
                user_id: user.clone(),
                searched_at: parse_timestamp(row, 3)?,
            })
        })?;

        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn clear(&self, user: &UserId) -> Result<usize> {
        let removed = self
            .conn
            .lock()
            .execute("DELETE FROM search_history WHERE user_id = ?1", params![user.as_str()])?;

        info!(user = %user, removed, "Cleared search history");
        Ok(removed)
    }
}
