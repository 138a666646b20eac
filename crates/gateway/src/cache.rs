//! Durable response cache partitioned into named generations.
//!
//! A generation is a versioned bucket of captured HTTP responses keyed by
//! URL. Entries carry no per-entry expiry: a cached asset is trusted until
//! its whole generation is rotated out by
//! [`AssetCache::purge_stale`]. Storage is an embedded `SQLite` database,
//! the same engine the offline data store uses.

use std::path::Path;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::Response;
use chrono::Utc;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use thiserror::Error;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS cached_responses (
    generation TEXT NOT NULL,
    url        TEXT NOT NULL,
    status     INTEGER NOT NULL,
    headers    TEXT NOT NULL,
    body       BLOB NOT NULL,
    stored_at  TEXT NOT NULL,
    PRIMARY KEY (generation, url)
);
CREATE INDEX IF NOT EXISTS idx_cached_responses_generation ON cached_responses (generation);
";

/// Headers that describe the transport, not the payload; never captured.
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "content-length",
];

/// Errors reported by cache storage operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The underlying storage engine reported an error.
    #[error("cache storage engine error: {0}")]
    Engine(#[from] sqlx::Error),

    /// A stored header map failed to parse back.
    #[error("cached entry is corrupted: {0}")]
    Corrupted(#[from] serde_json::Error),
}

/// A captured HTTP response: status, payload headers, and body bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    /// HTTP status code.
    pub status: u16,
    /// Payload headers (hop-by-hop headers stripped at capture time).
    pub headers: Vec<(String, String)>,
    /// Response body.
    pub body: Vec<u8>,
}

impl CachedResponse {
    /// Whether the captured status is a success (2xx).
    #[must_use]
    pub const fn ok(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Drop transport-level headers that must not be replayed.
    #[must_use]
    pub fn without_hop_by_hop(mut self) -> Self {
        self.headers.retain(|(name, _)| {
            !HOP_BY_HOP_HEADERS
                .iter()
                .any(|hop| name.eq_ignore_ascii_case(hop))
        });
        self
    }

    /// Replay the captured response to a client.
    ///
    /// Headers that fail to parse are skipped rather than failing the
    /// response.
    #[must_use]
    pub fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK);

        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = status;
        for (name, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::try_from(name.as_str()),
                HeaderValue::from_str(value),
            ) {
                response.headers_mut().append(name, value);
            }
        }
        response
    }
}

/// Handle to the response cache. Cheaply cloneable.
#[derive(Debug, Clone)]
pub struct AssetCache {
    pool: SqlitePool,
}

impl AssetCache {
    /// Open (or create) the cache database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Engine`] if the database cannot be opened.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    /// Open a private in-memory cache, used by tests.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Engine`] if the schema cannot be created.
    pub async fn in_memory() -> Result<Self, CacheError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self, CacheError> {
        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }

    /// Store `response` under `(generation, url)`, replacing any previous
    /// entry.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] on storage or encoding failure.
    pub async fn put(
        &self,
        generation: &str,
        url: &str,
        response: &CachedResponse,
    ) -> Result<(), CacheError> {
        let headers = serde_json::to_string(&response.headers)?;

        sqlx::query(
            "INSERT OR REPLACE INTO cached_responses \
             (generation, url, status, headers, body, stored_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(generation)
        .bind(url)
        .bind(i64::from(response.status))
        .bind(headers)
        .bind(&response.body)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Look up the entry stored under `(generation, url)`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] on storage or decoding failure.
    pub async fn get(
        &self,
        generation: &str,
        url: &str,
    ) -> Result<Option<CachedResponse>, CacheError> {
        let row = sqlx::query(
            "SELECT status, headers, body FROM cached_responses \
             WHERE generation = ?1 AND url = ?2",
        )
        .bind(generation)
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else { return Ok(None) };

        let status: i64 = row.try_get("status")?;
        let headers: String = row.try_get("headers")?;
        let body: Vec<u8> = row.try_get("body")?;

        Ok(Some(CachedResponse {
            status: u16::try_from(status).unwrap_or(500),
            headers: serde_json::from_str(&headers)?,
            body,
        }))
    }

    /// Names of every generation currently holding entries.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Engine`] on storage failure.
    pub async fn generations(&self) -> Result<Vec<String>, CacheError> {
        let rows =
            sqlx::query("SELECT DISTINCT generation FROM cached_responses ORDER BY generation")
                .fetch_all(&self.pool)
                .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("generation").map_err(CacheError::from))
            .collect()
    }

    /// Delete every entry of `generation`. Returns the number of entries
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Engine`] on storage failure.
    pub async fn delete_generation(&self, generation: &str) -> Result<u64, CacheError> {
        let result = sqlx::query("DELETE FROM cached_responses WHERE generation = ?1")
            .bind(generation)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Delete every generation whose name differs from `active`.
    ///
    /// Returns the names of the generations that were removed.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Engine`] on storage failure.
    pub async fn purge_stale(&self, active: &str) -> Result<Vec<String>, CacheError> {
        let mut removed = Vec::new();
        for name in self.generations().await? {
            if name != active {
                self.delete_generation(&name).await?;
                removed.push(name);
            }
        }
        Ok(removed)
    }
}
