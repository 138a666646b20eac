//! Offline store handle and document-collection operations.
//!
//! # Database
//!
//! One embedded `SQLite` database holds three collections:
//!
//! - `catalog_items` - bulk-replaced product documents (indexes: category, name)
//! - `cart_items` - bulk-replaced cart line documents
//! - `pending_orders` - orders placed while offline (see [`crate::orders`])
//!
//! Catalog and cart items are opaque JSON documents keyed by their `"id"`
//! attribute; the indexed fields are extracted into their own columns at
//! insert time.

use std::path::Path;
use std::time::Duration;

use serde_json::Value;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};

use crate::error::StoreError;

/// Bump when the collection layout changes; `ensure_schema` re-runs on a
/// version mismatch.
const SCHEMA_VERSION: i32 = 1;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS catalog_items (
    id       TEXT PRIMARY KEY,
    category TEXT,
    name     TEXT,
    document TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_catalog_items_category ON catalog_items (category);
CREATE INDEX IF NOT EXISTS idx_catalog_items_name ON catalog_items (name);

CREATE TABLE IF NOT EXISTS cart_items (
    id       TEXT PRIMARY KEY,
    document TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS pending_orders (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    synchronized    INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT NOT NULL,
    synchronized_at TEXT,
    payload         TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_pending_orders_synchronized ON pending_orders (synchronized);
CREATE INDEX IF NOT EXISTS idx_pending_orders_created_at ON pending_orders (created_at);
";

/// The string-keyed document collections.
///
/// Pending orders are not listed here: they carry an auto-assigned integer
/// key and a fixed shape, and are accessed through the dedicated operations
/// in [`crate::orders`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    /// Product catalog, bulk-replaced on every backend sync.
    Catalog,
    /// Cart lines, bulk-replaced on every cart change.
    Cart,
}

impl Collection {
    /// External name of the collection.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Catalog => "catalog",
            Self::Cart => "cart",
        }
    }

    const fn table(self) -> &'static str {
        match self {
            Self::Catalog => "catalog_items",
            Self::Cart => "cart_items",
        }
    }
}

/// Secondary lookup indexes over document collections.
///
/// Only the catalog carries these; asking for an index the collection does
/// not have yields [`StoreError::UnknownIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Index {
    /// Product category (non-unique).
    Category,
    /// Product name (non-unique).
    Name,
}

impl Index {
    /// External name of the index.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Name => "name",
        }
    }
}

/// Handle to the offline store.
///
/// Cheaply cloneable (the connection pool is shared); construct one in the
/// application's startup sequence and pass it to every consumer. Dropping
/// every handle closes the pool; there is no explicit close.
#[derive(Debug, Clone)]
pub struct OfflineStore {
    pool: SqlitePool,
}

impl OfflineStore {
    /// Open (or create on first run) the offline database at `path` and set
    /// up the collections and their secondary indexes.
    ///
    /// Idempotent: re-opening an existing database leaves its contents
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Engine`] if the database cannot be opened or
    /// the schema cannot be created.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
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

    /// Open a private in-memory store.
    ///
    /// Used by tests for isolation; the data does not survive the handle.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Engine`] if the schema cannot be created.
    pub async fn in_memory() -> Result<Self, StoreError> {
        // A single connection keeps every operation on the same in-memory
        // database; :memory: is per-connection otherwise.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Create the collections and indexes if they do not exist yet.
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        let version: i32 = sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(&self.pool)
            .await?;

        if version >= SCHEMA_VERSION {
            return Ok(());
        }

        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        sqlx::raw_sql("PRAGMA user_version = 1")
            .execute(&self.pool)
            .await?;

        tracing::info!(version = SCHEMA_VERSION, "offline store schema created");
        Ok(())
    }

    pub(crate) const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Atomically clear `collection` and insert all of `items`.
    ///
    /// The whole replacement is a single transaction: readers never observe
    /// a mix of old and new items, and any failure (including an item with
    /// no `"id"`) rolls the collection back to its previous contents.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MissingKey`] if any item lacks a usable `"id"`
    /// attribute, or [`StoreError::Engine`] on storage failure.
    pub async fn replace_all(
        &self,
        collection: Collection,
        items: &[Value],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        match collection {
            Collection::Catalog => {
                sqlx::query("DELETE FROM catalog_items")
                    .execute(&mut *tx)
                    .await?;
                for item in items {
                    let id = document_key(item).ok_or(StoreError::MissingKey)?;
                    sqlx::query(
                        "INSERT OR REPLACE INTO catalog_items (id, category, name, document) \
                         VALUES (?1, ?2, ?3, ?4)",
                    )
                    .bind(&id)
                    .bind(item.get("category").and_then(Value::as_str))
                    .bind(item.get("name").and_then(Value::as_str))
                    .bind(item.to_string())
                    .execute(&mut *tx)
                    .await?;
                }
            }
            Collection::Cart => {
                sqlx::query("DELETE FROM cart_items").execute(&mut *tx).await?;
                for item in items {
                    let id = document_key(item).ok_or(StoreError::MissingKey)?;
                    sqlx::query(
                        "INSERT OR REPLACE INTO cart_items (id, document) VALUES (?1, ?2)",
                    )
                    .bind(&id)
                    .bind(item.to_string())
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }

        tx.commit().await?;

        tracing::debug!(
            collection = collection.name(),
            count = items.len(),
            "collection replaced"
        );
        Ok(())
    }

    /// All items stored in `collection`, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Engine`] on storage failure.
    pub async fn get_all(&self, collection: Collection) -> Result<Vec<Value>, StoreError> {
        let sql = match collection {
            Collection::Catalog => "SELECT document FROM catalog_items ORDER BY rowid",
            Collection::Cart => "SELECT document FROM cart_items ORDER BY rowid",
        };
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        parse_documents(&rows)
    }

    /// Items whose indexed field equals `value`.
    ///
    /// Returns the empty vec when nothing matches.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownIndex`] when `collection` does not carry
    /// `index`, or [`StoreError::Engine`] on storage failure.
    pub async fn get_by_index(
        &self,
        collection: Collection,
        index: Index,
        value: &str,
    ) -> Result<Vec<Value>, StoreError> {
        if collection != Collection::Catalog {
            return Err(StoreError::UnknownIndex {
                collection: collection.name(),
                index: index.name(),
            });
        }

        let sql = match index {
            Index::Category => {
                "SELECT document FROM catalog_items WHERE category = ?1 ORDER BY rowid"
            }
            Index::Name => "SELECT document FROM catalog_items WHERE name = ?1 ORDER BY rowid",
        };
        let rows = sqlx::query(sql).bind(value).fetch_all(&self.pool).await?;

        tracing::debug!(
            collection = collection.name(),
            index = index.name(),
            value,
            count = rows.len(),
            "index lookup"
        );
        parse_documents(&rows)
    }

    /// Single item by identifier, or `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Engine`] on storage failure.
    pub async fn get_by_id(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<Value>, StoreError> {
        let sql = match collection {
            Collection::Catalog => "SELECT document FROM catalog_items WHERE id = ?1",
            Collection::Cart => "SELECT document FROM cart_items WHERE id = ?1",
        };
        let row = sqlx::query(sql).bind(id).fetch_optional(&self.pool).await?;

        match row {
            Some(row) => {
                let document: String = row.try_get("document")?;
                Ok(Some(serde_json::from_str(&document)?))
            }
            None => Ok(None),
        }
    }
}

/// Canonical string key of a document: its `"id"` attribute, with numeric
/// identifiers rendered as text.
fn document_key(item: &Value) -> Option<String> {
    match item.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_documents(rows: &[SqliteRow]) -> Result<Vec<Value>, StoreError> {
    let mut documents = Vec::with_capacity(rows.len());
    for row in rows {
        let document: String = row.try_get("document")?;
        documents.push(serde_json::from_str(&document)?);
    }
    Ok(documents)
}
