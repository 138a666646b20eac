//! Pending orders placed while offline.
//!
//! Orders queued here are flagged `synchronized = false` at creation and
//! flipped exactly once when connectivity resumes. Nothing in this crate
//! pushes them to a backend; the application layer reads the unsynchronized
//! set, submits each order, and calls [`OfflineStore::mark_synchronized`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::error::StoreError;
use crate::store::OfflineStore;

/// An order captured while the storefront was offline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOrder {
    /// Auto-assigned sequential identifier.
    pub id: i64,
    /// Whether the order has been pushed to the backend.
    pub synchronized: bool,
    /// When the order was queued.
    pub created_at: DateTime<Utc>,
    /// When the order was synchronized; absent until then.
    pub synchronized_at: Option<DateTime<Utc>>,
    /// The order contents as handed over by the application.
    pub payload: Value,
}

impl OfflineStore {
    /// Queue an order for later synchronization.
    ///
    /// Assigns the next sequential identifier, stamps `synchronized = false`
    /// and the creation time, and returns the assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Engine`] on storage failure.
    pub async fn append_pending_order(&self, payload: &Value) -> Result<i64, StoreError> {
        let result = sqlx::query(
            "INSERT INTO pending_orders (synchronized, created_at, payload) VALUES (0, ?1, ?2)",
        )
        .bind(Utc::now())
        .bind(payload.to_string())
        .execute(self.pool())
        .await?;

        let id = result.last_insert_rowid();
        tracing::info!(order_id = id, "order queued for later synchronization");
        Ok(id)
    }

    /// Flip an order to synchronized and stamp the synchronization time.
    ///
    /// One atomic statement; the flag is only ever set once (already
    /// synchronized orders are left untouched). A no-op, not an error, when
    /// no order with `id` exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Engine`] on storage failure.
    pub async fn mark_synchronized(&self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE pending_orders SET synchronized = 1, synchronized_at = ?1 \
             WHERE id = ?2 AND synchronized = 0",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            tracing::debug!(order_id = id, "no unsynchronized order with this id");
        } else {
            tracing::info!(order_id = id, "order marked as synchronized");
        }
        Ok(())
    }

    /// Orders filtered by the synchronized flag, oldest first.
    ///
    /// `orders_by_status(false)` is the set an external flusher should push
    /// once connectivity resumes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Engine`] on storage failure.
    pub async fn orders_by_status(
        &self,
        synchronized: bool,
    ) -> Result<Vec<PendingOrder>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, synchronized, created_at, synchronized_at, payload \
             FROM pending_orders WHERE synchronized = ?1 ORDER BY id",
        )
        .bind(synchronized)
        .fetch_all(self.pool())
        .await?;

        tracing::debug!(synchronized, count = rows.len(), "orders by status");
        rows.iter().map(order_from_row).collect()
    }

    /// Every queued order, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Engine`] on storage failure.
    pub async fn all_orders(&self) -> Result<Vec<PendingOrder>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, synchronized, created_at, synchronized_at, payload \
             FROM pending_orders ORDER BY id",
        )
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(order_from_row).collect()
    }

    /// Single order by identifier, or `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Engine`] on storage failure.
    pub async fn get_order(&self, id: i64) -> Result<Option<PendingOrder>, StoreError> {
        let row = sqlx::query(
            "SELECT id, synchronized, created_at, synchronized_at, payload \
             FROM pending_orders WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        row.as_ref().map(order_from_row).transpose()
    }
}

fn order_from_row(row: &SqliteRow) -> Result<PendingOrder, StoreError> {
    let payload: String = row.try_get("payload")?;
    Ok(PendingOrder {
        id: row.try_get("id")?,
        synchronized: row.try_get("synchronized")?,
        created_at: row.try_get("created_at")?,
        synchronized_at: row.try_get("synchronized_at")?,
        payload: serde_json::from_str(&payload)?,
    })
}
