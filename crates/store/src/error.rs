//! Error type for offline store operations.

use thiserror::Error;

/// Errors reported by [`crate::OfflineStore`] operations.
///
/// Every operation reports failure through its `Result`; nothing in this
/// crate retries. Callers are responsible for surfacing or logging.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying storage engine reported an error.
    #[error("storage engine error: {0}")]
    Engine(#[from] sqlx::Error),

    /// An item passed to `replace_all` has no usable `"id"` key.
    #[error("item is missing the required \"id\" key")]
    MissingKey,

    /// The requested secondary index does not exist on the collection.
    #[error("collection \"{collection}\" has no index \"{index}\"")]
    UnknownIndex {
        collection: &'static str,
        index: &'static str,
    },

    /// A stored document failed to parse back into JSON.
    #[error("stored document is corrupted: {0}")]
    Corrupted(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_index_display() {
        let err = StoreError::UnknownIndex {
            collection: "cart",
            index: "category",
        };
        assert_eq!(err.to_string(), "collection \"cart\" has no index \"category\"");
    }

    #[test]
    fn test_missing_key_display() {
        assert_eq!(
            StoreError::MissingKey.to_string(),
            "item is missing the required \"id\" key"
        );
    }
}
