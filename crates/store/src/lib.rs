//! Pomelo offline data store.
//!
//! Durable, offline-capable storage for the storefront's catalog, cart, and
//! pending-order data, backed by an embedded `SQLite` database. The catalog
//! and cart collections hold opaque JSON documents that are bulk-replaced
//! wholesale on every sync from the backend; pending orders are appended
//! while offline and flipped to synchronized once connectivity resumes.
//!
//! The store handle is constructed explicitly by the application's startup
//! sequence and passed by handle to every consumer:
//!
//! ```rust,ignore
//! let store = OfflineStore::open("pomelo-offline.db").await?;
//! store.replace_all(Collection::Catalog, &items).await?;
//! let laptops = store
//!     .get_by_index(Collection::Catalog, Index::Category, "laptops")
//!     .await?;
//! ```
//!
//! This crate also hosts the connectivity relay ([`ConnectivityMonitor`]),
//! a plain observable over the online/offline flag.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod connectivity;
pub mod error;
pub mod orders;
pub mod store;

pub use connectivity::{ConnectivityCallbacks, ConnectivityMonitor, Subscription};
pub use error::StoreError;
pub use orders::PendingOrder;
pub use store::{Collection, Index, OfflineStore};
