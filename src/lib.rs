//! Inventory state synchronization and view-model derivation.
//!
//! A [`PersistenceBackend`] pushes full snapshots of the keyed item store; the
//! [`InventoryViewModel`] reconciles them into an ordered list and derives the
//! filtered table, dashboard counters and category options from it.

pub mod backend;
pub mod error;
pub mod export;
pub mod query;
pub mod record;
pub mod settings;
pub mod store;
pub mod sync;
pub mod view_model;

pub use backend::{PersistenceBackend, Subscribers, Subscription};
pub use error::{InventoryError, InventoryResult};
pub use query::{CategorySummary, Counters, InventoryQuery};
pub use record::{InventoryRecord, RawFields, RawSnapshot, RecordFields, RecordStatus};
pub use settings::InventorySettings;
pub use store::LocalStore;
pub use sync::{InventorySync, InventoryView};
pub use view_model::{EntryPoint, InventoryViewModel};
