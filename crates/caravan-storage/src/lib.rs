//! Embedded state store for the agent.
//!
//! Two single-row entities live in one SQLite database under the configured
//! data directory: the persisted agent mode and the collected inventory
//! snapshot. Schema versions are tracked by the `migration` crate and applied
//! on open.

pub mod entities;
pub mod error;
pub mod store;


pub use error::StorageError;
pub use store::{Configuration, InventoryRecord, Store};
