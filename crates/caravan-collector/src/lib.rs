//! Inventory collection: credential validation and one-shot inventory
//! acquisition from a vCenter endpoint, driven through the scheduler.
//!
//! The engine is deliberately not a polling collector: once a full inventory
//! has been captured the state is terminal until the process restarts.

pub mod engine;
pub mod error;
pub mod source;
pub mod vsphere;


pub use engine::CollectorEngine;
pub use error::{CollectorError, SourceError};
pub use source::{InventorySource, VCenterCredentials};
pub use vsphere::VSphereSource;
