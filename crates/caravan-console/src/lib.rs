//! Outbound RPC client for the remote console.
//!
//! Two calls, both `PUT`: agent status and source inventory. HTTP responses
//! are mapped to typed errors so the dispatcher can tell authoritative
//! failures (source gone, token rejected) from transient ones.

pub mod client;
pub mod error;
pub mod types;


pub use client::ConsoleClient;
pub use error::ConsoleError;
pub use types::{AgentStatusUpdate, SourceStatusUpdate};
