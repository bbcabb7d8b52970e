//! Shared types for the Kuitti print pipeline
//!
//! The canonical data model used by `kuitti-printer` and `kuitti-edge`:
//! printer devices, orders, receipts, print jobs, persisted print settings
//! and the CloudPRNT submission wire types.

pub mod cloudprnt;
pub mod models;

// Re-exports
pub use models::*;
pub use serde::{Deserialize, Serialize};
