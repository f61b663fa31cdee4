//! Common types module for the order notifier system.
//!
//! This module defines the data model shared by every notifier component:
//! order snapshots as they travel through the change stream, decoded change
//! records, classified business events and the notifications derived from them.

/// API types for HTTP endpoints and request/response structures.
pub mod api;
/// Decoded change-data-capture envelopes.
pub mod change;
/// Outbound notification types and dispatch outcomes.
pub mod delivery;
/// Business events derived from change records.
pub mod events;
/// Order status and order snapshot types.
pub mod order;
/// Registry trait for self-registering implementations.
pub mod registry;
/// Storage types for managing persistent data.
pub mod storage;
/// Raw stream messages and the in-process change feed.
pub mod stream;
/// Utility functions shared across crates.
pub mod utils;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

// Re-export all types for convenient access
pub use api::*;
pub use change::*;
pub use delivery::*;
pub use events::*;
pub use order::*;
pub use registry::*;
pub use storage::*;
pub use stream::*;
pub use utils::current_timestamp_ms;
pub use validation::*;
