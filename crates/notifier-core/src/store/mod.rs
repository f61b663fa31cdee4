//! Order persistence.

pub mod order;

pub use order::{OrderStore, StoreError};
