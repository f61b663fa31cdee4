//! State management for orders.
//!
//! The transition rules are a pure function; the state machine applies them to
//! stored orders.

pub mod order;

pub use order::{transition, OrderStateMachine, TransitionError};
