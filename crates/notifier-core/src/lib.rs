//! Core engine for the order notifier.
//!
//! This crate holds the order lifecycle (state machine, order store and order
//! service) and the change-data-capture pipeline that turns captured order
//! changes into customer and audit notifications. The builder composes both
//! halves from pluggable storage, source and delivery implementations.

pub mod builder;
pub mod engine;
pub mod orders;
pub mod pipeline;
pub mod state;
pub mod store;

pub use builder::{BuilderError, NotifierBuilder, NotifierFactories};
pub use engine::{EngineError, NotifierEngine};
pub use orders::{OrderError, OrderService};
pub use pipeline::{
	classify, decode, Classification, DecodeError, MessageOutcome, NotificationDispatcher,
	PipelineMetrics, PipelineStats, SkipReason, StreamListener,
};
pub use state::{transition, OrderStateMachine, TransitionError};
pub use store::{OrderStore, StoreError};
