//! CDC-to-notification pipeline.
//!
//! A raw stream message is decoded into a change record, classified into at
//! most one business event, and the event is dispatched to its notification
//! actions. The listener strings the stages together.

pub mod classifier;
pub mod decoder;
pub mod dispatcher;
pub mod listener;
pub mod metrics;

pub use classifier::{classify, Classification, SkipReason};
pub use decoder::{decode, DecodeError};
pub use dispatcher::NotificationDispatcher;
pub use listener::{MessageOutcome, StreamListener};
pub use metrics::{PipelineMetrics, PipelineStats};
