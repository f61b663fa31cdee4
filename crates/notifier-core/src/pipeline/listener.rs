//! Stream listener.
//!
//! Runs decode, classify and dispatch for one raw message. Nothing here fails:
//! every problem ends as a logged, counted [`MessageOutcome`] so one bad
//! message cannot stop the ones behind it.

use super::classifier::{classify, Classification, SkipReason};
use super::decoder::{decode, DecodeError};
use super::dispatcher::NotificationDispatcher;
use super::metrics::PipelineMetrics;
use notifier_types::{DispatchOutcome, StreamMessage};
use std::sync::Arc;

/// What happened to one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
	/// Published on a topic this listener does not consume.
	Ignored,
	/// Empty or null body following a delete.
	Tombstone,
	/// Body could not be decoded.
	DecodeFailed(String),
	/// Decoded, but not notification-worthy.
	Skipped(SkipReason),
	/// An event was dispatched.
	Dispatched(DispatchOutcome),
}

/// Consumes raw change messages for one topic.
pub struct StreamListener {
	topic: String,
	dispatcher: Arc<NotificationDispatcher>,
	metrics: Arc<PipelineMetrics>,
}

impl StreamListener {
	pub fn new(
		topic: impl Into<String>,
		dispatcher: Arc<NotificationDispatcher>,
		metrics: Arc<PipelineMetrics>,
	) -> Self {
		Self {
			topic: topic.into(),
			dispatcher,
			metrics,
		}
	}

	pub fn topic(&self) -> &str {
		&self.topic
	}

	pub fn metrics(&self) -> &Arc<PipelineMetrics> {
		&self.metrics
	}

	/// Processes one message end to end.
	pub async fn process_message(&self, message: &StreamMessage) -> MessageOutcome {
		self.metrics.record_received();

		if message.topic != self.topic {
			tracing::debug!(topic = %message.topic, "Ignoring message from foreign topic");
			self.metrics.record_foreign_topic();
			return MessageOutcome::Ignored;
		}

		let record = match decode(&message.payload) {
			Ok(record) => record,
			Err(DecodeError::Tombstone) => {
				tracing::debug!(key = ?message.key, "Skipping tombstone");
				self.metrics.record_tombstone();
				return MessageOutcome::Tombstone;
			},
			Err(e) => {
				tracing::warn!(key = ?message.key, error = %e, "Failed to decode change record");
				self.metrics.record_decode_failure();
				return MessageOutcome::DecodeFailed(e.to_string());
			},
		};

		tracing::debug!(op = %record.op, ts_ms = record.ts_ms, "Received change record");

		let event = match classify(record) {
			Classification::Event(event) => event,
			Classification::Skip(reason) => {
				if reason.is_warning() {
					tracing::warn!(key = ?message.key, "Skipping record: {}", reason);
				} else {
					tracing::debug!(key = ?message.key, "Skipping record: {}", reason);
				}
				self.metrics.record_skip();
				return MessageOutcome::Skipped(reason);
			},
		};
		self.metrics.record_event();

		let outcome = self.dispatcher.dispatch(&event).await;

		let failed = outcome.failures().count();
		for failure in outcome.failures() {
			tracing::warn!(
				order_id = outcome.order_id,
				channel = %failure.channel,
				status = ?failure.status,
				"Notification action did not complete"
			);
		}
		self.metrics
			.record_actions((outcome.actions.len() - failed) as u64, failed as u64);

		MessageOutcome::Dispatched(outcome)
	}
}
