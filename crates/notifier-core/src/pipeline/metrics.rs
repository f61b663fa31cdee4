//! Pipeline counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by the stream listener.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
	received: AtomicU64,
	ignored_foreign_topic: AtomicU64,
	decode_failures: AtomicU64,
	tombstones: AtomicU64,
	skipped: AtomicU64,
	events: AtomicU64,
	actions_delivered: AtomicU64,
	actions_failed: AtomicU64,
}

/// Point-in-time copy of [`PipelineMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
	pub received: u64,
	pub ignored_foreign_topic: u64,
	pub decode_failures: u64,
	pub tombstones: u64,
	pub skipped: u64,
	pub events: u64,
	pub actions_delivered: u64,
	pub actions_failed: u64,
}

impl PipelineMetrics {
	pub fn new() -> Self {
		Self::default()
	}

	pub(crate) fn record_received(&self) {
		self.received.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_foreign_topic(&self) {
		self.ignored_foreign_topic.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_decode_failure(&self) {
		self.decode_failures.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_tombstone(&self) {
		self.tombstones.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_skip(&self) {
		self.skipped.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_event(&self) {
		self.events.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_actions(&self, delivered: u64, failed: u64) {
		self.actions_delivered.fetch_add(delivered, Ordering::Relaxed);
		self.actions_failed.fetch_add(failed, Ordering::Relaxed);
	}

	pub fn snapshot(&self) -> PipelineStats {
		PipelineStats {
			received: self.received.load(Ordering::Relaxed),
			ignored_foreign_topic: self.ignored_foreign_topic.load(Ordering::Relaxed),
			decode_failures: self.decode_failures.load(Ordering::Relaxed),
			tombstones: self.tombstones.load(Ordering::Relaxed),
			skipped: self.skipped.load(Ordering::Relaxed),
			events: self.events.load(Ordering::Relaxed),
			actions_delivered: self.actions_delivered.load(Ordering::Relaxed),
			actions_failed: self.actions_failed.load(Ordering::Relaxed),
		}
	}
}
