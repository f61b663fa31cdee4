//! In-process change capture.
//!
//! Subscribes to the [`ChangeFeed`] the order store publishes to and forwards
//! every message unchanged. This is the source used when the store and the
//! listener share a process.

use crate::{
	ChangeSourceInterface, SourceContext, SourceError, SourceFactory, SourceRegistry,
};
use async_trait::async_trait;
use notifier_types::{
	ChangeFeed, ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, StreamMessage,
	ValidationError,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;

/// Change source reading from the in-process feed.
pub struct CaptureSource {
	feed: ChangeFeed,
	snapshot_on_start: bool,
	is_streaming: Arc<AtomicBool>,
	stop_signal: Arc<Mutex<Option<mpsc::Sender<()>>>>,
	forwarder: Mutex<Option<JoinHandle<()>>>,
}

impl CaptureSource {
	pub fn new(feed: ChangeFeed, snapshot_on_start: bool) -> Self {
		Self {
			feed,
			snapshot_on_start,
			is_streaming: Arc::new(AtomicBool::new(false)),
			stop_signal: Arc::new(Mutex::new(None)),
			forwarder: Mutex::new(None),
		}
	}

	async fn forward_loop(
		mut feed_rx: broadcast::Receiver<StreamMessage>,
		sender: mpsc::UnboundedSender<StreamMessage>,
		mut stop_rx: mpsc::Receiver<()>,
	) {
		loop {
			tokio::select! {
				biased;

				received = feed_rx.recv() => match received {
					Ok(message) => {
						if sender.send(message).is_err() {
							tracing::debug!("Listener channel closed, stopping capture");
							return;
						}
					},
					Err(broadcast::error::RecvError::Lagged(skipped)) => {
						tracing::warn!(skipped, "Capture fell behind the change feed, messages dropped");
					},
					Err(broadcast::error::RecvError::Closed) => return,
				},
				_ = stop_rx.recv() => break,
			}
		}

		// Hand over whatever was published before the stop
		loop {
			match feed_rx.try_recv() {
				Ok(message) => {
					if sender.send(message).is_err() {
						return;
					}
				},
				Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
					tracing::warn!(skipped, "Capture fell behind the change feed, messages dropped");
				},
				Err(_) => return,
			}
		}
	}
}

pub struct CaptureSourceSchema;

impl ConfigSchema for CaptureSourceSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![Field::new("snapshot_on_start", FieldType::Boolean)],
		);
		schema.validate(config)
	}
}

#[async_trait]
impl ChangeSourceInterface for CaptureSource {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(CaptureSourceSchema)
	}

	async fn start_streaming(
		&self,
		sender: mpsc::UnboundedSender<StreamMessage>,
	) -> Result<(), SourceError> {
		if self.is_streaming.swap(true, Ordering::SeqCst) {
			return Err(SourceError::AlreadyStreaming);
		}

		// Subscribe before returning so nothing published after start is missed
		let feed_rx = self.feed.subscribe();
		let (stop_tx, stop_rx) = mpsc::channel(1);
		*self.stop_signal.lock().await = Some(stop_tx);

		let handle = tokio::spawn(Self::forward_loop(feed_rx, sender, stop_rx));
		*self.forwarder.lock().await = Some(handle);
		tracing::info!(topic = %self.feed.topic(), "Capture source streaming");
		Ok(())
	}

	async fn stop_streaming(&self) -> Result<(), SourceError> {
		if !self.is_streaming.load(Ordering::SeqCst) {
			return Ok(());
		}

		if let Some(stop_tx) = self.stop_signal.lock().await.take() {
			let _ = stop_tx.send(()).await;
		}

		// Returns once everything already published has been forwarded
		if let Some(handle) = self.forwarder.lock().await.take() {
			if let Err(e) = handle.await {
				tracing::warn!(error = %e, "Capture forwarder failed");
			}
		}

		self.is_streaming.store(false, Ordering::SeqCst);
		Ok(())
	}

	fn wants_initial_snapshot(&self) -> bool {
		self.snapshot_on_start
	}
}

/// Factory function to create a capture source.
///
/// Configuration parameters:
/// - `snapshot_on_start`: replay current rows as snapshot records once streaming (default: false)
pub fn create_source(
	config: &toml::Value,
	context: &SourceContext,
) -> Result<Box<dyn ChangeSourceInterface>, SourceError> {
	CaptureSourceSchema
		.validate(config)
		.map_err(|e| SourceError::Configuration(format!("Invalid configuration: {}", e)))?;

	let snapshot_on_start = config
		.get("snapshot_on_start")
		.and_then(|v| v.as_bool())
		.unwrap_or(false);

	Ok(Box::new(CaptureSource::new(
		context.feed.clone(),
		snapshot_on_start,
	)))
}

/// Registry for the capture source.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "capture";
	type Factory = SourceFactory;

	fn factory() -> Self::Factory {
		create_source
	}
}

impl SourceRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use std::time::Duration;

	#[tokio::test]
	async fn test_double_start_rejected() {
		let source = CaptureSource::new(ChangeFeed::new("orders", 4), false);
		let (tx, _rx) = mpsc::unbounded_channel();
		source.start_streaming(tx.clone()).await.unwrap();
		assert!(matches!(
			source.start_streaming(tx).await,
			Err(SourceError::AlreadyStreaming)
		));
		source.stop_streaming().await.unwrap();
	}

	#[tokio::test]
	async fn test_stopped_source_forwards_nothing() {
		let feed = ChangeFeed::new("orders", 4);
		let source = CaptureSource::new(feed.clone(), false);
		let (tx, mut rx) = mpsc::unbounded_channel();
		source.start_streaming(tx).await.unwrap();
		source.stop_streaming().await.unwrap();

		// Give the forwarding task a chance to observe the stop signal
		tokio::time::sleep(Duration::from_millis(20)).await;
		feed.publish(None, b"late".to_vec());

		let next = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
		assert!(!matches!(next, Ok(Some(_))));
	}

	#[tokio::test]
	async fn test_stop_forwards_changes_published_before_it() {
		let feed = ChangeFeed::new("orders", 16);
		let source = CaptureSource::new(feed.clone(), false);
		let (tx, mut rx) = mpsc::unbounded_channel();
		source.start_streaming(tx).await.unwrap();

		for id in 1..=5 {
			feed.publish(Some(id.to_string()), b"{}".to_vec());
		}
		source.stop_streaming().await.unwrap();

		let keys: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
			.filter_map(|m| m.key)
			.collect();
		assert_eq!(keys, vec!["1", "2", "3", "4", "5"]);
	}

	#[test]
	fn test_factory_reads_snapshot_flag() {
		let context = SourceContext {
			feed: ChangeFeed::new("orders", 4),
			topic: "orders".into(),
		};
		let config: toml::Value = toml::from_str("snapshot_on_start = true").unwrap();
		let source = create_source(&config, &context).unwrap();
		assert!(source.wants_initial_snapshot());

		let config: toml::Value = toml::from_str("snapshot_on_start = \"yes\"").unwrap();
		assert!(create_source(&config, &context).is_err());
	}
}
