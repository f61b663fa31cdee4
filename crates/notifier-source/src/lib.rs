//! Change source module for the order notifier.
//!
//! A change source delivers raw stream messages to the listener. Sources only
//! move bytes: decoding, classification and dispatch happen downstream, so a
//! source never inspects the payload it forwards.

use async_trait::async_trait;
use notifier_types::{ChangeFeed, ConfigSchema, ImplementationRegistry, StreamMessage};
use thiserror::Error;
use tokio::sync::mpsc;

/// Re-export implementations
pub mod implementations {
	pub mod capture;
	pub mod http;
}

/// Errors that can occur while running a change source.
#[derive(Debug, Error)]
pub enum SourceError {
	/// The source could not reach or bind its transport.
	#[error("Connection error: {0}")]
	Connection(String),
	/// `start_streaming` was called on a source that is already running.
	#[error("Already streaming")]
	AlreadyStreaming,
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Interface implemented by every change source.
#[async_trait]
pub trait ChangeSourceInterface: Send + Sync {
	/// Returns the configuration schema for this source.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Starts forwarding messages into `sender` until stopped.
	async fn start_streaming(
		&self,
		sender: mpsc::UnboundedSender<StreamMessage>,
	) -> Result<(), SourceError>;

	/// Stops forwarding and releases the transport.
	async fn stop_streaming(&self) -> Result<(), SourceError>;

	/// Whether the store should replay its current rows once this source is live.
	fn wants_initial_snapshot(&self) -> bool {
		false
	}
}

/// Everything a source factory may need besides its own configuration.
#[derive(Debug, Clone)]
pub struct SourceContext {
	/// In-process feed the order store publishes its changes to.
	pub feed: ChangeFeed,
	/// Topic the listener consumes.
	pub topic: String,
}

/// Type alias for source factory functions.
pub type SourceFactory =
	fn(&toml::Value, &SourceContext) -> Result<Box<dyn ChangeSourceInterface>, SourceError>;

/// Registry trait for source implementations.
pub trait SourceRegistry: ImplementationRegistry<Factory = SourceFactory> {}

/// Get all registered source implementations.
pub fn get_all_implementations() -> Vec<(&'static str, SourceFactory)> {
	use implementations::{capture, http};

	vec![
		(capture::Registry::NAME, capture::Registry::factory()),
		(http::Registry::NAME, http::Registry::factory()),
	]
}

/// Runs every configured change source against one listener channel.
pub struct SourceService {
	sources: Vec<Box<dyn ChangeSourceInterface>>,
}

impl SourceService {
	pub fn new(sources: Vec<Box<dyn ChangeSourceInterface>>) -> Self {
		Self { sources }
	}

	/// Starts all sources. Fails on the first source that cannot start.
	pub async fn start_all(
		&self,
		sender: mpsc::UnboundedSender<StreamMessage>,
	) -> Result<(), SourceError> {
		for source in &self.sources {
			source.start_streaming(sender.clone()).await?;
		}
		Ok(())
	}

	/// Stops all sources, attempting each one even if an earlier stop failed.
	pub async fn stop_all(&self) -> Result<(), SourceError> {
		let mut first_error = None;
		for source in &self.sources {
			if let Err(e) = source.stop_streaming().await {
				tracing::warn!(error = %e, "Failed to stop change source");
				first_error.get_or_insert(e);
			}
		}
		match first_error {
			Some(e) => Err(e),
			None => Ok(()),
		}
	}

	/// Whether any source asked for an initial snapshot.
	pub fn wants_initial_snapshot(&self) -> bool {
		self.sources.iter().any(|s| s.wants_initial_snapshot())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::implementations::capture::CaptureSource;
	use std::time::Duration;

	#[tokio::test]
	async fn test_service_forwards_and_stops() {
		let feed = ChangeFeed::new("orders", 16);
		let service = SourceService::new(vec![Box::new(CaptureSource::new(feed.clone(), true))]);
		assert!(service.wants_initial_snapshot());

		let (tx, mut rx) = mpsc::unbounded_channel();
		service.start_all(tx).await.unwrap();

		feed.publish(Some("1".into()), b"{}".to_vec());
		let message = tokio::time::timeout(Duration::from_secs(1), rx.recv())
			.await
			.unwrap()
			.unwrap();
		assert_eq!(message.key.as_deref(), Some("1"));

		service.stop_all().await.unwrap();
	}
}
