//! Lifecycle management for the notifier engine.
//!
//! Handles initialization and shutdown procedures around the pipeline loop.

use super::{EngineError, NotifierEngine};
use notifier_types::Channel;

impl NotifierEngine {
	/// Performs any initialization required before running
	pub async fn initialize(&self) -> Result<(), EngineError> {
		tracing::info!(service = %self.config.service.id, "Initializing notifier engine");

		for channel in Channel::all() {
			if !self.delivery.has_channel(channel) {
				tracing::warn!(%channel, "No sender configured, actions on this channel will fail");
			}
		}
		Ok(())
	}

	/// Performs cleanup operations
	pub async fn shutdown(&self) -> Result<(), EngineError> {
		tracing::info!("Shutting down notifier engine");

		// Stop change sources
		self.sources
			.stop_all()
			.await
			.map_err(|e| EngineError::Service(e.to_string()))?;

		Ok(())
	}
}
