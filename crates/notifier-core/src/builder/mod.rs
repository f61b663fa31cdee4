//! Builder pattern for constructing notifier engines.
//!
//! Composes a NotifierEngine from storage, change source and delivery
//! implementations using factory functions, then wires the order store, the
//! notification pipeline and the order service around them.

use crate::engine::NotifierEngine;
use crate::orders::OrderService;
use crate::pipeline::{NotificationDispatcher, PipelineMetrics, StreamListener};
use crate::store::OrderStore;
use notifier_config::Config;
use notifier_delivery::{
	ContactResolver, DeliveryError, DeliveryInterface, DeliveryService, StaticContactResolver,
};
use notifier_source::{ChangeSourceInterface, SourceContext, SourceError, SourceService};
use notifier_storage::{StorageError, StorageInterface, StorageService};
use notifier_types::{ChangeFeed, Channel};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during notifier engine construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Container for all factory functions needed to build a NotifierEngine.
///
/// Storage and source factories are keyed by implementation name; delivery
/// factories are keyed by the `kind` a channel table names.
pub struct NotifierFactories<SF, SOF, DF> {
	pub storage_factories: HashMap<String, SF>,
	pub source_factories: HashMap<String, SOF>,
	pub delivery_factories: HashMap<String, DF>,
}

/// Builder for constructing a NotifierEngine with pluggable implementations.
pub struct NotifierBuilder {
	config: Config,
}

impl NotifierBuilder {
	/// Creates a new NotifierBuilder with the given configuration.
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Builds the NotifierEngine using factories for each component type.
	pub fn build<SF, SOF, DF>(
		self,
		factories: NotifierFactories<SF, SOF, DF>,
	) -> Result<NotifierEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
		SOF: Fn(&toml::Value, &SourceContext) -> Result<Box<dyn ChangeSourceInterface>, SourceError>,
		DF: Fn(&toml::Value) -> Result<Box<dyn DeliveryInterface>, DeliveryError>,
	{
		// Create the primary storage implementation
		let primary_storage = &self.config.storage.primary;
		let storage_config = self
			.config
			.storage
			.implementations
			.get(primary_storage)
			.ok_or_else(|| {
				BuilderError::Config(format!(
					"Primary storage '{}' has no configuration",
					primary_storage
				))
			})?;
		let storage_factory = factories
			.storage_factories
			.get(primary_storage)
			.ok_or_else(|| {
				BuilderError::MissingComponent(format!("storage implementation '{}'", primary_storage))
			})?;
		let storage_backend = match storage_factory(storage_config) {
			Ok(implementation) => {
				tracing::info!(component = "storage", implementation = %primary_storage, "Loaded");
				implementation
			},
			Err(e) => {
				tracing::error!(
					component = "storage",
					implementation = %primary_storage,
					error = %e,
					"Failed to create storage implementation"
				);
				return Err(BuilderError::Config(format!(
					"Failed to create storage implementation '{}': {}",
					primary_storage, e
				)));
			},
		};
		let storage = Arc::new(StorageService::new(storage_backend));

		// The order store publishes its mutations onto the change feed
		let feed = ChangeFeed::new(
			self.config.stream.topic.clone(),
			self.config.stream.channel_capacity,
		);
		let store = Arc::new(
			OrderStore::new(storage.clone())
				.with_change_feed(feed.clone(), self.config.service.id.clone()),
		);

		// Create delivery implementations, one per channel
		let mut senders: HashMap<Channel, Box<dyn DeliveryInterface>> = HashMap::new();
		for (channel_name, config) in &self.config.delivery.implementations {
			let channel = channel_name.parse::<Channel>().map_err(|_| {
				BuilderError::Config(format!("Unknown delivery channel '{}'", channel_name))
			})?;
			let kind = config.get("kind").and_then(|v| v.as_str()).ok_or_else(|| {
				BuilderError::Config(format!(
					"Delivery channel '{}' missing 'kind' field",
					channel_name
				))
			})?;
			let factory = factories.delivery_factories.get(kind).ok_or_else(|| {
				BuilderError::MissingComponent(format!("delivery implementation '{}'", kind))
			})?;

			match factory(config) {
				Ok(implementation) => {
					senders.insert(channel, implementation);
					tracing::info!(component = "delivery", channel = %channel, implementation = %kind, "Loaded");
				},
				Err(e) => {
					tracing::error!(
						component = "delivery",
						channel = %channel,
						implementation = %kind,
						error = %e,
						"Failed to create delivery implementation"
					);
					return Err(BuilderError::Config(format!(
						"Failed to create delivery implementation for '{}': {}",
						channel, e
					)));
				},
			}
		}

		if senders.is_empty() {
			tracing::warn!("No delivery implementations available - notifications will not be sent");
		}

		let delivery = Arc::new(DeliveryService::new(
			senders,
			Duration::from_millis(self.config.delivery.timeout_ms),
		));

		// Create change source implementations
		let context = SourceContext {
			feed,
			topic: self.config.stream.topic.clone(),
		};
		let mut sources = Vec::new();
		for (name, config) in &self.config.source.implementations {
			if let Some(factory) = factories.source_factories.get(name) {
				match factory(config, &context) {
					Ok(implementation) => {
						sources.push(implementation);
						tracing::info!(component = "source", implementation = %name, "Loaded");
					},
					Err(e) => {
						tracing::error!(
							component = "source",
							implementation = %name,
							error = %e,
							"Failed to create source implementation"
						);
						return Err(BuilderError::Config(format!(
							"Failed to create source implementation '{}': {}",
							name, e
						)));
					},
				}
			} else {
				tracing::warn!(component = "source", implementation = %name, "Unknown implementation, skipping");
			}
		}

		if sources.is_empty() {
			return Err(BuilderError::MissingComponent(
				"no change source could be loaded".into(),
			));
		}

		let sources = Arc::new(SourceService::new(sources));

		// Notification pipeline
		let contacts_config = &self.config.contacts;
		let contacts: Arc<dyn ContactResolver> = Arc::new(StaticContactResolver::new(
			contacts_config.email_domain.clone(),
			contacts_config.default_phone.clone(),
			contacts_config.phones.clone(),
		));
		let metrics = Arc::new(PipelineMetrics::new());
		let dispatcher = Arc::new(NotificationDispatcher::new(delivery.clone(), contacts));
		let listener = Arc::new(StreamListener::new(
			self.config.stream.topic.clone(),
			dispatcher,
			metrics.clone(),
		));

		let orders = Arc::new(OrderService::new(store.clone()));

		Ok(NotifierEngine::new(
			self.config,
			storage,
			store,
			orders,
			sources,
			delivery,
			listener,
			metrics,
		))
	}
}
