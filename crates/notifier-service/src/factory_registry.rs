//! Dynamic factory registry for notifier implementations.
//!
//! This module provides a centralized registry for all factory functions,
//! allowing implementations to be instantiated by the names used in the
//! configuration.

use notifier_config::Config;
use notifier_core::{NotifierBuilder, NotifierEngine, NotifierFactories};
use notifier_delivery::DeliveryFactory;
use notifier_source::SourceFactory;
use notifier_storage::StorageFactory;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Global registry for all implementation factories
pub struct FactoryRegistry {
	pub storage: HashMap<String, StorageFactory>,
	pub source: HashMap<String, SourceFactory>,
	pub delivery: HashMap<String, DeliveryFactory>,
}

impl FactoryRegistry {
	/// Create a new empty registry
	pub fn new() -> Self {
		Self {
			storage: HashMap::new(),
			source: HashMap::new(),
			delivery: HashMap::new(),
		}
	}

	/// Register a storage implementation
	pub fn register_storage(&mut self, name: impl Into<String>, factory: StorageFactory) {
		self.storage.insert(name.into(), factory);
	}

	/// Register a change source implementation
	pub fn register_source(&mut self, name: impl Into<String>, factory: SourceFactory) {
		self.source.insert(name.into(), factory);
	}

	/// Register a delivery implementation
	pub fn register_delivery(&mut self, name: impl Into<String>, factory: DeliveryFactory) {
		self.delivery.insert(name.into(), factory);
	}
}

// Global registry instance
static REGISTRY: OnceLock<FactoryRegistry> = OnceLock::new();

/// Initialize the global registry with all available implementations
pub fn initialize_registry() -> &'static FactoryRegistry {
	REGISTRY.get_or_init(|| {
		let mut registry = FactoryRegistry::new();

		// Auto-register all storage implementations
		for (name, factory) in notifier_storage::get_all_implementations() {
			tracing::debug!("Registering storage implementation: {}", name);
			registry.register_storage(name, factory);
		}

		// Auto-register all change source implementations
		for (name, factory) in notifier_source::get_all_implementations() {
			tracing::debug!("Registering source implementation: {}", name);
			registry.register_source(name, factory);
		}

		// Auto-register all delivery implementations
		for (name, factory) in notifier_delivery::get_all_implementations() {
			tracing::debug!("Registering delivery implementation: {}", name);
			registry.register_delivery(name, factory);
		}

		registry
	})
}

/// Get the global factory registry
pub fn get_registry() -> &'static FactoryRegistry {
	initialize_registry()
}

/// Macro to build factories from the names a config refers to
macro_rules! build_factories {
	($registry:expr, $names:expr, $registry_field:ident, $type_name:literal) => {{
		let mut factories = HashMap::new();
		for name in $names {
			if let Some(factory) = $registry.$registry_field.get(name.as_str()) {
				factories.insert(name.clone(), *factory);
			} else {
				let mut available: Vec<_> = $registry.$registry_field.keys().cloned().collect();
				available.sort();
				return Err(format!(
					"Unknown {} implementation '{}'. Available: [{}]",
					$type_name,
					name,
					available.join(", ")
				)
				.into());
			}
		}
		factories
	}};
}

/// Build the notifier engine using the registry and config
pub fn build_notifier_from_config(
	config: Config,
) -> Result<NotifierEngine, Box<dyn std::error::Error>> {
	let registry = get_registry();

	let storage_factories = build_factories!(
		registry,
		config.storage.implementations.keys(),
		storage,
		"storage"
	);
	let source_factories = build_factories!(
		registry,
		config.source.implementations.keys(),
		source,
		"source"
	);

	// Delivery tables are keyed by channel; the implementation is named by `kind`
	let kinds: Vec<String> = config
		.delivery
		.implementations
		.values()
		.filter_map(|v| v.get("kind").and_then(|k| k.as_str()).map(String::from))
		.collect();
	let delivery_factories = build_factories!(registry, kinds.iter(), delivery, "delivery");

	let factories = NotifierFactories {
		storage_factories,
		source_factories,
		delivery_factories,
	};

	Ok(NotifierBuilder::new(config).build(factories)?)
}
