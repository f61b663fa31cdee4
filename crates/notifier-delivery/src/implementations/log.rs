//! Sender that writes notifications to the service log.
//!
//! Useful for development and for the audit channel when no external audit
//! system is available.

use crate::{DeliveryError, DeliveryFactory, DeliveryInterface, DeliveryRegistry};
use async_trait::async_trait;
use notifier_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Notification, Schema, ValidationError,
};

/// Notification sender backed by `tracing`.
pub struct LogDelivery {
	target: String,
}

impl LogDelivery {
	pub fn new(target: impl Into<String>) -> Self {
		Self {
			target: target.into(),
		}
	}
}

pub struct LogDeliverySchema;

impl ConfigSchema for LogDeliverySchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("kind", FieldType::String)],
			vec![Field::new("target", FieldType::String)],
		);
		schema.validate(config)
	}
}

#[async_trait]
impl DeliveryInterface for LogDelivery {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(LogDeliverySchema)
	}

	async fn send(&self, notification: &Notification) -> Result<(), DeliveryError> {
		match notification {
			Notification::Email { to, subject, body } => {
				tracing::info!(sink = %self.target, %to, %subject, %body, "Sending email");
			},
			Notification::Sms { to, message } => {
				tracing::info!(sink = %self.target, %to, %message, "Sending SMS");
			},
			Notification::Audit {
				action,
				order_id,
				details,
			} => {
				tracing::info!(sink = %self.target, %action, order_id, %details, "Audit log");
			},
		}
		Ok(())
	}
}

/// Factory function to create a log sender from configuration.
///
/// Configuration parameters:
/// - `target`: label attached to every log line (default: "notifications")
pub fn create_delivery(config: &toml::Value) -> Result<Box<dyn DeliveryInterface>, DeliveryError> {
	LogDeliverySchema
		.validate(config)
		.map_err(|e| DeliveryError::Configuration(format!("Invalid configuration: {}", e)))?;

	let target = config
		.get("target")
		.and_then(|v| v.as_str())
		.unwrap_or("notifications");
	Ok(Box::new(LogDelivery::new(target)))
}

/// Registry for the log sender.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "log";
	type Factory = DeliveryFactory;

	fn factory() -> Self::Factory {
		create_delivery
	}
}

impl DeliveryRegistry for Registry {}
