//! Notification delivery module for the order notifier.
//!
//! This module sends the notifications the dispatcher decides on. Each channel
//! (email, SMS, audit) is served by one configured sender, and every send is
//! timeboxed so a slow backend cannot hold up the message being processed.

use async_trait::async_trait;
use notifier_types::{ActionStatus, Channel, ConfigSchema, ImplementationRegistry, Notification};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

pub mod contact;

pub use contact::{ContactError, ContactResolver, StaticContactResolver};

/// Re-export implementations
pub mod implementations {
	pub mod log;
	pub mod webhook;
}

/// Errors that can occur while sending a notification.
#[derive(Debug, Error)]
pub enum DeliveryError {
	/// Error that occurs while talking to a remote sender.
	#[error("Network error: {0}")]
	Network(String),
	/// The remote sender answered but refused the notification.
	#[error("Rejected by sender: {0}")]
	Rejected(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Interface implemented by every notification sender.
#[async_trait]
pub trait DeliveryInterface: Send + Sync {
	/// Returns the configuration schema for this sender.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Sends one notification.
	async fn send(&self, notification: &Notification) -> Result<(), DeliveryError>;
}

/// Type alias for delivery factory functions.
pub type DeliveryFactory = fn(&toml::Value) -> Result<Box<dyn DeliveryInterface>, DeliveryError>;

/// Registry trait for delivery implementations.
pub trait DeliveryRegistry: ImplementationRegistry<Factory = DeliveryFactory> {}

/// Get all registered delivery implementations.
///
/// Names match the `kind` key of a `[delivery.implementations.<channel>]` table.
pub fn get_all_implementations() -> Vec<(&'static str, DeliveryFactory)> {
	use implementations::{log, webhook};

	vec![
		(log::Registry::NAME, log::Registry::factory()),
		(webhook::Registry::NAME, webhook::Registry::factory()),
	]
}

/// Routes notifications to the sender configured for their channel.
///
/// Failures never propagate as errors: every call resolves to an
/// [`ActionStatus`] so one failed action cannot block the next.
pub struct DeliveryService {
	senders: HashMap<Channel, Box<dyn DeliveryInterface>>,
	timeout: Duration,
}

impl DeliveryService {
	pub fn new(senders: HashMap<Channel, Box<dyn DeliveryInterface>>, timeout: Duration) -> Self {
		Self { senders, timeout }
	}

	/// Whether a sender is configured for `channel`.
	pub fn has_channel(&self, channel: Channel) -> bool {
		self.senders.contains_key(&channel)
	}

	/// Sends a notification through its channel within the configured timeout.
	pub async fn deliver(&self, notification: &Notification) -> ActionStatus {
		let channel = notification.channel();
		let Some(sender) = self.senders.get(&channel) else {
			tracing::warn!(%channel, "No sender configured for channel");
			return ActionStatus::Failed(format!("no sender configured for {}", channel));
		};

		match tokio::time::timeout(self.timeout, sender.send(notification)).await {
			Ok(Ok(())) => ActionStatus::Delivered,
			Ok(Err(e)) => {
				tracing::warn!(%channel, error = %e, "Notification send failed");
				ActionStatus::Failed(e.to_string())
			},
			Err(_) => {
				tracing::warn!(
					%channel,
					timeout_ms = self.timeout.as_millis() as u64,
					"Notification send timed out"
				);
				ActionStatus::TimedOut
			},
		}
	}

	pub async fn send_email(&self, to: &str, subject: &str, body: &str) -> ActionStatus {
		self.deliver(&Notification::Email {
			to: to.to_string(),
			subject: subject.to_string(),
			body: body.to_string(),
		})
		.await
	}

	pub async fn send_sms(&self, to: &str, message: &str) -> ActionStatus {
		self.deliver(&Notification::Sms {
			to: to.to_string(),
			message: message.to_string(),
		})
		.await
	}

	pub async fn audit_log(&self, action: &str, order_id: i64, details: &str) -> ActionStatus {
		self.deliver(&Notification::Audit {
			action: action.to_string(),
			order_id,
			details: details.to_string(),
		})
		.await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use notifier_types::{Schema, ValidationError};

	struct NoSchema;

	impl ConfigSchema for NoSchema {
		fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
			Schema::new(vec![], vec![]).validate(config)
		}
	}

	struct StalledSender;

	#[async_trait]
	impl DeliveryInterface for StalledSender {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			Box::new(NoSchema)
		}

		async fn send(&self, _notification: &Notification) -> Result<(), DeliveryError> {
			tokio::time::sleep(Duration::from_secs(60)).await;
			Ok(())
		}
	}

	struct RefusingSender;

	#[async_trait]
	impl DeliveryInterface for RefusingSender {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			Box::new(NoSchema)
		}

		async fn send(&self, _notification: &Notification) -> Result<(), DeliveryError> {
			Err(DeliveryError::Rejected("503".into()))
		}
	}

	#[tokio::test(start_paused = true)]
	async fn test_slow_sender_times_out() {
		let mut senders: HashMap<Channel, Box<dyn DeliveryInterface>> = HashMap::new();
		senders.insert(Channel::Sms, Box::new(StalledSender));
		let service = DeliveryService::new(senders, Duration::from_millis(100));

		let status = service.send_sms("+1-555-0100", "shipped").await;
		assert_eq!(status, ActionStatus::TimedOut);
	}

	#[tokio::test]
	async fn test_failures_are_reported_not_raised() {
		let mut senders: HashMap<Channel, Box<dyn DeliveryInterface>> = HashMap::new();
		senders.insert(Channel::Email, Box::new(RefusingSender));
		let service = DeliveryService::new(senders, Duration::from_secs(1));

		let status = service.send_email("kim@example.com", "order received", "ORD-1").await;
		assert!(matches!(status, ActionStatus::Failed(msg) if msg.contains("503")));

		// No audit sender configured
		let status = service.audit_log("ORDER_DELETED", 5, "Order ORD-5 was deleted").await;
		assert!(matches!(status, ActionStatus::Failed(msg) if msg.contains("audit")));
	}

	#[test]
	fn test_all_implementations_registered() {
		let names: Vec<_> = get_all_implementations().into_iter().map(|(n, _)| n).collect();
		assert_eq!(names, vec!["log", "webhook"]);
	}
}
