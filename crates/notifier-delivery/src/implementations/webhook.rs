//! Sender that forwards notifications to an HTTP endpoint.
//!
//! The notification is POSTed as JSON, tagged with its `channel`. Any 2xx
//! answer counts as delivered.

use crate::{DeliveryError, DeliveryFactory, DeliveryInterface, DeliveryRegistry};
use async_trait::async_trait;
use notifier_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Notification, Schema, ValidationError,
};
use std::time::Duration;

/// HTTP webhook notification sender.
pub struct WebhookDelivery {
	client: reqwest::Client,
	url: String,
	auth_token: Option<String>,
}

impl WebhookDelivery {
	pub fn new(url: String, auth_token: Option<String>) -> Result<Self, DeliveryError> {
		let client = reqwest::Client::builder()
			.pool_idle_timeout(Duration::from_secs(90))
			.pool_max_idle_per_host(10)
			.build()
			.map_err(|e| DeliveryError::Configuration(format!("HTTP client: {}", e)))?;
		Ok(Self {
			client,
			url,
			auth_token,
		})
	}
}

pub struct WebhookDeliverySchema;

impl ConfigSchema for WebhookDeliverySchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![
				Field::new("kind", FieldType::String),
				Field::new("url", FieldType::String).with_validator(|value| {
					match value.as_str() {
						Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
							Ok(())
						},
						_ => Err("url must start with http:// or https://".to_string()),
					}
				}),
			],
			vec![Field::new("auth_token", FieldType::String)],
		);
		schema.validate(config)
	}
}

#[async_trait]
impl DeliveryInterface for WebhookDelivery {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(WebhookDeliverySchema)
	}

	async fn send(&self, notification: &Notification) -> Result<(), DeliveryError> {
		let mut request = self.client.post(&self.url).json(notification);
		if let Some(token) = &self.auth_token {
			request = request.bearer_auth(token);
		}

		let response = request
			.send()
			.await
			.map_err(|e| DeliveryError::Network(e.to_string()))?;

		let status = response.status();
		if !status.is_success() {
			return Err(DeliveryError::Rejected(format!(
				"{} answered {}",
				self.url, status
			)));
		}
		tracing::debug!(url = %self.url, channel = %notification.channel(), "Webhook accepted notification");
		Ok(())
	}
}

/// Factory function to create a webhook sender from configuration.
///
/// Configuration parameters:
/// - `url`: endpoint receiving the POST (required)
/// - `auth_token`: sent as a bearer token when set
pub fn create_delivery(config: &toml::Value) -> Result<Box<dyn DeliveryInterface>, DeliveryError> {
	WebhookDeliverySchema
		.validate(config)
		.map_err(|e| DeliveryError::Configuration(format!("Invalid configuration: {}", e)))?;

	let url = config
		.get("url")
		.and_then(|v| v.as_str())
		.ok_or_else(|| DeliveryError::Configuration("url is required".into()))?
		.to_string();
	let auth_token = config
		.get("auth_token")
		.and_then(|v| v.as_str())
		.map(String::from);

	Ok(Box::new(WebhookDelivery::new(url, auth_token)?))
}

/// Registry for the webhook sender.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "webhook";
	type Factory = DeliveryFactory;

	fn factory() -> Self::Factory {
		create_delivery
	}
}

impl DeliveryRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::{http::StatusCode, routing::post, Json, Router};
	use std::sync::{Arc, Mutex};

	async fn spawn_endpoint(status: StatusCode) -> (String, Arc<Mutex<Vec<serde_json::Value>>>) {
		let received = Arc::new(Mutex::new(Vec::new()));
		let sink = received.clone();
		let app = Router::new().route(
			"/notify",
			post(move |Json(body): Json<serde_json::Value>| {
				let sink = sink.clone();
				async move {
					sink.lock().unwrap().push(body);
					status
				}
			}),
		);
		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		tokio::spawn(async move {
			axum::serve(listener, app).await.unwrap();
		});
		(format!("http://{}/notify", addr), received)
	}

	#[tokio::test]
	async fn test_posts_tagged_notification() {
		let (url, received) = spawn_endpoint(StatusCode::OK).await;
		let sender = WebhookDelivery::new(url, None).unwrap();

		sender
			.send(&Notification::Sms {
				to: "+1-555-0100".into(),
				message: "ORD-1 has shipped.".into(),
			})
			.await
			.unwrap();

		let bodies = received.lock().unwrap();
		assert_eq!(bodies.len(), 1);
		assert_eq!(bodies[0]["channel"], "sms");
		assert_eq!(bodies[0]["to"], "+1-555-0100");
	}

	#[tokio::test]
	async fn test_non_success_status_is_rejection() {
		let (url, _received) = spawn_endpoint(StatusCode::SERVICE_UNAVAILABLE).await;
		let sender = WebhookDelivery::new(url, Some("secret".into())).unwrap();

		let result = sender
			.send(&Notification::Audit {
				action: "ORDER_DELETED".into(),
				order_id: 5,
				details: "Order ORD-5 was deleted".into(),
			})
			.await;
		assert!(matches!(result, Err(DeliveryError::Rejected(msg)) if msg.contains("503")));
	}

	#[test]
	fn test_url_is_validated() {
		let config: toml::Value = toml::from_str("kind = \"webhook\"\nurl = \"ftp://x\"").unwrap();
		assert!(matches!(
			create_delivery(&config),
			Err(DeliveryError::Configuration(_))
		));
	}
}
