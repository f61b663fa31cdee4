//! HTTP change intake.
//!
//! Runs a small HTTP server that accepts change envelopes pushed by an external
//! connector. Each `POST /changes` body becomes one stream message; the
//! partition key and topic can be given as query parameters.
//!
//! ```text
//! POST /changes?key=42&topic=dbserver.public.orders
//! {"op":"u","before":{...},"after":{...},"ts_ms":1700000000000}
//! ```
//!
//! The body is forwarded without being parsed, so malformed envelopes are
//! accepted here and rejected by the decoder downstream.

use crate::{
	ChangeSourceInterface, SourceContext, SourceError, SourceFactory, SourceRegistry,
};
use async_trait::async_trait;
use axum::{
	body::Bytes,
	extract::{Query, State},
	http::{header, HeaderMap, StatusCode},
	response::{IntoResponse, Json},
	routing::post,
	Router,
};
use notifier_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, StreamMessage,
	ValidationError,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tower_http::cors::CorsLayer;

#[derive(Debug, Default, Deserialize)]
struct ChangeQuery {
	key: Option<String>,
	topic: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChangeResponse {
	status: &'static str,
	#[serde(skip_serializing_if = "Option::is_none")]
	message: Option<String>,
}

#[derive(Clone)]
struct ApiState {
	sender: mpsc::UnboundedSender<StreamMessage>,
	topic: String,
	auth_token: Option<String>,
}

/// Change source receiving envelopes over HTTP.
pub struct HttpChangeSource {
	api_host: String,
	api_port: u16,
	auth_token: Option<String>,
	topic: String,
	is_running: Arc<AtomicBool>,
	shutdown_signal: Arc<Mutex<Option<mpsc::Sender<()>>>>,
	local_addr: Arc<Mutex<Option<SocketAddr>>>,
}

impl HttpChangeSource {
	pub fn new(
		api_host: String,
		api_port: u16,
		auth_token: Option<String>,
		topic: String,
	) -> Self {
		Self {
			api_host,
			api_port,
			auth_token,
			topic,
			is_running: Arc::new(AtomicBool::new(false)),
			shutdown_signal: Arc::new(Mutex::new(None)),
			local_addr: Arc::new(Mutex::new(None)),
		}
	}

	/// Address the server is bound to while streaming.
	pub async fn local_addr(&self) -> Option<SocketAddr> {
		*self.local_addr.lock().await
	}

	async fn run_server(
		listener: tokio::net::TcpListener,
		state: ApiState,
		mut shutdown_rx: mpsc::Receiver<()>,
	) -> Result<(), String> {
		let app = Router::new()
			.route("/changes", post(handle_change))
			.layer(CorsLayer::permissive())
			.with_state(state);

		axum::serve(listener, app)
			.with_graceful_shutdown(async move {
				let _ = shutdown_rx.recv().await;
				tracing::info!("Shutting down change intake server");
			})
			.await
			.map_err(|e| format!("Server error: {}", e))
	}
}

fn authorized(headers: &HeaderMap, token: &str) -> bool {
	headers
		.get(header::AUTHORIZATION)
		.and_then(|v| v.to_str().ok())
		.and_then(|v| v.strip_prefix("Bearer "))
		.is_some_and(|presented| presented == token)
}

async fn handle_change(
	State(state): State<ApiState>,
	Query(query): Query<ChangeQuery>,
	headers: HeaderMap,
	body: Bytes,
) -> impl IntoResponse {
	if let Some(token) = &state.auth_token {
		if !authorized(&headers, token) {
			return (
				StatusCode::UNAUTHORIZED,
				Json(ChangeResponse {
					status: "error",
					message: Some("missing or invalid bearer token".to_string()),
				}),
			);
		}
	}

	let topic = query.topic.unwrap_or_else(|| state.topic.clone());
	let message = StreamMessage::new(topic, query.key, body.to_vec());

	if state.sender.send(message).is_err() {
		return (
			StatusCode::SERVICE_UNAVAILABLE,
			Json(ChangeResponse {
				status: "error",
				message: Some("listener is not running".to_string()),
			}),
		);
	}

	(
		StatusCode::ACCEPTED,
		Json(ChangeResponse {
			status: "accepted",
			message: None,
		}),
	)
}

/// Configuration schema for the HTTP change source.
///
/// All fields are optional: `api_host` (default "127.0.0.1"), `api_port`
/// (default 8081, 0 picks a free port) and `auth_token`.
pub struct HttpChangeSourceSchema;

impl ConfigSchema for HttpChangeSourceSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![
				Field::new("api_host", FieldType::String),
				Field::new(
					"api_port",
					FieldType::Integer {
						min: Some(0),
						max: Some(65535),
					},
				),
				Field::new("auth_token", FieldType::String),
			],
		);
		schema.validate(config)
	}
}

#[async_trait]
impl ChangeSourceInterface for HttpChangeSource {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(HttpChangeSourceSchema)
	}

	async fn start_streaming(
		&self,
		sender: mpsc::UnboundedSender<StreamMessage>,
	) -> Result<(), SourceError> {
		if self.is_running.load(Ordering::SeqCst) {
			return Err(SourceError::AlreadyStreaming);
		}

		let addr = format!("{}:{}", self.api_host, self.api_port)
			.parse::<SocketAddr>()
			.map_err(|e| {
				SourceError::Configuration(format!(
					"Invalid address '{}:{}': {}",
					self.api_host, self.api_port, e
				))
			})?;
		let listener = tokio::net::TcpListener::bind(addr)
			.await
			.map_err(|e| SourceError::Connection(format!("Failed to bind {}: {}", addr, e)))?;
		let bound = listener
			.local_addr()
			.map_err(|e| SourceError::Connection(e.to_string()))?;
		*self.local_addr.lock().await = Some(bound);

		let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
		*self.shutdown_signal.lock().await = Some(shutdown_tx);

		let state = ApiState {
			sender,
			topic: self.topic.clone(),
			auth_token: self.auth_token.clone(),
		};

		tokio::spawn(async move {
			if let Err(e) = Self::run_server(listener, state, shutdown_rx).await {
				tracing::error!("Change intake server error: {}", e);
			}
		});

		tracing::info!("Change intake API listening on {}", bound);
		self.is_running.store(true, Ordering::SeqCst);
		Ok(())
	}

	async fn stop_streaming(&self) -> Result<(), SourceError> {
		if !self.is_running.load(Ordering::SeqCst) {
			return Ok(());
		}

		if let Some(shutdown_tx) = self.shutdown_signal.lock().await.take() {
			let _ = shutdown_tx.send(()).await;
		}
		*self.local_addr.lock().await = None;

		self.is_running.store(false, Ordering::SeqCst);
		Ok(())
	}
}

/// Factory function to create the HTTP change source.
///
/// ```toml
/// api_host = "127.0.0.1"   # optional
/// api_port = 8081          # optional
/// auth_token = "secret"    # optional, enables bearer auth
/// ```
pub fn create_source(
	config: &toml::Value,
	context: &SourceContext,
) -> Result<Box<dyn ChangeSourceInterface>, SourceError> {
	HttpChangeSourceSchema
		.validate(config)
		.map_err(|e| SourceError::Configuration(format!("Invalid configuration: {}", e)))?;

	let api_host = config
		.get("api_host")
		.and_then(|v| v.as_str())
		.unwrap_or("127.0.0.1")
		.to_string();

	let api_port = config
		.get("api_port")
		.and_then(|v| v.as_integer())
		.unwrap_or(8081) as u16;

	let auth_token = config
		.get("auth_token")
		.and_then(|v| v.as_str())
		.map(String::from);

	Ok(Box::new(HttpChangeSource::new(
		api_host,
		api_port,
		auth_token,
		context.topic.clone(),
	)))
}

/// Registry for the HTTP change source.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "http";
	type Factory = SourceFactory;

	fn factory() -> Self::Factory {
		create_source
	}
}

impl SourceRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;

	async fn started(auth_token: Option<&str>) -> (HttpChangeSource, String, mpsc::UnboundedReceiver<StreamMessage>) {
		let source = HttpChangeSource::new(
			"127.0.0.1".into(),
			0,
			auth_token.map(String::from),
			"dbserver.public.orders".into(),
		);
		let (tx, rx) = mpsc::unbounded_channel();
		source.start_streaming(tx).await.unwrap();
		let addr = source.local_addr().await.unwrap();
		(source, format!("http://{}/changes", addr), rx)
	}

	#[tokio::test]
	async fn test_body_forwarded_with_key_and_default_topic() {
		let (source, url, mut rx) = started(None).await;

		let response = reqwest::Client::new()
			.post(format!("{}?key=42", url))
			.body(r#"{"op":"c"}"#)
			.send()
			.await
			.unwrap();
		assert_eq!(response.status().as_u16(), 202);

		let message = rx.recv().await.unwrap();
		assert_eq!(message.topic, "dbserver.public.orders");
		assert_eq!(message.key.as_deref(), Some("42"));
		assert_eq!(message.payload, br#"{"op":"c"}"#.to_vec());

		source.stop_streaming().await.unwrap();
	}

	#[tokio::test]
	async fn test_topic_override() {
		let (source, url, mut rx) = started(None).await;

		reqwest::Client::new()
			.post(format!("{}?topic=inventory", url))
			.body("{}")
			.send()
			.await
			.unwrap();

		let message = rx.recv().await.unwrap();
		assert_eq!(message.topic, "inventory");
		assert_eq!(message.key, None);

		source.stop_streaming().await.unwrap();
	}

	#[tokio::test]
	async fn test_bearer_token_enforced() {
		let (source, url, mut rx) = started(Some("secret")).await;
		let client = reqwest::Client::new();

		let denied = client.post(&url).body("{}").send().await.unwrap();
		assert_eq!(denied.status().as_u16(), 401);

		let allowed = client
			.post(&url)
			.bearer_auth("secret")
			.body("{}")
			.send()
			.await
			.unwrap();
		assert_eq!(allowed.status().as_u16(), 202);
		assert!(rx.recv().await.is_some());

		source.stop_streaming().await.unwrap();
	}
}
