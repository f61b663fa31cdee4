//! Configuration module for the order notifier.
//!
//! Configuration is loaded from TOML. `${VAR}` and `${VAR:-default}` references
//! are resolved from the environment before parsing, and the parsed result is
//! validated as a whole.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files:
//! - Use `include = ["file1.toml", "file2.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)

mod loader;

use notifier_types::Channel;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep the message, not the input dump
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the notifier.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Identity of this notifier instance.
	pub service: ServiceConfig,
	/// Change stream the listener consumes.
	pub stream: StreamConfig,
	/// Storage backend used by the order store.
	pub storage: StorageConfig,
	/// Change sources feeding the listener.
	pub source: SourceConfig,
	/// Outbound notification channels.
	pub delivery: DeliveryConfig,
	/// Contact lookup for email addresses and phone numbers.
	#[serde(default)]
	pub contacts: ContactsConfig,
	/// HTTP API server.
	pub api: Option<ApiConfig>,
}

/// Identity of this notifier instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
	pub id: String,
}

/// Change stream identity and listener concurrency.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamConfig {
	/// Topic carrying order changes; messages from other topics are ignored.
	pub topic: String,
	/// Consumer group this listener belongs to.
	pub group_id: String,
	/// Number of partition workers. Defaults to 4.
	#[serde(default = "default_workers")]
	pub workers: usize,
	/// Messages the change feed buffers for each subscriber. Defaults to 1024.
	#[serde(default = "default_channel_capacity")]
	pub channel_capacity: usize,
}

fn default_workers() -> usize {
	4
}

fn default_channel_capacity() -> usize {
	1024
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for change sources.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
	/// Map of source implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for outbound notification channels.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeliveryConfig {
	/// Timebox for a single send action, in milliseconds. Defaults to 5000.
	#[serde(default = "default_timeout_ms")]
	pub timeout_ms: u64,
	/// Map of channel names (`email`, `sms`, `audit`) to implementation configs.
	/// Each table selects its implementation with a `kind` key.
	pub implementations: HashMap<String, toml::Value>,
}

fn default_timeout_ms() -> u64 {
	5000
}

/// Contact lookup settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContactsConfig {
	/// Domain appended to the derived mailbox name.
	#[serde(default = "default_email_domain")]
	pub email_domain: String,
	/// Phone number used when a customer has no entry in `phones`.
	#[serde(default)]
	pub default_phone: Option<String>,
	/// Customer name to phone number overrides.
	#[serde(default)]
	pub phones: HashMap<String, String>,
}

fn default_email_domain() -> String {
	"example.com".to_string()
}

impl Default for ContactsConfig {
	fn default() -> Self {
		Self {
			email_domain: default_email_domain(),
			default_phone: None,
			phones: HashMap::new(),
		}
	}
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	#[serde(default)]
	pub enabled: bool,
	#[serde(default = "default_api_host")]
	pub host: String,
	#[serde(default = "default_api_port")]
	pub port: u16,
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3000
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = input.to_string();
	let mut replacements = Vec::new();

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let default_value = cap.get(2).map(|m| m.as_str());

		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match default_value {
				Some(default) => default.to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)));
				},
			},
		};

		replacements.push((full_match.start(), full_match.end(), value));
	}

	// Apply replacements in reverse order to maintain positions
	for (start, end, value) in replacements.iter().rev() {
		result.replace_range(start..end, value);
	}

	Ok(result)
}

impl Config {
	/// Loads configuration from a file, following `include` directives.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Validates the configuration as a whole.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.service.id.trim().is_empty() {
			return Err(ConfigError::Validation("Service ID cannot be empty".into()));
		}

		// Stream identity
		if self.stream.topic.trim().is_empty() {
			return Err(ConfigError::Validation("Stream topic cannot be empty".into()));
		}
		if self.stream.group_id.trim().is_empty() {
			return Err(ConfigError::Validation(
				"Stream group_id cannot be empty".into(),
			));
		}
		if self.stream.workers == 0 || self.stream.workers > 256 {
			return Err(ConfigError::Validation(
				"Stream workers must be between 1 and 256".into(),
			));
		}
		if self.stream.channel_capacity == 0 {
			return Err(ConfigError::Validation(
				"Stream channel_capacity must be greater than 0".into(),
			));
		}

		// Storage
		if self.storage.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one storage implementation must be configured".into(),
			));
		}
		if !self
			.storage
			.implementations
			.contains_key(&self.storage.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary storage '{}' not found in implementations",
				self.storage.primary
			)));
		}

		// Sources
		if self.source.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one source implementation required".into(),
			));
		}

		// Delivery
		if self.delivery.timeout_ms == 0 || self.delivery.timeout_ms > 300_000 {
			return Err(ConfigError::Validation(
				"Delivery timeout_ms must be between 1 and 300000".into(),
			));
		}
		for (channel, implementation) in &self.delivery.implementations {
			if channel.parse::<Channel>().is_err() {
				return Err(ConfigError::Validation(format!(
					"Unknown delivery channel '{}' (expected email, sms or audit)",
					channel
				)));
			}
			if implementation.get("kind").and_then(|v| v.as_str()).is_none() {
				return Err(ConfigError::Validation(format!(
					"Delivery channel '{}' missing 'kind' field",
					channel
				)));
			}
		}

		if self.contacts.email_domain.trim().is_empty() {
			return Err(ConfigError::Validation(
				"Contacts email_domain cannot be empty".into(),
			));
		}

		Ok(())
	}
}

/// Parses a TOML string, resolving environment variables and validating the result.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const BASE_CONFIG: &str = r#"
[service]
id = "order-notifier"

[stream]
topic = "dbserver.public.orders"
group_id = "notification-service"

[storage]
primary = "memory"
[storage.implementations.memory]

[source]
[source.implementations.capture]

[delivery]
[delivery.implementations.email]
kind = "log"
[delivery.implementations.sms]
kind = "log"
[delivery.implementations.audit]
kind = "log"
"#;

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("TEST_NOTIFIER_HOST", "localhost");
		std::env::set_var("TEST_NOTIFIER_PORT", "5432");

		let input = "host = \"${TEST_NOTIFIER_HOST}:${TEST_NOTIFIER_PORT}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "host = \"localhost:5432\"");

		std::env::remove_var("TEST_NOTIFIER_HOST");
		std::env::remove_var("TEST_NOTIFIER_PORT");
	}

	#[test]
	fn test_env_var_with_default() {
		let input = "value = \"${MISSING_NOTIFIER_VAR:-default_value}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "value = \"default_value\"");
	}

	#[test]
	fn test_missing_env_var_error() {
		let input = "value = \"${MISSING_NOTIFIER_VAR}\"";
		let result = resolve_env_vars(input);
		assert!(result.unwrap_err().to_string().contains("MISSING_NOTIFIER_VAR"));
	}

	#[test]
	fn test_defaults_applied() {
		let config: Config = BASE_CONFIG.parse().unwrap();
		assert_eq!(config.stream.workers, 4);
		assert_eq!(config.stream.channel_capacity, 1024);
		assert_eq!(config.delivery.timeout_ms, 5000);
		assert_eq!(config.contacts.email_domain, "example.com");
		assert!(config.contacts.default_phone.is_none());
		assert!(config.api.is_none());
	}

	#[test]
	fn test_config_with_env_vars() {
		std::env::set_var("TEST_NOTIFIER_TOPIC", "cdc.orders");
		let config_str = BASE_CONFIG.replace("dbserver.public.orders", "${TEST_NOTIFIER_TOPIC}");

		let config: Config = config_str.parse().unwrap();
		assert_eq!(config.stream.topic, "cdc.orders");

		std::env::remove_var("TEST_NOTIFIER_TOPIC");
	}

	#[test]
	fn test_empty_group_rejected() {
		let config_str = BASE_CONFIG.replace("\"notification-service\"", "\"\"");
		let err = Config::from_str(&config_str).unwrap_err();
		assert!(err.to_string().contains("group_id"));
	}

	#[test]
	fn test_unknown_delivery_channel_rejected() {
		let config_str = format!("{}\n[delivery.implementations.pager]\nkind = \"log\"\n", BASE_CONFIG);
		let err = Config::from_str(&config_str).unwrap_err();
		assert!(err.to_string().contains("Unknown delivery channel 'pager'"));
	}

	#[test]
	fn test_delivery_channel_without_kind_rejected() {
		let config_str = BASE_CONFIG.replacen(
			"[delivery.implementations.sms]\nkind = \"log\"",
			"[delivery.implementations.sms]\nurl = \"http://localhost\"",
			1,
		);
		let err = Config::from_str(&config_str).unwrap_err();
		assert!(err.to_string().contains("missing 'kind' field"));
	}

	#[test]
	fn test_primary_storage_must_exist() {
		let config_str = BASE_CONFIG.replace("primary = \"memory\"", "primary = \"redis\"");
		let err = Config::from_str(&config_str).unwrap_err();
		assert!(err.to_string().contains("Primary storage 'redis'"));
	}

	#[test]
	fn test_contacts_section() {
		let config_str = format!(
			"{}\n[contacts]\nemail_domain = \"shop.test\"\ndefault_phone = \"+1-555-0100\"\n[contacts.phones]\nKim = \"+82-10-0000-0001\"\n",
			BASE_CONFIG
		);
		let config: Config = config_str.parse().unwrap();
		assert_eq!(config.contacts.email_domain, "shop.test");
		assert_eq!(config.contacts.default_phone.as_deref(), Some("+1-555-0100"));
		assert_eq!(config.contacts.phones["Kim"], "+82-10-0000-0001");
	}
}
