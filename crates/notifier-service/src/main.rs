//! Main entry point for the order notifier service.
//!
//! This binary runs the order API together with the change-data-capture
//! pipeline that turns order changes into customer and audit notifications.
//! Storage, change sources and delivery channels are pluggable and selected
//! through the configuration file.

use clap::Parser;
use notifier_config::{ApiConfig, Config};
use notifier_core::NotifierEngine;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::oneshot;

mod apis;
mod factory_registry;
mod server;

/// Command-line arguments for the notifier service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config/notifier.toml", env = "NOTIFIER_CONFIG")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

/// Main entry point for the notifier service.
///
/// This function:
/// 1. Parses command-line arguments
/// 2. Initializes logging infrastructure
/// 3. Loads configuration from file
/// 4. Builds the notifier engine with all implementations
/// 5. Runs the pipeline (and the API, when enabled) until interrupted, then
///    drains the pipeline before the API goes down
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started notifier");

	// Load configuration
	let config = Config::from_file(&args.config.to_string_lossy()).await?;
	tracing::info!("Loaded configuration [{}]", config.service.id);

	let engine = Arc::new(factory_registry::build_notifier_from_config(config.clone())?);

	run_service(engine, config.api, shutdown_signal()).await?;

	tracing::info!("Stopped notifier");
	Ok(())
}

/// Runs the pipeline, and the API when enabled, until `shutdown` completes.
///
/// The API stays up until the engine has drained its partitions and returned.
async fn run_service<F>(
	engine: Arc<NotifierEngine>,
	api: Option<ApiConfig>,
	shutdown: F,
) -> Result<(), Box<dyn std::error::Error>>
where
	F: Future<Output = ()>,
{
	let Some(api_config) = api.filter(|api| api.enabled) else {
		tracing::info!("Starting pipeline only");
		engine.run_until(shutdown).await?;
		return Ok(());
	};

	let listener = server::bind(&api_config).await?;
	let (api_stop_tx, api_stop_rx) = oneshot::channel::<()>();
	let api_task = tokio::spawn(server::serve(listener, Arc::clone(&engine), async move {
		let _ = api_stop_rx.await;
	}));

	let engine_result = engine.run_until(shutdown).await;
	tracing::info!("Notifier finished");

	let _ = api_stop_tx.send(());
	match api_task.await {
		Ok(Ok(())) => tracing::info!("API server finished"),
		Ok(Err(e)) => tracing::error!(error = %e, "API server failed"),
		Err(e) => tracing::error!(error = %e, "API server task failed"),
	}

	engine_result?;
	Ok(())
}

/// Resolves on Ctrl+C.
async fn shutdown_signal() {
	if let Err(e) = tokio::signal::ctrl_c().await {
		tracing::error!("Failed to listen for shutdown signal: {}", e);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::str::FromStr;

	#[test]
	fn test_args_default_values() {
		let args = Args::parse_from(["notifier"]);
		assert_eq!(args.config, PathBuf::from("config/notifier.toml"));
		assert_eq!(args.log_level, "info");
	}

	#[test]
	fn test_args_custom_values() {
		let args = Args::parse_from(["notifier", "-c", "custom.toml", "--log-level", "debug"]);
		assert_eq!(args.config, PathBuf::from("custom.toml"));
		assert_eq!(args.log_level, "debug");
	}

	#[tokio::test]
	async fn test_shipped_config_loads_and_builds() {
		let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../config/notifier.toml");
		let config = Config::from_file(path).await.unwrap();
		assert!(factory_registry::build_notifier_from_config(config).is_ok());
	}

	#[tokio::test]
	async fn test_api_outlives_pipeline_drain() {
		let config = Config::from_str(
			r#"
[service]
id = "drain-test"

[stream]
topic = "dbserver.public.orders"
group_id = "notification-service"

[storage]
primary = "memory"
[storage.implementations.memory]

[source.implementations.capture]

[delivery]
[delivery.implementations.email]
kind = "log"

[api]
enabled = true
port = 0
"#,
		)
		.unwrap();
		let engine = Arc::new(factory_registry::build_notifier_from_config(config.clone()).unwrap());
		let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

		let service = run_service(Arc::clone(&engine), config.api, async {
			let _ = shutdown_rx.await;
		});
		let client = async {
			let store = engine.store().clone();
			while !store
				.change_feed()
				.is_some_and(|feed| feed.subscriber_count() > 0)
			{
				tokio::time::sleep(std::time::Duration::from_millis(10)).await;
			}
			for name in ["Kim", "Lee", "Park"] {
				engine
					.orders()
					.create_order(name, 1000.into(), None)
					.await
					.unwrap();
			}
			shutdown_tx.send(()).unwrap();
		};

		let (result, ()) = tokio::time::timeout(std::time::Duration::from_secs(5), async {
			tokio::join!(service, client)
		})
		.await
		.unwrap();
		assert!(result.is_ok());

		let stats = engine.metrics().snapshot();
		assert_eq!(stats.events, 3);
		assert_eq!(stats.actions_delivered, 3);
	}
}
