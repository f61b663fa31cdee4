//! Notifier engine that runs the change-stream pipeline.
//!
//! Messages from every change source arrive on a single channel and are routed
//! to a fixed set of partition workers by hashing the message key. A worker
//! handles its queue one message at a time, so changes to the same order are
//! processed in the order they arrived while different orders proceed in
//! parallel.

pub mod lifecycle;

use crate::orders::OrderService;
use crate::pipeline::{PipelineMetrics, StreamListener};
use crate::store::OrderStore;
use futures::future::join_all;
use notifier_config::Config;
use notifier_delivery::DeliveryService;
use notifier_source::SourceService;
use notifier_storage::StorageService;
use notifier_types::StreamMessage;
use std::collections::hash_map::DefaultHasher;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Service error: {0}")]
	Service(String),
}

/// Returns the worker responsible for a message key.
///
/// Messages without a key all go to worker 0.
pub fn partition_for(key: Option<&str>, workers: usize) -> usize {
	match key {
		None => 0,
		Some(key) => {
			let mut hasher = DefaultHasher::new();
			key.hash(&mut hasher);
			(hasher.finish() % workers.max(1) as u64) as usize
		},
	}
}

/// Hands a message to the queue of the worker owning its key.
///
/// Worker queues are unbounded, so a partition stuck on slow sends never
/// holds back messages for the others.
fn route(workers: &[mpsc::UnboundedSender<StreamMessage>], message: StreamMessage) {
	let index = partition_for(message.key.as_deref(), workers.len());
	if let Some(worker) = workers.get(index) {
		if worker.send(message).is_err() {
			tracing::error!(worker = index, "Partition worker stopped, dropping message");
		}
	}
}

/// Main engine wiring the order store, change sources and notification pipeline.
#[derive(Clone)]
pub struct NotifierEngine {
	/// Notifier configuration.
	pub(crate) config: Config,
	/// Storage service backing the order store.
	pub(crate) storage: Arc<StorageService>,
	/// Order store publishing change records.
	pub(crate) store: Arc<OrderStore>,
	/// CRUD operations on orders.
	pub(crate) orders: Arc<OrderService>,
	/// Change sources feeding the pipeline.
	pub(crate) sources: Arc<SourceService>,
	/// Outbound notification channels.
	pub(crate) delivery: Arc<DeliveryService>,
	/// Decode, classify and dispatch for each message.
	pub(crate) listener: Arc<StreamListener>,
	/// Pipeline counters.
	pub(crate) metrics: Arc<PipelineMetrics>,
}

impl NotifierEngine {
	/// Creates a new engine with the given services.
	#[allow(clippy::too_many_arguments)]
	pub fn new(
		config: Config,
		storage: Arc<StorageService>,
		store: Arc<OrderStore>,
		orders: Arc<OrderService>,
		sources: Arc<SourceService>,
		delivery: Arc<DeliveryService>,
		listener: Arc<StreamListener>,
		metrics: Arc<PipelineMetrics>,
	) -> Self {
		Self {
			config,
			storage,
			store,
			orders,
			sources,
			delivery,
			listener,
			metrics,
		}
	}

	/// Runs the pipeline until `shutdown` completes.
	///
	/// On shutdown the sources are stopped first, messages already received
	/// are handed to their workers, and the workers are joined once their
	/// queues are empty.
	pub async fn run_until<F>(&self, shutdown: F) -> Result<(), EngineError>
	where
		F: Future<Output = ()>,
	{
		self.initialize().await?;

		let (source_tx, mut source_rx) = mpsc::unbounded_channel();
		self.sources
			.start_all(source_tx)
			.await
			.map_err(|e| EngineError::Service(e.to_string()))?;

		if self.sources.wants_initial_snapshot() {
			if let Err(e) = self.store.emit_snapshot().await {
				tracing::error!(error = %e, "Initial snapshot failed");
				if let Err(stop_error) = self.shutdown().await {
					tracing::warn!(error = %stop_error, "Failed to stop change sources");
				}
				return Err(EngineError::Service(e.to_string()));
			}
		}

		let (workers, handles) = self.spawn_workers();
		tracing::info!(
			topic = %self.config.stream.topic,
			group = %self.config.stream.group_id,
			workers = workers.len(),
			"Listening for order changes"
		);

		tokio::pin!(shutdown);
		loop {
			tokio::select! {
				received = source_rx.recv() => match received {
					Some(message) => route(&workers, message),
					None => {
						tracing::warn!("All change sources closed");
						break;
					}
				},

				// Shutdown signal
				_ = &mut shutdown => {
					break;
				}
			}
		}

		let stopped = self.shutdown().await;

		while let Ok(message) = source_rx.try_recv() {
			route(&workers, message);
		}
		drop(workers);

		for (index, result) in join_all(handles).await.into_iter().enumerate() {
			if let Err(e) = result {
				tracing::error!(worker = index, "Partition worker failed: {}", e);
			}
		}

		tracing::info!(stats = ?self.metrics.snapshot(), "Pipeline stopped");
		stopped
	}

	fn spawn_workers(&self) -> (Vec<mpsc::UnboundedSender<StreamMessage>>, Vec<JoinHandle<()>>) {
		let count = self.config.stream.workers.max(1);

		(0..count)
			.map(|index| {
				let (tx, mut rx) = mpsc::unbounded_channel::<StreamMessage>();
				let listener = self.listener.clone();
				let handle = tokio::spawn(async move {
					while let Some(message) = rx.recv().await {
						listener.process_message(&message).await;
					}
					tracing::debug!(worker = index, "Partition worker drained");
				});
				(tx, handle)
			})
			.unzip()
	}

	/// Returns a reference to the configuration.
	pub fn config(&self) -> &Config {
		&self.config
	}

	/// Returns a reference to the storage service.
	pub fn storage(&self) -> &Arc<StorageService> {
		&self.storage
	}

	/// Returns a reference to the order store.
	pub fn store(&self) -> &Arc<OrderStore> {
		&self.store
	}

	/// Returns a reference to the order service.
	pub fn orders(&self) -> &Arc<OrderService> {
		&self.orders
	}

	/// Returns a reference to the delivery service.
	pub fn delivery(&self) -> &Arc<DeliveryService> {
		&self.delivery
	}

	/// Returns a reference to the stream listener.
	pub fn listener(&self) -> &Arc<StreamListener> {
		&self.listener
	}

	/// Returns a reference to the pipeline counters.
	pub fn metrics(&self) -> &Arc<PipelineMetrics> {
		&self.metrics
	}
}
