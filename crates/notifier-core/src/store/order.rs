//! Order store with change capture.
//!
//! Orders are kept in the storage service under three namespaces: the rows
//! themselves keyed by id, an index from order number to id, and the id
//! sequence. Every successful mutation is published onto the attached
//! [`ChangeFeed`] as a change envelope keyed by order id, which is what the
//! notification pipeline consumes.

use notifier_storage::{StorageError, StorageService};
use notifier_types::{
	current_timestamp_ms, ChangeFeed, ChangeRecord, NewOrder, OrderSnapshot, OrderStatus,
	SourceMetadata, StorageKey,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

/// Table name stamped on every published change.
pub const ORDERS_TABLE: &str = "orders";

const ORDER_SEQUENCE: &str = "orders";

#[derive(Debug, Error)]
pub enum StoreError {
	#[error("Order not found: {0}")]
	NotFound(String),
	#[error("Order {id} was modified concurrently (expected updated_at {expected}, found {actual})")]
	Conflict { id: i64, expected: i64, actual: i64 },
	#[error("Order number already exists: {0}")]
	DuplicateOrderNumber(String),
	#[error("Field '{0}' cannot be changed")]
	Immutable(&'static str),
	#[error("Storage error: {0}")]
	Storage(String),
}

impl From<StorageError> for StoreError {
	fn from(err: StorageError) -> Self {
		StoreError::Storage(err.to_string())
	}
}

/// Keyed order store publishing its mutations as change records.
pub struct OrderStore {
	storage: Arc<StorageService>,
	feed: Option<ChangeFeed>,
	connector: String,
	// Serialises read-compare-write sequences
	write_lock: Mutex<()>,
}

impl OrderStore {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self {
			storage,
			feed: None,
			connector: "notifier".to_string(),
			write_lock: Mutex::new(()),
		}
	}

	/// Publishes every subsequent mutation onto `feed`.
	pub fn with_change_feed(mut self, feed: ChangeFeed, connector: impl Into<String>) -> Self {
		self.feed = Some(feed);
		self.connector = connector.into();
		self
	}

	/// Feed mutations are published onto, if any.
	pub fn change_feed(&self) -> Option<&ChangeFeed> {
		self.feed.as_ref()
	}

	/// Inserts a new order in PENDING status and assigns it the next id.
	pub async fn create(&self, new_order: NewOrder) -> Result<OrderSnapshot, StoreError> {
		let _guard = self.write_lock.lock().await;

		if self
			.storage
			.exists(StorageKey::OrderByNumber.as_str(), &new_order.order_number)
			.await?
		{
			return Err(StoreError::DuplicateOrderNumber(new_order.order_number));
		}

		let id = self.next_id().await?;
		let now = current_timestamp_ms();
		let order = OrderSnapshot {
			id,
			order_number: new_order.order_number,
			customer_name: new_order.customer_name,
			total_amount: new_order.total_amount,
			status: OrderStatus::Pending,
			notes: new_order.notes,
			created_at: now,
			updated_at: now,
		};

		self.storage
			.store(StorageKey::Orders.as_str(), &id.to_string(), &order)
			.await?;
		if let Err(e) = self
			.storage
			.store(StorageKey::OrderByNumber.as_str(), &order.order_number, &id)
			.await
		{
			// A row without its number index must not survive
			if let Err(cleanup) = self
				.storage
				.remove(StorageKey::Orders.as_str(), &id.to_string())
				.await
			{
				tracing::error!(order_id = id, error = %cleanup, "Failed to remove unindexed order");
			}
			return Err(e.into());
		}

		self.publish(ChangeRecord::created(order.clone(), self.source(now), now));
		Ok(order)
	}

	pub async fn find_by_id(&self, id: i64) -> Result<OrderSnapshot, StoreError> {
		match self
			.storage
			.retrieve(StorageKey::Orders.as_str(), &id.to_string())
			.await
		{
			Ok(order) => Ok(order),
			Err(StorageError::NotFound) => Err(StoreError::NotFound(format!("id {}", id))),
			Err(e) => Err(e.into()),
		}
	}

	pub async fn find_by_order_number(&self, order_number: &str) -> Result<OrderSnapshot, StoreError> {
		let id: i64 = match self
			.storage
			.retrieve(StorageKey::OrderByNumber.as_str(), order_number)
			.await
		{
			Ok(id) => id,
			Err(StorageError::NotFound) => {
				return Err(StoreError::NotFound(format!("order number {}", order_number)));
			},
			Err(e) => return Err(e.into()),
		};
		self.find_by_id(id).await
	}

	/// All orders in ascending id order.
	pub async fn list(&self) -> Result<Vec<OrderSnapshot>, StoreError> {
		let mut orders: Vec<OrderSnapshot> =
			self.storage.list(StorageKey::Orders.as_str()).await?;
		orders.sort_by_key(|o| o.id);
		Ok(orders)
	}

	pub async fn find_by_status(&self, status: OrderStatus) -> Result<Vec<OrderSnapshot>, StoreError> {
		let mut orders = self.list().await?;
		orders.retain(|o| o.status == status);
		Ok(orders)
	}

	/// Persists a modified order.
	///
	/// `order.updated_at` must still match the stored row, otherwise another
	/// writer got there first and [`StoreError::Conflict`] is returned. On
	/// success `updated_at` is refreshed and always strictly increases.
	pub async fn save(&self, mut order: OrderSnapshot) -> Result<OrderSnapshot, StoreError> {
		let _guard = self.write_lock.lock().await;

		let current = self.find_by_id(order.id).await?;
		if current.updated_at != order.updated_at {
			return Err(StoreError::Conflict {
				id: order.id,
				expected: order.updated_at,
				actual: current.updated_at,
			});
		}
		if current.order_number != order.order_number {
			return Err(StoreError::Immutable("order_number"));
		}

		let now = current_timestamp_ms();
		order.created_at = current.created_at;
		order.updated_at = now.max(current.updated_at + 1);

		self.storage
			.update(StorageKey::Orders.as_str(), &order.id.to_string(), &order)
			.await?;

		self.publish(ChangeRecord::updated(
			current,
			order.clone(),
			self.source(now),
			now,
		));
		Ok(order)
	}

	/// Removes an order and returns its last state.
	pub async fn delete(&self, id: i64) -> Result<OrderSnapshot, StoreError> {
		let _guard = self.write_lock.lock().await;

		let order = self.find_by_id(id).await?;
		self.storage
			.remove(StorageKey::Orders.as_str(), &id.to_string())
			.await?;
		self.storage
			.remove(StorageKey::OrderByNumber.as_str(), &order.order_number)
			.await?;

		let now = current_timestamp_ms();
		self.publish(ChangeRecord::deleted(order.clone(), self.source(now), now));
		Ok(order)
	}

	/// Publishes a snapshot record for every stored order.
	///
	/// Mirrors the initial load a capture connector performs when it starts.
	pub async fn emit_snapshot(&self) -> Result<usize, StoreError> {
		let orders = self.list().await?;
		let count = orders.len();
		for order in orders {
			let now = current_timestamp_ms();
			self.publish(ChangeRecord::snapshot(order, self.source(now), now));
		}
		tracing::info!(rows = count, "Published initial snapshot");
		Ok(count)
	}

	async fn next_id(&self) -> Result<i64, StoreError> {
		let current: i64 = match self
			.storage
			.retrieve(StorageKey::Sequences.as_str(), ORDER_SEQUENCE)
			.await
		{
			Ok(value) => value,
			Err(StorageError::NotFound) => 0,
			Err(e) => return Err(e.into()),
		};
		let next = current + 1;
		self.storage
			.store(StorageKey::Sequences.as_str(), ORDER_SEQUENCE, &next)
			.await?;
		Ok(next)
	}

	fn source(&self, ts_ms: i64) -> SourceMetadata {
		SourceMetadata {
			version: Some(env!("CARGO_PKG_VERSION").to_string()),
			connector: Some(self.connector.clone()),
			name: None,
			db: None,
			table: Some(ORDERS_TABLE.to_string()),
			ts_ms: Some(ts_ms),
		}
	}

	fn publish(&self, record: ChangeRecord) {
		let Some(feed) = &self.feed else {
			return;
		};
		let key = record
			.after
			.as_ref()
			.or(record.before.as_ref())
			.map(|o| o.id.to_string());

		match serde_json::to_vec(&record) {
			Ok(payload) => {
				let receivers = feed.publish(key, payload);
				tracing::debug!(op = %record.op, receivers, "Published order change");
			},
			Err(e) => tracing::warn!(error = %e, "Failed to encode order change"),
		}
	}
}
