//! Order service for the CRUD surface.
//!
//! Thin layer over the order store: validates input, generates order numbers
//! and routes status changes through the state machine. Notifications are not
//! sent from here; they follow from the change records the store publishes.

use crate::state::{OrderStateMachine, TransitionError};
use crate::store::{OrderStore, StoreError};
use notifier_types::{current_timestamp_ms, APIError, NewOrder, OrderSnapshot, OrderStatus};
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

/// Attempts at finding a free order number before giving up.
const ORDER_NUMBER_ATTEMPTS: usize = 3;

/// Errors surfaced to callers of order mutations.
#[derive(Debug, Error)]
pub enum OrderError {
	#[error("Order not found: {0}")]
	NotFound(String),
	#[error(transparent)]
	IllegalTransition(#[from] TransitionError),
	#[error("Invalid order: {0}")]
	Invalid(String),
	#[error("Conflict: {0}")]
	Conflict(String),
	#[error("Storage error: {0}")]
	Storage(String),
}

impl From<StoreError> for OrderError {
	fn from(err: StoreError) -> Self {
		match err {
			StoreError::NotFound(id) => OrderError::NotFound(id),
			StoreError::Conflict { .. }
			| StoreError::DuplicateOrderNumber(_)
			| StoreError::Immutable(_) => OrderError::Conflict(err.to_string()),
			StoreError::Storage(msg) => OrderError::Storage(msg),
		}
	}
}

impl From<OrderError> for APIError {
	fn from(err: OrderError) -> Self {
		let message = err.to_string();
		match err {
			OrderError::NotFound(_) => APIError::NotFound {
				error_type: "ORDER_NOT_FOUND".to_string(),
				message,
			},
			OrderError::IllegalTransition(_) => APIError::UnprocessableEntity {
				error_type: "ILLEGAL_TRANSITION".to_string(),
				message,
			},
			OrderError::Invalid(_) => APIError::BadRequest {
				error_type: "INVALID_ORDER".to_string(),
				message,
			},
			OrderError::Conflict(_) => APIError::Conflict {
				error_type: "CONFLICT".to_string(),
				message,
			},
			OrderError::Storage(_) => APIError::InternalServerError {
				error_type: "STORAGE_ERROR".to_string(),
				message,
			},
		}
	}
}

/// Generates an order number of the form `ORD-<epoch-ms>-<4 digits>`.
pub fn generate_order_number() -> String {
	let suffix = uuid::Uuid::new_v4().as_u128() % 10_000;
	format!("ORD-{}-{:04}", current_timestamp_ms(), suffix)
}

/// Order operations exposed over the API.
pub struct OrderService {
	store: Arc<OrderStore>,
	state_machine: OrderStateMachine,
}

impl OrderService {
	pub fn new(store: Arc<OrderStore>) -> Self {
		Self {
			state_machine: OrderStateMachine::new(store.clone()),
			store,
		}
	}

	/// Creates a PENDING order with a freshly generated order number.
	#[instrument(skip_all, fields(customer = %customer_name))]
	pub async fn create_order(
		&self,
		customer_name: &str,
		total_amount: Decimal,
		notes: Option<String>,
	) -> Result<OrderSnapshot, OrderError> {
		let customer_name = customer_name.trim();
		if customer_name.is_empty() {
			return Err(OrderError::Invalid("customer_name must not be empty".into()));
		}
		if total_amount <= Decimal::ZERO {
			return Err(OrderError::Invalid("total_amount must be positive".into()));
		}

		let mut attempt = 0;
		loop {
			attempt += 1;
			let new_order = NewOrder {
				order_number: generate_order_number(),
				customer_name: customer_name.to_string(),
				total_amount,
				notes: notes.clone(),
			};

			match self.store.create(new_order).await {
				Ok(order) => {
					tracing::info!(
						order_id = order.id,
						order_number = %order.order_number,
						"Order created"
					);
					return Ok(order);
				},
				Err(StoreError::DuplicateOrderNumber(number)) if attempt < ORDER_NUMBER_ATTEMPTS => {
					tracing::debug!(%number, "Order number taken, retrying");
				},
				Err(e) => return Err(e.into()),
			}
		}
	}

	/// Moves an order to `target`, rejecting transitions the lifecycle forbids.
	pub async fn update_status(
		&self,
		order_id: i64,
		target: OrderStatus,
	) -> Result<OrderSnapshot, OrderError> {
		self.state_machine
			.transition_order_status(order_id, target)
			.await
	}

	pub async fn get_order(&self, order_id: i64) -> Result<OrderSnapshot, OrderError> {
		Ok(self.store.find_by_id(order_id).await?)
	}

	pub async fn get_order_by_number(&self, order_number: &str) -> Result<OrderSnapshot, OrderError> {
		Ok(self.store.find_by_order_number(order_number).await?)
	}

	/// Lists orders, optionally restricted to one status.
	pub async fn list_orders(
		&self,
		status: Option<OrderStatus>,
	) -> Result<Vec<OrderSnapshot>, OrderError> {
		let orders = match status {
			Some(status) => self.store.find_by_status(status).await?,
			None => self.store.list().await?,
		};
		Ok(orders)
	}

	#[instrument(skip(self))]
	pub async fn delete_order(&self, order_id: i64) -> Result<OrderSnapshot, OrderError> {
		let deleted = self.store.delete(order_id).await?;
		tracing::info!(order_number = %deleted.order_number, "Order deleted");
		Ok(deleted)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use notifier_storage::implementations::memory::MemoryStorage;
	use notifier_storage::StorageService;
	use std::str::FromStr;

	fn service() -> OrderService {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		OrderService::new(Arc::new(OrderStore::new(storage)))
	}

	#[test]
	fn test_order_number_format() {
		let number = generate_order_number();
		let parts: Vec<_> = number.split('-').collect();
		assert_eq!(parts.len(), 3);
		assert_eq!(parts[0], "ORD");
		assert!(parts[1].parse::<i64>().is_ok());
		assert_eq!(parts[2].len(), 4);
		assert!(parts[2].chars().all(|c| c.is_ascii_digit()));
	}

	#[tokio::test]
	async fn test_create_validates_input() {
		let service = service();
		assert!(matches!(
			service.create_order("   ", Decimal::ONE, None).await,
			Err(OrderError::Invalid(_))
		));
		assert!(matches!(
			service.create_order("Kim", Decimal::ZERO, None).await,
			Err(OrderError::Invalid(_))
		));

		let order = service
			.create_order(" Kim ", Decimal::from_str("15000.50").unwrap(), None)
			.await
			.unwrap();
		assert_eq!(order.customer_name, "Kim");
		assert_eq!(order.status, OrderStatus::Pending);
		assert!(order.order_number.starts_with("ORD-"));
	}

	#[tokio::test]
	async fn test_illegal_transition_is_surfaced() {
		let service = service();
		let order = service.create_order("Kim", Decimal::ONE, None).await.unwrap();

		let err = service
			.update_status(order.id, OrderStatus::Shipped)
			.await
			.unwrap_err();
		assert!(matches!(err, OrderError::IllegalTransition(_)));

		let api: APIError = err.into();
		assert_eq!(api.status_code().as_u16(), 422);

		// Rejected transitions leave the stored order untouched
		assert_eq!(
			service.get_order(order.id).await.unwrap().status,
			OrderStatus::Pending
		);
	}

	#[tokio::test]
	async fn test_lifecycle_and_queries() {
		let service = service();
		let first = service.create_order("Kim", Decimal::ONE, None).await.unwrap();
		let second = service.create_order("Lee", Decimal::TEN, None).await.unwrap();

		service.update_status(first.id, OrderStatus::Approved).await.unwrap();
		let shipped = service.update_status(first.id, OrderStatus::Shipped).await.unwrap();
		assert_eq!(shipped.status, OrderStatus::Shipped);

		let pending = service.list_orders(Some(OrderStatus::Pending)).await.unwrap();
		assert_eq!(pending.len(), 1);
		assert_eq!(pending[0].id, second.id);
		assert_eq!(service.list_orders(None).await.unwrap().len(), 2);

		let by_number = service.get_order_by_number(&second.order_number).await.unwrap();
		assert_eq!(by_number.id, second.id);

		service.delete_order(second.id).await.unwrap();
		let err = service.get_order(second.id).await.unwrap_err();
		assert!(matches!(err, OrderError::NotFound(_)));
		assert_eq!(APIError::from(err).status_code().as_u16(), 404);
	}
}
