//! Order API implementation.
//!
//! Each function maps one order endpoint onto the order service. Lifecycle
//! violations and lookup failures come back as [`APIError`]s; notifications
//! follow asynchronously from the captured changes.

use notifier_core::NotifierEngine;
use notifier_types::{
	APIError, CreateOrderRequest, ListOrdersQuery, OrderResponse, UpdateOrderStatusRequest,
};
use tracing::{info, warn};

/// Handles POST /api/orders.
pub async fn create_order(
	engine: &NotifierEngine,
	request: CreateOrderRequest,
) -> Result<OrderResponse, APIError> {
	let order = engine
		.orders()
		.create_order(&request.customer_name, request.total_amount, request.notes)
		.await?;
	Ok(order.into())
}

/// Handles GET /api/orders.
pub async fn list_orders(
	engine: &NotifierEngine,
	query: ListOrdersQuery,
) -> Result<Vec<OrderResponse>, APIError> {
	let orders = engine.orders().list_orders(query.status).await?;
	Ok(orders.into_iter().map(OrderResponse::from).collect())
}

/// Handles GET /api/orders/{id}.
pub async fn get_order(engine: &NotifierEngine, id: i64) -> Result<OrderResponse, APIError> {
	Ok(engine.orders().get_order(id).await?.into())
}

/// Handles GET /api/orders/number/{order_number}.
pub async fn get_order_by_number(
	engine: &NotifierEngine,
	order_number: &str,
) -> Result<OrderResponse, APIError> {
	Ok(engine.orders().get_order_by_number(order_number).await?.into())
}

/// Handles PATCH /api/orders/{id}/status.
pub async fn update_order_status(
	engine: &NotifierEngine,
	id: i64,
	request: UpdateOrderStatusRequest,
) -> Result<OrderResponse, APIError> {
	info!(order_id = id, target = %request.status, "Status change requested");

	match engine.orders().update_status(id, request.status).await {
		Ok(order) => Ok(order.into()),
		Err(e) => {
			warn!(order_id = id, "Status change rejected: {}", e);
			Err(e.into())
		},
	}
}

/// Handles DELETE /api/orders/{id}.
pub async fn delete_order(engine: &NotifierEngine, id: i64) -> Result<OrderResponse, APIError> {
	Ok(engine.orders().delete_order(id).await?.into())
}
