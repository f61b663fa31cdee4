//! HTTP server for the notifier API.
//!
//! Exposes order CRUD under `/api/orders` and the pipeline counters under
//! `/api/stats`. Every successful response is wrapped in an [`ApiResponse`].

use axum::{
	extract::{Path, Query, State},
	http::StatusCode,
	response::Json,
	routing::{get, patch},
	Router,
};
use notifier_config::ApiConfig;
use notifier_core::{NotifierEngine, PipelineStats};
use notifier_types::{
	APIError, ApiResponse, CreateOrderRequest, ListOrdersQuery, OrderResponse,
	UpdateOrderStatusRequest,
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Reference to the notifier engine for processing requests.
	pub engine: Arc<NotifierEngine>,
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, APIError>;

/// Builds the API router.
pub fn router(engine: Arc<NotifierEngine>) -> Router {
	Router::new()
		.nest(
			"/api",
			Router::new()
				.route("/orders", get(handle_list_orders).post(handle_create_order))
				.route(
					"/orders/{id}",
					get(handle_get_order).delete(handle_delete_order),
				)
				.route("/orders/{id}/status", patch(handle_update_status))
				.route("/orders/number/{order_number}", get(handle_get_order_by_number))
				.route("/stats", get(handle_stats)),
		)
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(CorsLayer::permissive()),
		)
		.with_state(AppState { engine })
}

/// Binds the API listener.
pub async fn bind(api_config: &ApiConfig) -> std::io::Result<TcpListener> {
	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;
	tracing::info!("Order notifier API server starting on {}", listener.local_addr()?);
	Ok(listener)
}

/// Serves the API on `listener` until `shutdown` completes.
pub async fn serve<F>(
	listener: TcpListener,
	engine: Arc<NotifierEngine>,
	shutdown: F,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
	F: Future<Output = ()> + Send + 'static,
{
	axum::serve(listener, router(engine))
		.with_graceful_shutdown(async move {
			shutdown.await;
			tracing::info!("Shutting down API server");
		})
		.await?;

	Ok(())
}

async fn handle_create_order(
	State(state): State<AppState>,
	Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderResponse>>), APIError> {
	let order = crate::apis::order::create_order(&state.engine, request).await?;
	Ok((
		StatusCode::CREATED,
		Json(ApiResponse::success("Order created", order)),
	))
}

async fn handle_list_orders(
	State(state): State<AppState>,
	Query(query): Query<ListOrdersQuery>,
) -> ApiResult<Vec<OrderResponse>> {
	let orders = crate::apis::order::list_orders(&state.engine, query).await?;
	Ok(Json(ApiResponse::success(
		format!("Found {} orders", orders.len()),
		orders,
	)))
}

async fn handle_get_order(
	State(state): State<AppState>,
	Path(id): Path<i64>,
) -> ApiResult<OrderResponse> {
	let order = crate::apis::order::get_order(&state.engine, id).await?;
	Ok(Json(ApiResponse::success("Order found", order)))
}

async fn handle_get_order_by_number(
	State(state): State<AppState>,
	Path(order_number): Path<String>,
) -> ApiResult<OrderResponse> {
	let order = crate::apis::order::get_order_by_number(&state.engine, &order_number).await?;
	Ok(Json(ApiResponse::success("Order found", order)))
}

async fn handle_update_status(
	State(state): State<AppState>,
	Path(id): Path<i64>,
	Json(request): Json<UpdateOrderStatusRequest>,
) -> ApiResult<OrderResponse> {
	let order = crate::apis::order::update_order_status(&state.engine, id, request).await?;
	Ok(Json(ApiResponse::success("Order status updated", order)))
}

async fn handle_delete_order(
	State(state): State<AppState>,
	Path(id): Path<i64>,
) -> ApiResult<OrderResponse> {
	let order = crate::apis::order::delete_order(&state.engine, id).await?;
	Ok(Json(ApiResponse::success("Order deleted", order)))
}

async fn handle_stats(State(state): State<AppState>) -> Json<ApiResponse<PipelineStats>> {
	Json(ApiResponse::success(
		"Pipeline statistics",
		state.engine.metrics().snapshot(),
	))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::factory_registry::build_notifier_from_config;
	use axum::body::Body;
	use axum::http::{Method, Request};
	use notifier_config::Config;
	use serde_json::Value;
	use std::str::FromStr;
	use tower::ServiceExt;

	const CONFIG: &str = r#"
[service]
id = "api-test"

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
"#;

	fn app() -> Router {
		let config = Config::from_str(CONFIG).unwrap();
		router(Arc::new(build_notifier_from_config(config).unwrap()))
	}

	async fn call(app: &Router, method: Method, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
		let mut request = Request::builder().method(method).uri(uri);
		let body = match body {
			Some(json) => {
				request = request.header("content-type", "application/json");
				Body::from(json.to_string())
			},
			None => Body::empty(),
		};
		let response = app.clone().oneshot(request.body(body).unwrap()).await.unwrap();
		let status = response.status();
		let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
			.await
			.unwrap();
		let json = if bytes.is_empty() {
			Value::Null
		} else {
			serde_json::from_slice(&bytes).unwrap()
		};
		(status, json)
	}

	#[tokio::test]
	async fn test_order_crud() {
		let app = app();

		let (status, created) = call(
			&app,
			Method::POST,
			"/api/orders",
			Some(r#"{"customer_name": "Kim", "total_amount": "15000.50"}"#),
		)
		.await;
		assert_eq!(status, StatusCode::CREATED);
		assert_eq!(created["success"], true);
		assert_eq!(created["data"]["status"], "PENDING");
		assert_eq!(created["data"]["total_amount"], "15000.50");
		let id = created["data"]["id"].as_i64().unwrap();
		let number = created["data"]["order_number"].as_str().unwrap().to_string();

		let (status, fetched) = call(&app, Method::GET, &format!("/api/orders/{}", id), None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(fetched["data"]["order_number"], number.as_str());

		let (status, by_number) = call(
			&app,
			Method::GET,
			&format!("/api/orders/number/{}", number),
			None,
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(by_number["data"]["id"], id);

		let (status, approved) = call(
			&app,
			Method::PATCH,
			&format!("/api/orders/{}/status", id),
			Some(r#"{"status": "APPROVED"}"#),
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(approved["data"]["status"], "APPROVED");

		let (status, listed) = call(&app, Method::GET, "/api/orders?status=APPROVED", None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(listed["data"].as_array().unwrap().len(), 1);

		let (status, _) = call(&app, Method::DELETE, &format!("/api/orders/{}", id), None).await;
		assert_eq!(status, StatusCode::OK);

		let (status, missing) = call(&app, Method::GET, &format!("/api/orders/{}", id), None).await;
		assert_eq!(status, StatusCode::NOT_FOUND);
		assert_eq!(missing["success"], false);
		assert_eq!(missing["error"], "ORDER_NOT_FOUND");
	}

	#[tokio::test]
	async fn test_illegal_transition_is_unprocessable() {
		let app = app();

		let (_, created) = call(
			&app,
			Method::POST,
			"/api/orders",
			Some(r#"{"customer_name": "Lee", "total_amount": 10}"#),
		)
		.await;
		let id = created["data"]["id"].as_i64().unwrap();

		let (status, body) = call(
			&app,
			Method::PATCH,
			&format!("/api/orders/{}/status", id),
			Some(r#"{"status": "DELIVERED"}"#),
		)
		.await;
		assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
		assert_eq!(body["error"], "ILLEGAL_TRANSITION");
	}

	#[tokio::test]
	async fn test_invalid_order_is_rejected() {
		let app = app();

		let (status, body) = call(
			&app,
			Method::POST,
			"/api/orders",
			Some(r#"{"customer_name": "Kim", "total_amount": "-1"}"#),
		)
		.await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "INVALID_ORDER");
	}

	#[tokio::test]
	async fn test_stats_endpoint() {
		let app = app();

		let (status, body) = call(&app, Method::GET, "/api/stats", None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["data"]["received"], 0);
		assert_eq!(body["data"]["events"], 0);
	}
}
