//! API types for the notifier HTTP endpoints.
//!
//! Request and response bodies for the order CRUD surface, the standard
//! success envelope, and the error type mapped onto HTTP status codes.

use crate::{OrderSnapshot, OrderStatus};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Body of `POST /api/orders`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreateOrderRequest {
	pub customer_name: String,
	#[serde(with = "rust_decimal::serde::arbitrary_precision")]
	pub total_amount: Decimal,
	#[serde(default)]
	pub notes: Option<String>,
}

/// Body of `PATCH /api/orders/{id}/status`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpdateOrderStatusRequest {
	pub status: OrderStatus,
}

/// Query string of `GET /api/orders`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ListOrdersQuery {
	pub status: Option<OrderStatus>,
}

/// Order as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct OrderResponse {
	pub id: i64,
	pub order_number: String,
	pub customer_name: String,
	pub total_amount: Decimal,
	pub status: OrderStatus,
	pub notes: Option<String>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl From<OrderSnapshot> for OrderResponse {
	fn from(order: OrderSnapshot) -> Self {
		Self {
			id: order.id,
			order_number: order.order_number,
			customer_name: order.customer_name,
			total_amount: order.total_amount,
			status: order.status,
			notes: order.notes,
			created_at: DateTime::from_timestamp_millis(order.created_at).unwrap_or_default(),
			updated_at: DateTime::from_timestamp_millis(order.updated_at).unwrap_or_default(),
		}
	}
}

/// Success envelope wrapping every API payload.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiResponse<T> {
	pub success: bool,
	pub message: String,
	pub data: Option<T>,
}

impl<T> ApiResponse<T> {
	pub fn success(message: impl Into<String>, data: T) -> Self {
		Self {
			success: true,
			message: message.into(),
			data: Some(data),
		}
	}
}

/// Error body returned for every failed request.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ErrorResponse {
	pub success: bool,
	pub error: String,
	pub message: String,
}

/// API error mapped onto an HTTP status code.
#[derive(Debug, Clone)]
pub enum APIError {
	/// Malformed or invalid request (400)
	BadRequest { error_type: String, message: String },
	/// Requested order does not exist (404)
	NotFound { error_type: String, message: String },
	/// Concurrent modification or duplicate key (409)
	Conflict { error_type: String, message: String },
	/// Request is well-formed but violates the order lifecycle (422)
	UnprocessableEntity { error_type: String, message: String },
	/// Unexpected failure (500)
	InternalServerError { error_type: String, message: String },
}

impl APIError {
	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> StatusCode {
		match self {
			APIError::BadRequest { .. } => StatusCode::BAD_REQUEST,
			APIError::NotFound { .. } => StatusCode::NOT_FOUND,
			APIError::Conflict { .. } => StatusCode::CONFLICT,
			APIError::UnprocessableEntity { .. } => StatusCode::UNPROCESSABLE_ENTITY,
			APIError::InternalServerError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	/// Convert to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		let (error_type, message) = match self {
			APIError::BadRequest {
				error_type,
				message,
			}
			| APIError::NotFound {
				error_type,
				message,
			}
			| APIError::Conflict {
				error_type,
				message,
			}
			| APIError::UnprocessableEntity {
				error_type,
				message,
			}
			| APIError::InternalServerError {
				error_type,
				message,
			} => (error_type, message),
		};
		ErrorResponse {
			success: false,
			error: error_type.clone(),
			message: message.clone(),
		}
	}
}

impl fmt::Display for APIError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let body = self.to_error_response();
		write!(f, "{} ({}): {}", self.status_code(), body.error, body.message)
	}
}

impl std::error::Error for APIError {}

impl IntoResponse for APIError {
	fn into_response(self) -> Response {
		(self.status_code(), Json(self.to_error_response())).into_response()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_order_response_converts_millis() {
		let snapshot = OrderSnapshot {
			id: 1,
			order_number: "ORD-1".into(),
			customer_name: "Kim".into(),
			total_amount: Decimal::new(15000, 0),
			status: OrderStatus::Pending,
			notes: None,
			created_at: 1_700_000_000_000,
			updated_at: 1_700_000_000_500,
		};
		let response = OrderResponse::from(snapshot);
		assert_eq!(response.created_at.timestamp_millis(), 1_700_000_000_000);
		assert_eq!(response.updated_at.timestamp_millis(), 1_700_000_000_500);
	}

	#[test]
	fn test_error_status_codes() {
		let err = APIError::UnprocessableEntity {
			error_type: "ILLEGAL_TRANSITION".into(),
			message: "cannot revert to PENDING".into(),
		};
		assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
		assert_eq!(err.to_error_response().error, "ILLEGAL_TRANSITION");
		assert!(!err.to_error_response().success);
	}
}
