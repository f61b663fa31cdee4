//! Order types for the notifier system.
//!
//! An order moves through a closed set of statuses. The row state of an order at
//! one point in time is captured as an [`OrderSnapshot`], which is what the change
//! stream carries in its `before` and `after` fields.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a status string is not part of the order lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown order status: {0}")]
pub struct UnknownStatus(pub String);

/// Lifecycle status of an order.
///
/// Serialized in upper case (`"PENDING"`, `"SHIPPED"`, ...) to match the column
/// values emitted by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
	/// Order has been placed and awaits approval.
	Pending,
	/// Order has been approved for fulfilment.
	Approved,
	/// Order has left the warehouse.
	Shipped,
	/// Order has reached the customer.
	Delivered,
	/// Order was cancelled before delivery.
	Cancelled,
}

impl OrderStatus {
	/// Returns the wire representation of the status.
	pub fn as_str(&self) -> &'static str {
		match self {
			OrderStatus::Pending => "PENDING",
			OrderStatus::Approved => "APPROVED",
			OrderStatus::Shipped => "SHIPPED",
			OrderStatus::Delivered => "DELIVERED",
			OrderStatus::Cancelled => "CANCELLED",
		}
	}

	/// Returns an iterator over all OrderStatus variants.
	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::Pending,
			Self::Approved,
			Self::Shipped,
			Self::Delivered,
			Self::Cancelled,
		]
		.into_iter()
	}

	/// Whether no further transition can leave this status.
	pub fn is_terminal(&self) -> bool {
		matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for OrderStatus {
	type Err = UnknownStatus;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::all()
			.find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
			.ok_or_else(|| UnknownStatus(s.to_string()))
	}
}

/// Row state of an order at one point in time.
///
/// Snapshots are immutable values: the classifier compares a `before` and an
/// `after` snapshot but never mutates either. `total_amount` is an exact decimal
/// and accepts both JSON strings and JSON numbers without a float round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSnapshot {
	/// Store-assigned identifier.
	pub id: i64,
	/// Unique, human-readable order code.
	pub order_number: String,
	/// Name of the customer who placed the order.
	pub customer_name: String,
	/// Order total.
	#[serde(with = "rust_decimal::serde::arbitrary_precision")]
	pub total_amount: Decimal,
	/// Current lifecycle status.
	pub status: OrderStatus,
	/// Free-text note.
	#[serde(default)]
	pub notes: Option<String>,
	/// Creation time in epoch milliseconds.
	pub created_at: i64,
	/// Last update time in epoch milliseconds.
	pub updated_at: i64,
}

/// Input for creating a new order in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
	pub order_number: String,
	pub customer_name: String,
	pub total_amount: Decimal,
	pub notes: Option<String>,
}
