//! Business events derived from change records.
//!
//! The set of event kinds is closed: the classifier produces exactly one of
//! these per notification-worthy change and the dispatcher matches on them
//! exhaustively.

use crate::{OrderSnapshot, OrderStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Identifying fields shared by every business event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
	pub order_id: i64,
	pub order_number: String,
	pub customer_name: String,
	/// Status of the order at the time of the event.
	pub status: OrderStatus,
}

impl From<&OrderSnapshot> for OrderSummary {
	fn from(snapshot: &OrderSnapshot) -> Self {
		Self {
			order_id: snapshot.id,
			order_number: snapshot.order_number.clone(),
			customer_name: snapshot.customer_name.clone(),
			status: snapshot.status,
		}
	}
}

/// A classified, notification-worthy change to an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BusinessEvent {
	/// A new order was inserted.
	Created {
		order: OrderSummary,
		total_amount: Decimal,
	},
	/// An existing order moved to a different status.
	StatusChanged {
		order: OrderSummary,
		previous_status: OrderStatus,
	},
	/// An order row was removed.
	Deleted { order: OrderSummary },
}

impl BusinessEvent {
	/// Returns the order fields common to all variants.
	pub fn order(&self) -> &OrderSummary {
		match self {
			BusinessEvent::Created { order, .. }
			| BusinessEvent::StatusChanged { order, .. }
			| BusinessEvent::Deleted { order } => order,
		}
	}

	/// Returns the kind of this event.
	pub fn kind(&self) -> EventKind {
		match self {
			BusinessEvent::Created { .. } => EventKind::Created,
			BusinessEvent::StatusChanged { .. } => EventKind::StatusChanged,
			BusinessEvent::Deleted { .. } => EventKind::Deleted,
		}
	}
}

/// Discriminant of [`BusinessEvent`], used in outcomes and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
	Created,
	StatusChanged,
	Deleted,
}

impl EventKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			EventKind::Created => "created",
			EventKind::StatusChanged => "status_changed",
			EventKind::Deleted => "deleted",
		}
	}
}
