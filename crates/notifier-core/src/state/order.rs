//! Order state machine implementation.
//!
//! Orders move forward through PENDING -> APPROVED -> SHIPPED -> DELIVERED.
//! CANCELLED is reachable from any non-terminal status, and nothing ever
//! returns to PENDING.

use crate::store::OrderStore;
use crate::OrderError;
use notifier_types::{OrderSnapshot, OrderStatus};
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

/// Rejected status change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
	#[error("Illegal transition from {from} to {to}: {reason}")]
	IllegalTransition {
		from: OrderStatus,
		to: OrderStatus,
		reason: &'static str,
	},
}

/// Checks whether an order in `current` may move to `target`.
///
/// Pure and deterministic: returns `target` when the move is legal.
pub fn transition(current: OrderStatus, target: OrderStatus) -> Result<OrderStatus, TransitionError> {
	use OrderStatus::*;

	let illegal = |reason| {
		Err(TransitionError::IllegalTransition {
			from: current,
			to: target,
			reason,
		})
	};

	match (current, target) {
		(_, Pending) => illegal("cannot revert to PENDING"),
		(Pending, Approved) | (Approved, Shipped) | (Shipped, Delivered) => Ok(target),
		(Pending | Approved | Shipped, Cancelled) => Ok(target),
		(Delivered, Cancelled) => illegal("delivered orders cannot be cancelled"),
		(Cancelled, _) => illegal("cancelled orders are final"),
		(_, Approved) => illegal("only PENDING orders can be approved"),
		(_, Shipped) => illegal("only APPROVED orders can be shipped"),
		(_, Delivered) => illegal("only SHIPPED orders can be delivered"),
	}
}

/// Applies validated status transitions to stored orders.
pub struct OrderStateMachine {
	store: Arc<OrderStore>,
}

impl OrderStateMachine {
	pub fn new(store: Arc<OrderStore>) -> Self {
		Self { store }
	}

	/// Loads the order, validates the transition and saves the new status.
	#[instrument(skip_all, fields(order_id = order_id, target = %target))]
	pub async fn transition_order_status(
		&self,
		order_id: i64,
		target: OrderStatus,
	) -> Result<OrderSnapshot, OrderError> {
		let mut order = self.store.find_by_id(order_id).await?;
		let previous = order.status;

		order.status = transition(previous, target)?;
		let saved = self.store.save(order).await?;

		tracing::info!(from = %previous, to = %saved.status, "Order status updated");
		Ok(saved)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use OrderStatus::*;

	#[test]
	fn test_forward_path() {
		assert_eq!(transition(Pending, Approved), Ok(Approved));
		assert_eq!(transition(Approved, Shipped), Ok(Shipped));
		assert_eq!(transition(Shipped, Delivered), Ok(Delivered));
	}

	#[test]
	fn test_cancel_sources() {
		for from in [Pending, Approved, Shipped] {
			assert_eq!(transition(from, Cancelled), Ok(Cancelled));
		}
		assert!(transition(Delivered, Cancelled).is_err());
		assert!(transition(Cancelled, Cancelled).is_err());
	}

	#[test]
	fn test_pending_is_never_a_target() {
		for from in OrderStatus::all() {
			let err = transition(from, Pending).unwrap_err();
			assert!(err.to_string().contains("cannot revert to PENDING"));
		}
	}

	#[test]
	fn test_skipping_steps_is_illegal() {
		assert!(transition(Pending, Shipped).is_err());
		assert!(transition(Pending, Delivered).is_err());
		assert!(transition(Approved, Delivered).is_err());
		assert!(transition(Approved, Approved).is_err());
		assert!(transition(Delivered, Shipped).is_err());
	}

	#[test]
	fn test_only_listed_pairs_are_legal() {
		let legal = [
			(Pending, Approved),
			(Approved, Shipped),
			(Shipped, Delivered),
			(Pending, Cancelled),
			(Approved, Cancelled),
			(Shipped, Cancelled),
		];
		for from in OrderStatus::all() {
			for to in OrderStatus::all() {
				assert_eq!(
					transition(from, to).is_ok(),
					legal.contains(&(from, to)),
					"{} -> {}",
					from,
					to
				);
			}
		}
	}
}
