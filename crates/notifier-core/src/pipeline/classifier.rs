//! Event classification.
//!
//! Turns a decoded change record into at most one business event. Updates are
//! diffed: a row rewrite that leaves the status untouched (notes edited,
//! timestamp bumped) is not worth notifying about. The classifier does not
//! assume the state machine was enforced upstream; any before/after status pair
//! that differs produces a status change.

use notifier_types::{BusinessEvent, ChangeRecord, Operation, OrderSummary};
use std::fmt;

/// Why a record produced no event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
	/// Update that did not change the status.
	NoStatusChange,
	/// Initial-load record.
	InitialLoad,
	/// The snapshot the operation requires is absent.
	MissingSnapshot {
		op: Operation,
		side: &'static str,
	},
	/// Operation tag outside the known set.
	UnknownOperation(String),
}

impl SkipReason {
	/// Whether the skip should be surfaced as a warning rather than a routine skip.
	pub fn is_warning(&self) -> bool {
		matches!(self, SkipReason::UnknownOperation(_))
	}
}

impl fmt::Display for SkipReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SkipReason::NoStatusChange => f.write_str("status unchanged"),
			SkipReason::InitialLoad => f.write_str("initial load"),
			SkipReason::MissingSnapshot { op, side } => {
				write!(f, "'{}' record without {} snapshot", op, side)
			},
			SkipReason::UnknownOperation(tag) => write!(f, "unknown operation '{}'", tag),
		}
	}
}

/// Result of classifying one change record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
	Event(BusinessEvent),
	Skip(SkipReason),
}

impl Classification {
	/// Returns the event, if one was produced.
	pub fn into_event(self) -> Option<BusinessEvent> {
		match self {
			Classification::Event(event) => Some(event),
			Classification::Skip(_) => None,
		}
	}
}

/// Classifies a change record.
pub fn classify(record: ChangeRecord) -> Classification {
	let ChangeRecord {
		op, before, after, ..
	} = record;

	match op {
		Operation::Create => match after {
			Some(after) => Classification::Event(BusinessEvent::Created {
				total_amount: after.total_amount,
				order: OrderSummary::from(&after),
			}),
			None => missing(op, "after"),
		},
		Operation::Update => match (before, after) {
			(Some(before), Some(after)) if before.status == after.status => {
				Classification::Skip(SkipReason::NoStatusChange)
			},
			(Some(before), Some(after)) => Classification::Event(BusinessEvent::StatusChanged {
				order: OrderSummary::from(&after),
				previous_status: before.status,
			}),
			(None, _) => missing(op, "before"),
			(_, None) => missing(op, "after"),
		},
		Operation::Delete => match before {
			Some(before) => Classification::Event(BusinessEvent::Deleted {
				order: OrderSummary::from(&before),
			}),
			None => missing(op, "before"),
		},
		Operation::Snapshot => Classification::Skip(SkipReason::InitialLoad),
		Operation::Unknown(tag) => Classification::Skip(SkipReason::UnknownOperation(tag)),
	}
}

fn missing(op: Operation, side: &'static str) -> Classification {
	Classification::Skip(SkipReason::MissingSnapshot { op, side })
}

#[cfg(test)]
mod tests {
	use super::*;
	use notifier_types::{OrderSnapshot, OrderStatus, SourceMetadata};
	use rust_decimal::Decimal;

	fn snapshot(id: i64, status: OrderStatus, notes: Option<&str>) -> OrderSnapshot {
		OrderSnapshot {
			id,
			order_number: format!("ORD-{}", id),
			customer_name: "Kim".into(),
			total_amount: Decimal::new(15000, 0),
			status,
			notes: notes.map(String::from),
			created_at: 1,
			updated_at: 2,
		}
	}

	fn record(op: Operation, before: Option<OrderSnapshot>, after: Option<OrderSnapshot>) -> ChangeRecord {
		ChangeRecord {
			op,
			before,
			after,
			source: None,
			ts_ms: 3,
		}
	}

	#[test]
	fn test_create_yields_created() {
		let created = classify(ChangeRecord::created(
			snapshot(1, OrderStatus::Pending, None),
			SourceMetadata::default(),
			3,
		));
		match created {
			Classification::Event(BusinessEvent::Created {
				order,
				total_amount,
			}) => {
				assert_eq!(order.order_id, 1);
				assert_eq!(order.order_number, "ORD-1");
				assert_eq!(order.customer_name, "Kim");
				assert_eq!(order.status, OrderStatus::Pending);
				assert_eq!(total_amount, Decimal::new(15000, 0));
			},
			other => panic!("unexpected classification: {:?}", other),
		}
	}

	#[test]
	fn test_update_with_status_change() {
		let result = classify(record(
			Operation::Update,
			Some(snapshot(1, OrderStatus::Approved, None)),
			Some(snapshot(1, OrderStatus::Shipped, None)),
		));
		match result.into_event() {
			Some(BusinessEvent::StatusChanged {
				order,
				previous_status,
			}) => {
				assert_eq!(previous_status, OrderStatus::Approved);
				assert_eq!(order.status, OrderStatus::Shipped);
			},
			other => panic!("unexpected event: {:?}", other),
		}
	}

	#[test]
	fn test_update_without_status_change_is_skipped() {
		let result = classify(record(
			Operation::Update,
			Some(snapshot(1, OrderStatus::Approved, Some("a"))),
			Some(snapshot(1, OrderStatus::Approved, Some("b"))),
		));
		assert_eq!(result, Classification::Skip(SkipReason::NoStatusChange));
	}

	#[test]
	fn test_every_differing_pair_is_a_status_change() {
		// Including pairs the state machine would never allow
		for from in OrderStatus::all() {
			for to in OrderStatus::all() {
				let result = classify(record(
					Operation::Update,
					Some(snapshot(4, from, None)),
					Some(snapshot(4, to, None)),
				));
				if from == to {
					assert_eq!(result, Classification::Skip(SkipReason::NoStatusChange));
				} else {
					assert!(matches!(
						result,
						Classification::Event(BusinessEvent::StatusChanged { previous_status, ref order })
							if previous_status == from && order.status == to
					));
				}
			}
		}
	}

	#[test]
	fn test_delete_yields_deleted() {
		let result = classify(record(
			Operation::Delete,
			Some(snapshot(5, OrderStatus::Cancelled, None)),
			None,
		));
		match result.into_event() {
			Some(BusinessEvent::Deleted { order }) => {
				assert_eq!(order.order_id, 5);
				assert_eq!(order.order_number, "ORD-5");
			},
			other => panic!("unexpected event: {:?}", other),
		}
	}

	#[test]
	fn test_snapshot_never_notifies() {
		for status in OrderStatus::all() {
			let result = classify(record(
				Operation::Snapshot,
				Some(snapshot(1, OrderStatus::Pending, None)),
				Some(snapshot(1, status, None)),
			));
			assert_eq!(result, Classification::Skip(SkipReason::InitialLoad));
		}
	}

	#[test]
	fn test_missing_sides_are_skipped() {
		let cases = [
			(record(Operation::Create, None, None), "after"),
			(record(Operation::Update, None, Some(snapshot(1, OrderStatus::Shipped, None))), "before"),
			(record(Operation::Update, Some(snapshot(1, OrderStatus::Approved, None)), None), "after"),
			(record(Operation::Delete, None, Some(snapshot(1, OrderStatus::Shipped, None))), "before"),
		];
		for (input, expected_side) in cases {
			match classify(input) {
				Classification::Skip(SkipReason::MissingSnapshot { side, .. }) => {
					assert_eq!(side, expected_side)
				},
				other => panic!("unexpected classification: {:?}", other),
			}
		}
	}

	#[test]
	fn test_unknown_operation_is_a_warning() {
		let result = classify(record(Operation::Unknown("t".into()), None, None));
		match result {
			Classification::Skip(reason) => {
				assert!(reason.is_warning());
				assert_eq!(reason, SkipReason::UnknownOperation("t".into()));
			},
			other => panic!("unexpected classification: {:?}", other),
		}
		assert!(!SkipReason::NoStatusChange.is_warning());
	}
}
