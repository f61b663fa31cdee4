//! Notification dispatcher.
//!
//! Decides which notifications a business event produces and hands them to the
//! delivery service. Each action is attempted independently: an SMS failing
//! after a successful email (or the reverse) is recorded in the outcome and
//! nothing more.

use notifier_delivery::{ContactResolver, DeliveryService};
use notifier_types::{
	ActionStatus, BusinessEvent, Channel, DispatchOutcome, OrderStatus, OrderSummary,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::instrument;

/// Subject of the confirmation email sent for new orders.
pub const ORDER_RECEIVED_SUBJECT: &str = "order received";
/// Subject of the email sent for status changes.
pub const STATUS_UPDATE_SUBJECT: &str = "order status update";
/// Audit action recorded for deleted orders.
pub const ORDER_DELETED_ACTION: &str = "ORDER_DELETED";

/// Customer-facing message for a new status.
pub fn status_message(status: OrderStatus) -> &'static str {
	match status {
		OrderStatus::Approved => "Your order has been approved.",
		OrderStatus::Shipped => "Your order has been shipped.",
		OrderStatus::Delivered => "Your order has been delivered.",
		OrderStatus::Cancelled => "Your order has been cancelled.",
		_ => "Your order status has changed.",
	}
}

/// Routes business events to email, SMS and audit actions.
pub struct NotificationDispatcher {
	delivery: Arc<DeliveryService>,
	contacts: Arc<dyn ContactResolver>,
}

impl NotificationDispatcher {
	pub fn new(delivery: Arc<DeliveryService>, contacts: Arc<dyn ContactResolver>) -> Self {
		Self { delivery, contacts }
	}

	/// Dispatches one event and returns the result of every action attempted.
	#[instrument(skip_all, fields(order_id = event.order().order_id, kind = event.kind().as_str()))]
	pub async fn dispatch(&self, event: &BusinessEvent) -> DispatchOutcome {
		let order = event.order();
		let mut outcome = DispatchOutcome::new(order.order_id, event.kind());

		match event {
			BusinessEvent::Created {
				order,
				total_amount,
			} => self.handle_created(order, *total_amount, &mut outcome).await,
			BusinessEvent::StatusChanged {
				order,
				previous_status,
			} => {
				self.handle_status_changed(order, *previous_status, &mut outcome)
					.await
			},
			BusinessEvent::Deleted { order } => self.handle_deleted(order, &mut outcome).await,
		}

		outcome
	}

	async fn handle_created(
		&self,
		order: &OrderSummary,
		total_amount: Decimal,
		outcome: &mut DispatchOutcome,
	) {
		tracing::info!(
			order_number = %order.order_number,
			customer = %order.customer_name,
			amount = %total_amount,
			status = %order.status,
			"New order, sending confirmation email"
		);

		let body = format!("Order {} has been received.", order.order_number);
		self.email(order, ORDER_RECEIVED_SUBJECT, &body, outcome)
			.await;
	}

	async fn handle_status_changed(
		&self,
		order: &OrderSummary,
		previous_status: OrderStatus,
		outcome: &mut DispatchOutcome,
	) {
		tracing::info!(
			order_number = %order.order_number,
			customer = %order.customer_name,
			from = %previous_status,
			to = %order.status,
			"Order status changed, sending status update"
		);

		let body = format!(
			"Order {}: {}",
			order.order_number,
			status_message(order.status)
		);
		self.email(order, STATUS_UPDATE_SUBJECT, &body, outcome)
			.await;

		if order.status == OrderStatus::Shipped {
			let status = match self.contacts.phone_for(order) {
				Ok(phone) => {
					let message = format!("[Shipped] {} is on its way.", order.order_number);
					self.delivery.send_sms(&phone, &message).await
				},
				Err(e) => ActionStatus::Failed(e.to_string()),
			};
			outcome.record(Channel::Sms, status);
		}
	}

	async fn handle_deleted(&self, order: &OrderSummary, outcome: &mut DispatchOutcome) {
		tracing::info!(
			order_number = %order.order_number,
			customer = %order.customer_name,
			"Order deleted, writing audit entry"
		);

		let details = format!("Order {} was deleted", order.order_number);
		let status = self
			.delivery
			.audit_log(ORDER_DELETED_ACTION, order.order_id, &details)
			.await;
		outcome.record(Channel::Audit, status);
	}

	async fn email(
		&self,
		order: &OrderSummary,
		subject: &str,
		body: &str,
		outcome: &mut DispatchOutcome,
	) {
		let status = match self.contacts.email_for(order) {
			Ok(to) => self.delivery.send_email(&to, subject, body).await,
			Err(e) => ActionStatus::Failed(e.to_string()),
		};
		outcome.record(Channel::Email, status);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_status_messages() {
		assert_eq!(
			status_message(OrderStatus::Approved),
			"Your order has been approved."
		);
		assert_eq!(
			status_message(OrderStatus::Cancelled),
			"Your order has been cancelled."
		);
		assert_eq!(
			status_message(OrderStatus::Pending),
			"Your order status has changed."
		);
	}
}
