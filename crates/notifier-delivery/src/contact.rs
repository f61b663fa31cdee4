//! Contact lookup for customer notifications.
//!
//! The dispatcher only knows who an order belongs to; where to reach that
//! customer is answered here.

use notifier_types::OrderSummary;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContactError {
	#[error("No email address for customer '{0}'")]
	NoEmail(String),
	#[error("No phone number for customer '{0}'")]
	NoPhone(String),
}

/// Resolves customer contact details for an order.
pub trait ContactResolver: Send + Sync {
	fn email_for(&self, order: &OrderSummary) -> Result<String, ContactError>;

	fn phone_for(&self, order: &OrderSummary) -> Result<String, ContactError>;
}

/// Resolver backed by configuration.
///
/// Email addresses are derived from the customer name: lowercased, runs of
/// whitespace collapsed to `.`, followed by `@<domain>`. Phone numbers come
/// from an explicit per-customer table with an optional fallback.
#[derive(Debug, Clone)]
pub struct StaticContactResolver {
	email_domain: String,
	default_phone: Option<String>,
	phones: HashMap<String, String>,
}

impl StaticContactResolver {
	pub fn new(
		email_domain: impl Into<String>,
		default_phone: Option<String>,
		phones: HashMap<String, String>,
	) -> Self {
		Self {
			email_domain: email_domain.into(),
			default_phone,
			phones,
		}
	}
}

impl ContactResolver for StaticContactResolver {
	fn email_for(&self, order: &OrderSummary) -> Result<String, ContactError> {
		let local = order
			.customer_name
			.split_whitespace()
			.map(str::to_lowercase)
			.collect::<Vec<_>>()
			.join(".");
		if local.is_empty() {
			return Err(ContactError::NoEmail(order.customer_name.clone()));
		}
		Ok(format!("{}@{}", local, self.email_domain))
	}

	fn phone_for(&self, order: &OrderSummary) -> Result<String, ContactError> {
		self.phones
			.get(&order.customer_name)
			.or(self.default_phone.as_ref())
			.cloned()
			.ok_or_else(|| ContactError::NoPhone(order.customer_name.clone()))
	}
}
