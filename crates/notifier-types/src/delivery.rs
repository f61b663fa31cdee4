//! Notification delivery types.
//!
//! This module defines the outbound actions the dispatcher decides on, the
//! channels they travel through, and the per-event outcome of dispatching them.

use crate::EventKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Outbound channel a notification is delivered through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
	/// Customer email.
	Email,
	/// Customer text message.
	Sms,
	/// Internal audit log.
	Audit,
}

impl Channel {
	/// Returns the configuration name of the channel.
	pub fn as_str(&self) -> &'static str {
		match self {
			Channel::Email => "email",
			Channel::Sms => "sms",
			Channel::Audit => "audit",
		}
	}

	/// Returns an iterator over all Channel variants.
	pub fn all() -> impl Iterator<Item = Self> {
		[Self::Email, Self::Sms, Self::Audit].into_iter()
	}
}

impl fmt::Display for Channel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Channel {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"email" => Ok(Self::Email),
			"sms" => Ok(Self::Sms),
			"audit" => Ok(Self::Audit),
			_ => Err(()),
		}
	}
}

/// A single outbound notification effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "channel", rename_all = "lowercase")]
pub enum Notification {
	Email {
		to: String,
		subject: String,
		body: String,
	},
	Sms {
		to: String,
		message: String,
	},
	Audit {
		action: String,
		order_id: i64,
		details: String,
	},
}

impl Notification {
	/// Returns the channel this notification must be sent through.
	pub fn channel(&self) -> Channel {
		match self {
			Notification::Email { .. } => Channel::Email,
			Notification::Sms { .. } => Channel::Sms,
			Notification::Audit { .. } => Channel::Audit,
		}
	}
}

/// Result of one dispatch action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionStatus {
	/// The sender accepted the notification.
	Delivered,
	/// The action could not be completed.
	Failed(String),
	/// The sender did not answer within the configured timeout.
	TimedOut,
}

/// Outcome of a single action within a dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
	pub channel: Channel,
	pub status: ActionStatus,
}

impl ActionResult {
	pub fn is_delivered(&self) -> bool {
		self.status == ActionStatus::Delivered
	}
}

/// Aggregated outcome of dispatching one business event.
///
/// A partial failure is reported here but never escalated: the message that
/// produced the event is considered processed either way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchOutcome {
	pub order_id: i64,
	pub kind: EventKind,
	pub actions: Vec<ActionResult>,
}

impl DispatchOutcome {
	pub fn new(order_id: i64, kind: EventKind) -> Self {
		Self {
			order_id,
			kind,
			actions: Vec::new(),
		}
	}

	/// Appends the result of one action.
	pub fn record(&mut self, channel: Channel, status: ActionStatus) {
		self.actions.push(ActionResult { channel, status });
	}

	/// Number of actions attempted on the given channel.
	pub fn count(&self, channel: Channel) -> usize {
		self.actions.iter().filter(|a| a.channel == channel).count()
	}

	/// Actions that did not deliver.
	pub fn failures(&self) -> impl Iterator<Item = &ActionResult> {
		self.actions.iter().filter(|a| !a.is_delivered())
	}

	/// Whether every attempted action delivered.
	pub fn is_complete(&self) -> bool {
		self.failures().next().is_none()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_outcome_tracks_partial_failure() {
		let mut outcome = DispatchOutcome::new(3, EventKind::StatusChanged);
		outcome.record(Channel::Email, ActionStatus::Delivered);
		outcome.record(Channel::Sms, ActionStatus::TimedOut);

		assert_eq!(outcome.count(Channel::Email), 1);
		assert_eq!(outcome.count(Channel::Sms), 1);
		assert_eq!(outcome.count(Channel::Audit), 0);
		assert!(!outcome.is_complete());
		assert_eq!(outcome.failures().count(), 1);
	}

	#[test]
	fn test_notification_channel() {
		let sms = Notification::Sms {
			to: "+1".into(),
			message: "hi".into(),
		};
		assert_eq!(sms.channel(), Channel::Sms);
		assert_eq!("audit".parse::<Channel>(), Ok(Channel::Audit));
	}
}
