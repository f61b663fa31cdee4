//! Stream transport types.
//!
//! A [`StreamMessage`] is the raw, undecoded unit delivered by a change source.
//! The [`ChangeFeed`] is an in-process broadcast channel the order store
//! publishes captured changes onto.

use tokio::sync::broadcast;

/// Raw message received from the change stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMessage {
	/// Topic the message was published on.
	pub topic: String,
	/// Partition key, normally the primary key of the changed row.
	pub key: Option<String>,
	/// Undecoded message body.
	pub payload: Vec<u8>,
}

impl StreamMessage {
	pub fn new(topic: impl Into<String>, key: Option<String>, payload: Vec<u8>) -> Self {
		Self {
			topic: topic.into(),
			key,
			payload,
		}
	}
}

/// Broadcast channel carrying captured changes for one topic.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
	topic: String,
	sender: broadcast::Sender<StreamMessage>,
}

impl ChangeFeed {
	/// Creates a feed for `topic` buffering up to `capacity` messages per subscriber.
	pub fn new(topic: impl Into<String>, capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity.max(1));
		Self {
			topic: topic.into(),
			sender,
		}
	}

	/// Topic every published message is stamped with.
	pub fn topic(&self) -> &str {
		&self.topic
	}

	/// Publishes a payload and returns the number of subscribers that received it.
	///
	/// Publishing with no subscribers is not an error; the change is simply not
	/// observed by anyone.
	pub fn publish(&self, key: Option<String>, payload: Vec<u8>) -> usize {
		self.sender
			.send(StreamMessage::new(self.topic.clone(), key, payload))
			.unwrap_or(0)
	}

	/// Number of live subscribers.
	pub fn subscriber_count(&self) -> usize {
		self.sender.receiver_count()
	}

	/// Subscribes to messages published after this call.
	pub fn subscribe(&self) -> broadcast::Receiver<StreamMessage> {
		self.sender.subscribe()
	}
}
