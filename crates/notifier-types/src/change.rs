//! Change-data-capture envelope types.
//!
//! A [`ChangeRecord`] is the decoded form of one message on the change stream:
//! an operation tag, optional before/after row snapshots, optional source
//! metadata and the time the change was captured.

use crate::OrderSnapshot;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operation recorded by the change stream.
///
/// Tags outside the known set decode to [`Operation::Unknown`] instead of
/// failing, so schema drift upstream is skipped rather than fatal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operation {
	/// Row inserted (`"c"`).
	Create,
	/// Row updated (`"u"`).
	Update,
	/// Row deleted (`"d"`).
	Delete,
	/// Row read during the initial load (`"r"`).
	Snapshot,
	/// Any other tag, kept verbatim for reporting.
	Unknown(String),
}

impl Operation {
	/// Maps a wire tag to an operation.
	pub fn from_tag(tag: &str) -> Self {
		match tag {
			"c" => Operation::Create,
			"u" => Operation::Update,
			"d" => Operation::Delete,
			"r" => Operation::Snapshot,
			other => Operation::Unknown(other.to_string()),
		}
	}

	/// Returns the wire tag of the operation.
	pub fn tag(&self) -> &str {
		match self {
			Operation::Create => "c",
			Operation::Update => "u",
			Operation::Delete => "d",
			Operation::Snapshot => "r",
			Operation::Unknown(tag) => tag,
		}
	}
}

impl From<String> for Operation {
	fn from(tag: String) -> Self {
		Operation::from_tag(&tag)
	}
}

impl From<Operation> for String {
	fn from(op: Operation) -> Self {
		op.tag().to_string()
	}
}

impl fmt::Display for Operation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.tag())
	}
}

/// Metadata describing where a change originated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMetadata {
	#[serde(default)]
	pub version: Option<String>,
	#[serde(default)]
	pub connector: Option<String>,
	#[serde(default)]
	pub name: Option<String>,
	#[serde(default)]
	pub db: Option<String>,
	#[serde(default)]
	pub table: Option<String>,
	#[serde(default)]
	pub ts_ms: Option<i64>,
}

/// Decoded change-stream envelope.
///
/// Create and Snapshot records carry only `after`, Delete carries only
/// `before`, Update carries both. The decoder does not enforce this; a record
/// missing its required side is skipped by the classifier as malformed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
	pub op: Operation,
	#[serde(default)]
	pub before: Option<OrderSnapshot>,
	#[serde(default)]
	pub after: Option<OrderSnapshot>,
	#[serde(default)]
	pub source: Option<SourceMetadata>,
	/// Capture time in epoch milliseconds.
	pub ts_ms: i64,
}

impl ChangeRecord {
	/// Builds an insert record.
	pub fn created(after: OrderSnapshot, source: SourceMetadata, ts_ms: i64) -> Self {
		Self {
			op: Operation::Create,
			before: None,
			after: Some(after),
			source: Some(source),
			ts_ms,
		}
	}

	/// Builds an update record.
	pub fn updated(
		before: OrderSnapshot,
		after: OrderSnapshot,
		source: SourceMetadata,
		ts_ms: i64,
	) -> Self {
		Self {
			op: Operation::Update,
			before: Some(before),
			after: Some(after),
			source: Some(source),
			ts_ms,
		}
	}

	/// Builds a delete record.
	pub fn deleted(before: OrderSnapshot, source: SourceMetadata, ts_ms: i64) -> Self {
		Self {
			op: Operation::Delete,
			before: Some(before),
			after: None,
			source: Some(source),
			ts_ms,
		}
	}

	/// Builds an initial-load record.
	pub fn snapshot(after: OrderSnapshot, source: SourceMetadata, ts_ms: i64) -> Self {
		Self {
			op: Operation::Snapshot,
			before: None,
			after: Some(after),
			source: Some(source),
			ts_ms,
		}
	}

	/// Table the change was captured from, if the source reported it.
	pub fn table(&self) -> Option<&str> {
		self.source.as_ref().and_then(|s| s.table.as_deref())
	}
}
