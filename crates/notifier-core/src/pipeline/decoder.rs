//! Change record decoding.
//!
//! Accepts a bare envelope (`{"op": ..., "before": ..., "after": ..., "ts_ms": ...}`)
//! or one wrapped by a schema-carrying converter (`{"schema": {...}, "payload": {...}}`).
//! Unknown fields are ignored at every level. An operation tag outside the known
//! set is kept as [`Operation::Unknown`](notifier_types::Operation::Unknown) so
//! the classifier can skip it.

use notifier_types::ChangeRecord;
use serde::de::IgnoredAny;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
	/// Empty body or JSON `null`, sent after a delete to compact the key.
	#[error("Tombstone message")]
	Tombstone,
	/// Body is not a valid change envelope.
	#[error("Malformed change record: {0}")]
	Malformed(String),
}

#[derive(Deserialize)]
struct EnvelopeProbe {
	#[serde(default)]
	schema: Option<IgnoredAny>,
	#[serde(default)]
	op: Option<IgnoredAny>,
}

#[derive(Deserialize)]
struct SchemaWrapped {
	#[serde(default)]
	payload: Option<ChangeRecord>,
}

/// Decodes one raw stream message into a change record.
///
/// The record is either fully decoded or rejected; a missing `ts_ms`, a
/// non-integer id or an unknown status all fail the whole message.
pub fn decode(raw: &[u8]) -> Result<ChangeRecord, DecodeError> {
	if raw.iter().all(u8::is_ascii_whitespace) {
		return Err(DecodeError::Tombstone);
	}

	let probe: Option<EnvelopeProbe> =
		serde_json::from_slice(raw).map_err(|e| DecodeError::Malformed(e.to_string()))?;
	let Some(probe) = probe else {
		return Err(DecodeError::Tombstone);
	};

	if probe.schema.is_some() && probe.op.is_none() {
		let wrapped: SchemaWrapped =
			serde_json::from_slice(raw).map_err(|e| DecodeError::Malformed(e.to_string()))?;
		return wrapped.payload.ok_or(DecodeError::Tombstone);
	}

	serde_json::from_slice(raw).map_err(|e| DecodeError::Malformed(e.to_string()))
}
