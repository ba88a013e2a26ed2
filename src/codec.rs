//! Wire codec
//!
//! Frames are newline-delimited JSON objects. A single transport delivery may
//! carry several frames; each line is decoded on its own so one bad line never
//! takes the rest of the batch down with it.

use crate::error::{DecodeError, SessionError};
use crate::message::ChatEvent;

/// Encode one event as a single JSON frame (no trailing newline)
pub fn encode(event: &ChatEvent) -> Result<String, SessionError> {
    Ok(serde_json::to_string(event)?)
}

/// Decode a received buffer into events, one result per non-empty line
///
/// Order is preserved. Blank lines (after trimming) are skipped and do not
/// produce a result.
pub fn decode(buffer: &str) -> Vec<Result<ChatEvent, DecodeError>> {
    buffer
        .split('\n')
        .enumerate()
        .filter_map(|(idx, line)| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            Some(
                serde_json::from_str::<ChatEvent>(line).map_err(|source| DecodeError {
                    line: idx + 1,
                    source,
                }),
            )
        })
        .collect()
}
