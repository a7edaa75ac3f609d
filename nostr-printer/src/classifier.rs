//! Inbound frame classification and cursor advancement.

use crate::errors::{CursorError, FrameError};
use crate::filter::FilterDocument;
use crate::store::{CursorStore, CURSOR_KEY};
use nostr_printer_common::relay_message::RelayMessage;
use nostr_printer_common::types::Timestamp;
use nostr_printer_common::wire::EventOnWire;

/// Added to an event's `created_at` to form the next `since`.
///
/// Upstream timestamps have second granularity and the relay treats `since` as inclusive,
/// so the cursor is pushed past the event that was just seen.
pub const SINCE_EPSILON: Timestamp = 10;

#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    StreamEnd,
    Delivered(EventOnWire),
    Notice(String),
    Closed(String),
}

pub fn classify(frame: &str) -> Result<Classification, FrameError> {
    let classification = match serde_json::from_str::<RelayMessage>(frame)? {
        RelayMessage::Eose(_) => Classification::StreamEnd,
        RelayMessage::Event(relay_event) => Classification::Delivered(relay_event.event),
        RelayMessage::Notice(message) => Classification::Notice(message),
        RelayMessage::Closed(_, message) => Classification::Closed(message),
    };
    Ok(classification)
}

/// Rewrites the persisted filter's `since` after each delivered event.
#[derive(Debug, Clone)]
pub struct CursorAdvancer {
    key: String,
    epsilon: Timestamp,
}

impl Default for CursorAdvancer {
    fn default() -> Self {
        Self::new(SINCE_EPSILON)
    }
}

impl CursorAdvancer {
    pub fn new(epsilon: Timestamp) -> Self {
        Self {
            key: CURSOR_KEY.to_string(),
            epsilon,
        }
    }

    pub fn with_key(mut self, key: &str) -> Self {
        self.key = key.to_string();
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// One read-modify-write cycle on the cursor document. Returns the persisted `since`.
    pub fn advance<S: CursorStore>(
        &self,
        store: &mut S,
        created_at: Timestamp,
    ) -> Result<Timestamp, CursorError> {
        let candidate = created_at
            .checked_add(self.epsilon)
            .ok_or(CursorError::Overflow(created_at))?;

        let text = store
            .read_document(&self.key)
            .map_err(CursorError::CursorReadFailure)?;
        let mut doc = FilterDocument::from_json(&text)
            .map_err(|err| CursorError::CursorInvalid(err.to_string()))?;

        let previous = doc.since;
        let since = doc.advance_since(candidate);
        if previous == Some(since) {
            return Ok(since);
        }

        let text = doc
            .to_json()
            .map_err(|err| CursorError::CursorInvalid(err.to_string()))?;
        store
            .write_document(&self.key, &text)
            .map_err(CursorError::CursorWriteFailure)?;

        tracing::debug!(since, created_at, "cursor advanced");
        Ok(since)
    }
}
