//! Payment extraction from delivered events. Everything here is a pure function of the
//! event, so a replayed event yields the same decision and amount.

use crate::errors::PayloadError;
use nostr_printer_common::wire::EventOnWire;
use serde_json::Value;

/// Name of the tag carrying the transaction status.
pub const TOPIC_TAG: &str = "t";
/// Status suffix of a settled transaction.
pub const ACCEPT_SUFFIX: &str = "ok";
/// `BTC` is expressed in millisats; receipts show sats.
pub const MILLISATS_PER_SAT: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub event_id: String,
    pub topic: String,
    /// Amount in sats.
    pub amount: u64,
}

impl Receipt {
    pub fn line(&self) -> String {
        format!("Amount received: {} sats", self.amount)
    }

    /// Number of indicator blinks for this amount, roughly its count of decimal digits.
    pub fn blinks(&self) -> u32 {
        magnitude_blinks(self.amount)
    }
}

pub fn topic(event: &EventOnWire) -> Result<&str, PayloadError> {
    event.tag_value(TOPIC_TAG).ok_or(PayloadError::MissingTopic)
}

pub fn is_accepted(topic: &str) -> bool {
    topic.ends_with(ACCEPT_SUFFIX)
}

/// Reads the `BTC` amount from event content.
///
/// Content is either `{"BTC": n}` or `{"tokens": {"BTC": n}}`, where `tokens` may itself be
/// a JSON-encoded string. A `tokens` string that does not decode is ignored as long as the
/// top level carries the amount.
pub fn decode_amount(content: &str) -> Result<u64, PayloadError> {
    let doc: Value =
        serde_json::from_str(content).map_err(|err| PayloadError::Undecodable(err.to_string()))?;

    let mut nested_error = None;
    let tokens = match doc.get("tokens") {
        Some(Value::String(encoded)) => match serde_json::from_str::<Value>(encoded) {
            Ok(tokens) => Some(tokens),
            Err(err) => {
                nested_error = Some(PayloadError::Undecodable(err.to_string()));
                None
            }
        },
        Some(tokens) => Some(tokens.clone()),
        None => None,
    };

    tokens
        .iter()
        .chain(std::iter::once(&doc))
        .find_map(|candidate| candidate.get("BTC").and_then(amount_value))
        .ok_or_else(|| nested_error.unwrap_or(PayloadError::MissingAmount))
}

fn amount_value(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn display_amount(millisats: u64) -> u64 {
    millisats / MILLISATS_PER_SAT
}

/// Divide by ten until zero, one blink per division. Zero still blinks once.
pub fn magnitude_blinks(amount: u64) -> u32 {
    let mut remaining = amount;
    let mut blinks = 0;
    loop {
        remaining /= 10;
        blinks += 1;
        if remaining == 0 {
            return blinks;
        }
    }
}

/// `Ok(None)` when the event's status is not a settled one.
pub fn extract_receipt(event: &EventOnWire) -> Result<Option<Receipt>, PayloadError> {
    let topic = topic(event)?;
    if !is_accepted(topic) {
        return Ok(None);
    }

    let millisats = decode_amount(&event.content)?;
    Ok(Some(Receipt {
        event_id: event.id.clone(),
        topic: topic.to_string(),
        amount: display_amount(millisats),
    }))
}
