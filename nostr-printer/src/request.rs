use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use serde_json::value::RawValue;
use std::fmt;
use std::fmt::Formatter;

/// Subscription label used on the wire.
pub const DEFAULT_SUBSCRIPTION_ID: &str = "query:data";

/// `["REQ", <subscription id>, <filter>]` envelope.
///
/// The filter is kept as the raw persisted text, so the relay receives exactly what is
/// stored as the cursor document.
#[derive(Debug)]
pub struct Request {
    pub subscription_id: String,
    pub filter: Box<RawValue>,
}

impl Request {
    /// Wraps a persisted filter document. Fails if the document is not valid JSON.
    pub fn new(subscription_id: String, filter: &str) -> serde_json::Result<Self> {
        let filter = RawValue::from_string(filter.trim().to_string())?;
        Ok(Self {
            subscription_id,
            filter,
        })
    }
}

impl Serialize for Request {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(3))?;
        seq.serialize_element("REQ")?;
        seq.serialize_element(&self.subscription_id)?;
        seq.serialize_element(&self.filter)?;
        seq.end()
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let text = serde_json::to_string(&self).map_err(|_| fmt::Error)?;
        write!(f, "{}", text)
    }
}
