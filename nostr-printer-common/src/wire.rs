use crate::types::Timestamp;
use serde::{Deserialize, Serialize};

/// Event record as delivered inside an `EVENT` frame.
///
/// Only the fields the printer consumes are modelled; unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventOnWire {
    pub id: String,
    pub kind: u32,
    pub pubkey: String,
    pub created_at: Timestamp,

    #[serde(default)]
    pub tags: Vec<Vec<String>>,

    #[serde(default)]
    pub content: String,

    #[serde(default)]
    pub sig: String,
}

impl EventOnWire {
    /// First tag whose name (element 0) equals `name`.
    pub fn find_tag(&self, name: &str) -> Option<&[String]> {
        self.tags
            .iter()
            .find(|tag| tag.first().map(String::as_str) == Some(name))
            .map(Vec::as_slice)
    }

    /// Value (element 1) of the first tag called `name`.
    pub fn tag_value(&self, name: &str) -> Option<&str> {
        self.find_tag(name)
            .and_then(|tag| tag.get(1))
            .map(String::as_str)
    }
}
