use crate::relay_event::RelayEvent;
use crate::types::SubscriptionId;
use serde::{
    de::{self, IgnoredAny, SeqAccess, Visitor},
    ser::SerializeSeq,
    Deserialize, Deserializer, Serialize, Serializer,
};
use std::fmt::Formatter;

/// Frames a relay may push to a subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayMessage {
    Event(RelayEvent),
    /// End of stored events. The subscription id is optional on the wire.
    Eose(Option<SubscriptionId>),
    Notice(String),
    Closed(SubscriptionId, String),
}

impl Serialize for RelayMessage {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match &self {
            RelayMessage::Event(event) => {
                let mut seq = serializer.serialize_seq(Some(3))?;
                seq.serialize_element("EVENT")?;
                seq.serialize_element(&event.subscription_id)?;
                seq.serialize_element(&event.event)?;
                seq.end()
            }
            RelayMessage::Eose(subscription_id) => {
                let len = if subscription_id.is_some() { 2 } else { 1 };
                let mut seq = serializer.serialize_seq(Some(len))?;
                seq.serialize_element("EOSE")?;
                if let Some(id) = subscription_id {
                    seq.serialize_element(id)?;
                }
                seq.end()
            }
            RelayMessage::Notice(message) => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element("NOTICE")?;
                seq.serialize_element(message)?;
                seq.end()
            }
            RelayMessage::Closed(subscription_id, message) => {
                let mut seq = serializer.serialize_seq(Some(3))?;
                seq.serialize_element("CLOSED")?;
                seq.serialize_element(subscription_id)?;
                seq.serialize_element(message)?;
                seq.end()
            }
        }
    }
}

struct RelayMessageVisitor;

impl<'de> Visitor<'de> for RelayMessageVisitor {
    type Value = RelayMessage;

    fn expecting(&self, formatter: &mut Formatter) -> std::fmt::Result {
        formatter.write_str("a sequence starting with an identifier string")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let identifier: String = seq
            .next_element()?
            .ok_or_else(|| de::Error::invalid_length(0, &self))?;

        let message = match identifier.as_str() {
            "EVENT" => {
                let remaining: RelayEvent =
                    Deserialize::deserialize(de::value::SeqAccessDeserializer::new(seq))?;
                return Ok(RelayMessage::Event(remaining));
            }
            "EOSE" => RelayMessage::Eose(seq.next_element()?),
            "NOTICE" => RelayMessage::Notice(seq.next_element()?.unwrap_or_default()),
            "CLOSED" => {
                let subscription_id: SubscriptionId = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(1, &self))?;
                RelayMessage::Closed(subscription_id, seq.next_element()?.unwrap_or_default())
            }
            _ => {
                return Err(de::Error::unknown_variant(
                    &identifier,
                    &["EVENT", "EOSE", "NOTICE", "CLOSED"],
                ))
            }
        };

        // Relays may append extra elements; they carry nothing we use.
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(message)
    }
}

impl<'de> Deserialize<'de> for RelayMessage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(RelayMessageVisitor)
    }
}
