use crate::types::SubscriptionId;
use crate::wire::EventOnWire;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayEvent {
    pub subscription_id: SubscriptionId,
    pub event: EventOnWire,
}
