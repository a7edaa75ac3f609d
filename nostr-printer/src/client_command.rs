use crate::request::Request;

/// Connection generation, bumped by the transport on every successful connect.
pub type Generation = u64;

#[derive(Debug)]
pub enum ClientCommand {
    /// Subscription for the connection of the given generation. Dropped if that
    /// connection is already gone.
    Req((Request, Generation)),
}

/// Lifecycle and data events pushed by the transport to the control loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connecting,
    Connected(Generation),
    Disconnected(String),
    Frame(String),
}
