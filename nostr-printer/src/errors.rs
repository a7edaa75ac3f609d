//! Error types, one enum per concern.
//!
//! Only [`SetupError`] is fatal. Everything else is reported on the diagnostic channel
//! (tracing + metrics) by the control loop, which then moves on to the next frame.

use nostr_printer_common::types::Timestamp;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document {0:?} not found")]
    NotFound(String),

    #[error("document {0:?} is empty")]
    Empty(String),

    #[error("cannot read document {key:?}: {source}")]
    Unreadable {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write document {key:?}: {source}")]
    WriteFailure {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("filter template missing: {0}")]
    TemplateMissing(String),

    #[error("filter template is empty")]
    TemplateEmpty,

    #[error("filter template is not a JSON object: {0}")]
    TemplateInvalid(String),
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum CursorError {
    #[error("cannot read cursor document: {0}")]
    CursorReadFailure(#[source] StoreError),

    #[error("cannot write cursor document: {0}")]
    CursorWriteFailure(#[source] StoreError),

    #[error("cursor document is not a filter object: {0}")]
    CursorInvalid(String),

    #[error("created_at {0} overflows the cursor")]
    Overflow(Timestamp),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("cursor unavailable, subscription not sent: {0}")]
    CursorUnavailable(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("event has no topic tag")]
    MissingTopic,

    #[error("content cannot be decoded: {0}")]
    Undecodable(String),

    #[error("content has no usable BTC amount")]
    MissingAmount,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("invalid lightning address {0:?}")]
    InvalidAddress(String),

    #[error("identity request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("name {0:?} not present in identity document")]
    UnknownName(String),

    #[error("invalid public key {0:?}")]
    InvalidKey(String),
}

/// Conditions that stop the device before it reaches the main loop.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("cursor store: {0}")]
    Store(#[from] StoreError),

    #[error("identity resolution: {0}")]
    Identity(#[from] IdentityError),

    #[error("relay not reachable within {0} seconds")]
    ConnectTimeout(u64),

    #[error("transport closed during setup")]
    TransportClosed,
}
