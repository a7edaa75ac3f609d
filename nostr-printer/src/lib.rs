pub mod actuator;
pub mod classifier;
pub mod client;
pub mod client_command;
pub mod clock;
pub mod errors;
pub mod filter;
pub mod identity;
pub mod payment;
pub mod request;
pub mod session;
pub mod store;

// Used internally, not public API.
#[doc(hidden)]
#[path = "private/mod.rs"]
pub mod __private;
