pub mod logging;
pub mod relay_event;
pub mod relay_message;
pub mod types;
pub mod wire;
