use chrono::Utc;
use nostr_printer_common::types::Timestamp;

/// Source of the current epoch time. Read once at startup to seed `since`.
pub trait Clock {
    fn now(&self) -> Timestamp;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        // A clock before 1970 is treated as the epoch itself
        Timestamp::try_from(Utc::now().timestamp()).unwrap_or_default()
    }
}

/// Clock pinned to a single instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}
