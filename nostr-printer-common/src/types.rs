pub type SubscriptionId = String;

/// Seconds since the UNIX epoch, as carried in `created_at`, `since` and `until`.
pub type Timestamp = u64;
