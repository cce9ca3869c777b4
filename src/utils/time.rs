use std::time::{SystemTime, UNIX_EPOCH};

/// return milliseconds since the unix epoch
pub(crate) fn get_now_as_millis() -> u64 {
    let now = SystemTime::now();
    let since_epoch = now.duration_since(UNIX_EPOCH).unwrap_or_default();
    since_epoch.as_millis() as u64
}

/// Whether a record written at `created_at_millis` has outlived `expire_after_millis`
pub(crate) fn is_expired_at(
    created_at_millis: u64,
    expire_after_millis: u64,
    now_millis: u64,
) -> bool {
    now_millis.saturating_sub(created_at_millis) >= expire_after_millis
}
