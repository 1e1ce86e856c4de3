use std::time::Duration;

/// How long a toggle waits for the per-store lock before giving up.
pub const LOCK_WAIT: Duration = Duration::from_secs(3);

/// How long a lock holder may keep the lock before it is considered abandoned.
pub const LOCK_LEASE: Duration = Duration::from_secs(3);

/// Longest operating window a store may register.
pub const MAX_WINDOW_DAYS: i64 = 366;

pub const MAX_HOLIDAYS_PER_CALL: usize = 366;

pub const MAX_NAME_LEN: usize = 256;
