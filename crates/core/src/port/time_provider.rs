// Time Provider Port (for testability)

use chrono::{DateTime, Local, TimeZone};

/// Time provider interface (allows mocking in tests)
pub trait TimeProvider: Send + Sync {
    /// Get current time in milliseconds since epoch
    fn now_millis(&self) -> i64;

    /// Current moment in the local timezone
    fn now_local(&self) -> DateTime<Local> {
        local_from_millis(self.now_millis())
    }

    /// Today's date as `YYYY-MM-DD`, the default record date
    fn today(&self) -> String {
        self.now_local().format("%Y-%m-%d").to_string()
    }
}

fn local_from_millis(millis: i64) -> DateTime<Local> {
    Local
        .timestamp_millis_opt(millis)
        .single()
        .unwrap_or_else(Local::now)
}

/// System time provider (production)
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};

    /// Manually advanced clock for deterministic tests
    pub struct MockTimeProvider {
        millis: AtomicI64,
    }

    impl MockTimeProvider {
        pub fn new(millis: i64) -> Self {
            Self {
                millis: AtomicI64::new(millis),
            }
        }

        pub fn advance_secs(&self, secs: i64) {
            self.millis.fetch_add(secs * 1000, Ordering::SeqCst);
        }
    }

    impl TimeProvider for MockTimeProvider {
        fn now_millis(&self) -> i64 {
            self.millis.load(Ordering::SeqCst)
        }
    }
}
