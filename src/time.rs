use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::time::Duration;

/// Source of current time plus the primitive every timer in the system is
/// built on. All scheduling decisions go through this seam so timer logic is
/// testable without real sleeps.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Suspend until `at`. Returns immediately if `at` is not in the future.
    async fn sleep_until(&self, at: DateTime<Utc>);
}

/// Production clock over `Utc::now` and the tokio timer wheel.
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep_until(&self, at: DateTime<Utc>) {
        let remaining = at.signed_duration_since(self.now());
        if remaining.num_milliseconds() > 0 {
            tokio::time::sleep(Duration::from_millis(remaining.num_milliseconds() as u64))
                .await;
        }
    }
}

#[cfg(test)]
pub mod manual {
    use super::*;
    use parking_lot::Mutex;
    use tokio::sync::Notify;

    /// Test clock whose time only moves when `advance_to` is called.
    pub struct ManualClock {
        now: Mutex<DateTime<Utc>>,
        changed: Notify,
    }

    impl ManualClock {
        pub fn new(start: DateTime<Utc>) -> Self {
            Self {
                now: Mutex::new(start),
                changed: Notify::new(),
            }
        }

        pub fn advance_to(&self, at: DateTime<Utc>) {
            *self.now.lock() = at;
            self.changed.notify_waiters();
        }
    }

    #[async_trait]
    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock()
        }

        async fn sleep_until(&self, at: DateTime<Utc>) {
            loop {
                let notified = self.changed.notified();
                if self.now() >= at {
                    return;
                }
                // Time is re-checked after every wakeup; spurious notifies
                // just loop.
                notified.await;
            }
        }
    }
}
