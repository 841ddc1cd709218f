use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering::SeqCst;
use std::time::{SystemTime, UNIX_EPOCH};

/// Where the agent reads time from.
///
/// Scheduling, liveness, and eviction all run on whole seconds, so one
/// source covers both the wall-clock and deadline roles. Cloned mock
/// clocks share the same underlying time value.
#[derive(Debug, Clone)]
pub enum Clock {
    /// The system clock.
    Wall,

    /// Test-controlled time.
    Mock(Arc<AtomicU64>),
}

impl Clock {
    pub fn mock(now: u64) -> Clock {
        Clock::Mock(Arc::new(AtomicU64::new(now)))
    }

    /// Seconds since the UNIX epoch.
    pub fn now_secs(&self) -> u64 {
        match self {
            Clock::Wall => match SystemTime::now().duration_since(UNIX_EPOCH) {
                Ok(n) => n.as_secs(),
                Err(e) => panic!("SystemTime before UNIX EPOCH! {e:?}"),
            },
            Clock::Mock(now) => now.load(SeqCst),
        }
    }

    /// Move a mock clock forward. For test use only.
    pub fn advance(&self, secs: u64) {
        match self {
            Clock::Wall => unreachable!("cannot advance the wall clock"),
            Clock::Mock(now) => {
                now.fetch_add(secs, SeqCst);
            }
        }
    }
}
