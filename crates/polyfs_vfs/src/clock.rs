use std::sync::Arc;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A time source reporting nanoseconds since the Unix epoch. The manual
/// variant lets tests advance time deterministically, e.g. to expire
/// attribute caches or observe mtime changes.
#[derive(Debug, Clone)]
pub struct Clock(Arc<ClockKind>);

#[derive(Debug)]
enum ClockKind {
    System,
    Manual(Mutex<i64>),
}

impl Clock {
    #[must_use]
    pub fn system() -> Self {
        Self(Arc::new(ClockKind::System))
    }

    #[must_use]
    pub fn manual(start_nanos: i64) -> Self {
        Self(Arc::new(ClockKind::Manual(Mutex::new(start_nanos))))
    }

    #[must_use]
    pub fn now_nanos(&self) -> i64 {
        match &*self.0 {
            ClockKind::System => SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0, |d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX)),
            ClockKind::Manual(now) => *now.lock().expect("lock is poisoned"),
        }
    }

    /// Moves a manual clock forward; has no effect on the system clock.
    pub fn advance(&self, by: Duration) {
        if let ClockKind::Manual(now) = &*self.0 {
            let mut now = now.lock().expect("lock is poisoned");
            *now += i64::try_from(by.as_nanos()).unwrap_or(i64::MAX);
        }
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::system()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let clock = Clock::manual(10);
        assert_eq!(clock.now_nanos(), 10);
        clock.advance(Duration::from_nanos(5));
        assert_eq!(clock.now_nanos(), 15);
        clock.advance(Duration::from_secs(1));
        assert_eq!(clock.now_nanos(), 1_000_000_015);
    }

    #[test]
    fn system_clock_moves_forward() {
        let clock = Clock::system();
        let a = clock.now_nanos();
        let b = clock.now_nanos();
        assert!(b >= a);
    }
}
