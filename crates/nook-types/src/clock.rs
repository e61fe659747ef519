use std::sync::Mutex;

use chrono::{DateTime, Utc};

/// Wall clock that never runs backwards.
///
/// Every call to [`now`](Self::now) returns a timestamp strictly greater
/// than the previous one from the same clock, at microsecond resolution.
/// If the system clock stalls or steps back, the clock keeps advancing by
/// one microsecond per call until wall time catches up.
///
/// Share one instance (behind an `Arc`) between every component that stamps
/// records, so creation timestamps are ordered across collections.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    /// Last issued timestamp, in microseconds since the UNIX epoch.
    last_micros: Mutex<i64>,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// A clock whose first reading is at least `floor`.
    pub fn starting_at(floor: DateTime<Utc>) -> Self {
        Self {
            last_micros: Mutex::new(floor.timestamp_micros() - 1),
        }
    }

    /// Next timestamp, strictly after every previous reading.
    pub fn now(&self) -> DateTime<Utc> {
        let wall = Utc::now().timestamp_micros();
        let mut last = self.last_micros.lock().expect("clock mutex poisoned");
        let next = if wall > *last { wall } else { *last + 1 };
        *last = next;
        DateTime::from_timestamp_micros(next).unwrap_or_else(Utc::now)
    }

    /// The most recently issued timestamp, if any.
    pub fn last(&self) -> Option<DateTime<Utc>> {
        let last = *self.last_micros.lock().expect("clock mutex poisoned");
        if last <= 0 {
            return None;
        }
        DateTime::from_timestamp_micros(last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn monotonic_across_rapid_calls() {
        let clock = MonotonicClock::new();
        let mut prev = clock.now();
        for _ in 0..1000 {
            let next = clock.now();
            assert!(next > prev, "clock must be strictly monotonic: {prev} >= {next}");
            prev = next;
        }
    }

    #[test]
    fn keeps_advancing_when_wall_clock_is_behind() {
        let future = Utc::now() + Duration::days(365);
        let clock = MonotonicClock::starting_at(future);
        let t1 = clock.now();
        let t2 = clock.now();
        assert_eq!(t1, future);
        assert_eq!(t2 - t1, Duration::microseconds(1));
    }

    #[test]
    fn last_tracks_most_recent_reading() {
        let clock = MonotonicClock::new();
        assert!(clock.last().is_none());
        let t = clock.now();
        assert_eq!(clock.last(), Some(t));
    }

    #[test]
    fn concurrent_now_calls_are_unique() {
        use std::sync::Arc;
        use std::thread;

        let clock = Arc::new(MonotonicClock::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let clock = Arc::clone(&clock);
                thread::spawn(move || (0..100).map(|_| clock.now()).collect::<Vec<_>>())
            })
            .collect();

        let mut all = Vec::new();
        for h in handles {
            all.extend(h.join().unwrap());
        }
        let len = all.len();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), len, "timestamps must be unique across threads");
    }
}
