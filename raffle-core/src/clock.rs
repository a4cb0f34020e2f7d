use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// Source of the current time for the interval gate.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// True once strictly more than `interval` has passed since `last`.
pub fn interval_elapsed(last: DateTime<Utc>, now: DateTime<Utc>, interval: std::time::Duration) -> bool {
    let Ok(interval) = Duration::from_std(interval) else {
        return false;
    };
    now.signed_duration_since(last) > interval
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_gate_is_strict() {
        let start = Utc::now();
        let interval = std::time::Duration::from_secs(60);

        assert!(!interval_elapsed(start, start, interval));
        assert!(!interval_elapsed(start, start + Duration::seconds(60), interval));
        assert!(interval_elapsed(start, start + Duration::seconds(61), interval));
    }

    #[test]
    fn test_backwards_clock_never_passes() {
        let start = Utc::now();
        let interval = std::time::Duration::from_secs(1);
        assert!(!interval_elapsed(start, start - Duration::seconds(120), interval));
    }

    #[test]
    fn test_manual_clock_advances() {
        let start = Utc::now();
        let clock = ManualClock::new(start);
        clock.advance(Duration::seconds(5));
        assert_eq!(clock.now(), start + Duration::seconds(5));

        clock.set(start);
        assert_eq!(clock.now(), start);
    }
}
