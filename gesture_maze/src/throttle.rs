use std::time::{Duration, Instant};

/// Enforces a minimum spacing between accepted attempts.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last_call: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_call: None,
        }
    }

    /// Records `now` and returns `true` if at least one interval has passed
    /// since the last accepted attempt. The first attempt is always accepted.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_call {
            if now.saturating_duration_since(last) < self.interval {
                return false;
            }
        }
        self.last_call = Some(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_attempt_is_accepted() {
        let mut throttle = Throttle::new(Duration::from_millis(1000));
        assert!(throttle.try_acquire(Instant::now()));
    }

    #[test]
    fn test_attempts_within_interval_are_rejected() {
        let mut throttle = Throttle::new(Duration::from_millis(1000));
        let start = Instant::now();

        assert!(throttle.try_acquire(start));
        assert!(!throttle.try_acquire(start));
        assert!(!throttle.try_acquire(start + Duration::from_millis(999)));
        assert!(throttle.try_acquire(start + Duration::from_millis(1000)));
        assert!(!throttle.try_acquire(start + Duration::from_millis(1500)));
        assert!(throttle.try_acquire(start + Duration::from_millis(2000)));
    }

    #[test]
    fn test_rejected_attempts_do_not_move_the_window() {
        let mut throttle = Throttle::new(Duration::from_millis(1000));
        let start = Instant::now();

        assert!(throttle.try_acquire(start));
        assert!(!throttle.try_acquire(start + Duration::from_millis(900)));
        assert!(throttle.try_acquire(start + Duration::from_millis(1100)));
    }

    #[test]
    fn test_time_going_backwards_is_rejected() {
        let mut throttle = Throttle::new(Duration::from_millis(1000));
        let start = Instant::now() + Duration::from_secs(5);

        assert!(throttle.try_acquire(start));
        assert!(!throttle.try_acquire(start - Duration::from_secs(3)));
    }
}
