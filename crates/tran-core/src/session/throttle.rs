use std::time::Duration;

use tokio::time::Instant;

/// Default minimum spacing between two live replacements.
pub const DEFAULT_THROTTLE: Duration = Duration::from_millis(80);

/// Wall-clock gate enforcing a minimum interval between applications.
#[derive(Debug, Clone, Copy)]
pub struct Throttle {
    interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Whether an application at `now` respects the interval. The first
    /// application is always allowed.
    pub fn ready(&self, now: Instant) -> bool {
        self.last
            .is_none_or(|last| now.saturating_duration_since(last) >= self.interval)
    }

    pub fn mark(&mut self, now: Instant) {
        self.last = Some(now);
    }

    /// Earliest instant the next application is allowed.
    pub fn next_allowed(&self) -> Option<Instant> {
        self.last.map(|last| last + self.interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_is_ready_then_spaced() {
        let start = Instant::now();
        let mut throttle = Throttle::new(Duration::from_millis(80));
        assert!(throttle.ready(start));
        assert_eq!(throttle.next_allowed(), None);

        throttle.mark(start);
        assert!(!throttle.ready(start + Duration::from_millis(79)));
        assert!(throttle.ready(start + Duration::from_millis(80)));
        assert_eq!(
            throttle.next_allowed(),
            Some(start + Duration::from_millis(80))
        );
    }

    #[test]
    fn test_zero_interval_never_blocks() {
        let now = Instant::now();
        let mut throttle = Throttle::new(Duration::ZERO);
        throttle.mark(now);
        assert!(throttle.ready(now));
    }
}
