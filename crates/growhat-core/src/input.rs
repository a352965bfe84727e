//! Button handling

use embassy_time::{Duration, Instant};

/// Presses closer together than this count as contact bounce
pub const DEBOUNCE: Duration = Duration::from_millis(300);

/// Drops presses that arrive within the debounce window of the last
/// accepted press.
#[derive(Debug, Clone, Copy)]
pub struct Debouncer {
    window: Duration,
    last_press: Option<Instant>,
}

impl Debouncer {
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            last_press: None,
        }
    }

    /// Returns whether the press at `now` should be acted on.
    pub fn accept(&mut self, now: Instant) -> bool {
        if self
            .last_press
            .is_some_and(|last| now.saturating_duration_since(last) < self.window)
        {
            return false;
        }
        self.last_press = Some(now);
        true
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEBOUNCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounces_are_dropped() {
        let mut debouncer = Debouncer::default();
        assert!(debouncer.accept(Instant::from_millis(1000)));
        assert!(!debouncer.accept(Instant::from_millis(1010)));
        assert!(!debouncer.accept(Instant::from_millis(1299)));
        assert!(debouncer.accept(Instant::from_millis(1300)));
    }
}
