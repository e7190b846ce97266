//! Wall-clock session duration.

use std::time::Duration;

use tokio::time::Instant;

/// Tracks how long the survey has been running.
///
/// The clock starts on the first user keystroke (or the first submission,
/// whichever comes first), not when the session object is created.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionClock {
    started_at: Option<Instant>,
}

impl SessionClock {
    /// Starts the clock if it isn't running yet. Returns `true` if this
    /// call started it.
    #[inline]
    pub fn start(&mut self, now: Instant) -> bool {
        if self.started_at.is_some() {
            return false;
        }
        self.started_at = Some(now);
        true
    }

    /// Whether the session has started.
    #[inline]
    pub fn is_started(&self) -> bool {
        self.started_at.is_some()
    }

    /// Time elapsed since the start, zero if not started.
    #[inline]
    pub fn elapsed(&self, now: Instant) -> Duration {
        self.started_at
            .map(|started_at| now.saturating_duration_since(started_at))
            .unwrap_or_default()
    }

    /// Whole seconds elapsed since the start.
    #[inline]
    pub fn duration_secs(&self, now: Instant) -> u64 {
        self.elapsed(now).as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_once() {
        let t0 = Instant::now();
        let mut clock = SessionClock::default();
        assert!(!clock.is_started());
        assert_eq!(clock.duration_secs(t0 + Duration::from_secs(5)), 0);

        assert!(clock.start(t0));
        assert!(!clock.start(t0 + Duration::from_secs(3)));
        assert_eq!(clock.duration_secs(t0 + Duration::from_millis(61_900)), 61);
    }
}
