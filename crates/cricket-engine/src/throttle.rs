//! Rate limiting for warnings logged from the audio thread.

use std::time::{Duration, Instant};

/// Default spacing between repeated warnings.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);

/// Lets one event through per interval.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last: Option<Instant>,
    suppressed: u32,
}

impl Throttle {
    /// Creates a throttle with the given spacing.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
            suppressed: 0,
        }
    }

    /// Returns true when an event may be reported now, and starts a new
    /// interval if so.
    pub fn ready(&mut self) -> bool {
        let now = Instant::now();
        match self.last {
            Some(last) if now.duration_since(last) < self.interval => {
                self.suppressed = self.suppressed.saturating_add(1);
                false
            }
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    /// Events swallowed since the last one that got through, resetting the
    /// count.
    pub fn take_suppressed(&mut self) -> u32 {
        std::mem::take(&mut self.suppressed)
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}
