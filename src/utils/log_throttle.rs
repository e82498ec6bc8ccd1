use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct WindowState {
    window_started_at: Instant,
    suppressed: u64,
}

/// Rate limits noisy log lines per key.
///
/// Under a burst of expired requests every caller hits the same code path;
/// one line per window plus a suppressed count is enough to see it happened.
#[derive(Debug)]
pub struct LogThrottle {
    interval: Duration,
    windows: Mutex<HashMap<&'static str, WindowState>>,
}

impl LogThrottle {
    pub fn new(interval: Duration) -> Self {
        LogThrottle {
            interval,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Returns `Some(suppressed_count)` when a log for `key` should be emitted,
    /// otherwise `None` and the event is counted as suppressed for the active window.
    pub fn should_emit(&self, key: &'static str) -> Option<u64> {
        let mut map = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();

        let state = map.entry(key).or_insert_with(|| WindowState {
            // Backdate so the first event of a key is always emitted.
            window_started_at: now.checked_sub(self.interval).unwrap_or(now),
            suppressed: 0,
        });

        if now.duration_since(state.window_started_at) >= self.interval {
            let suppressed = state.suppressed;
            state.window_started_at = now;
            state.suppressed = 0;
            Some(suppressed)
        } else {
            state.suppressed += 1;
            None
        }
    }
}
