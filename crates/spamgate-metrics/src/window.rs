//! Rolling 60-second request window.
//!
//! Backs the `request_rate_per_minute` gauge: every request appends a
//! timestamp, and each rate read purges entries older than the window
//! before counting what remains.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Width of the rate window.
pub const WINDOW: Duration = Duration::from_secs(60);

/// Bounded event log of recent request arrival times.
///
/// Append and purge-and-count each run under a single lock, so concurrent
/// writers cannot lose an event or purge the same entry twice. Memory is
/// reclaimed lazily: a burst followed by no reads holds its entries until
/// the next `rate()` call.
pub struct RateWindow {
    events: Mutex<VecDeque<Instant>>,
}

impl RateWindow {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
        }
    }

    /// Record one request arrival.
    pub fn record(&self, now: Instant) {
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events.push_back(now);
    }

    /// Purge entries outside the window, then return how many remain.
    ///
    /// The window is half-open `(now - 60s, now]`: an entry exactly 60s
    /// old is purged. Entries are appended in arrival order, so purging
    /// stops at the first entry still inside the window.
    pub fn rate(&self, now: Instant) -> u64 {
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        while let Some(ts) = events.front() {
            if now.duration_since(*ts) >= WINDOW {
                events.pop_front();
            } else {
                break;
            }
        }
        events.len() as u64
    }
}

impl Default for RateWindow {
    fn default() -> Self {
        Self::new()
    }
}
