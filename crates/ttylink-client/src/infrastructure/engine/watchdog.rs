//! Keepalive deadlines.
//!
//! The engine pings the server every `interval`.  If no pong arrives in
//! time the epoch is shut down with a watchdog timeout.  The first deadline
//! leaves room for one full interval before the first ping plus one more
//! interval and a second of slack for the answer.  Each pong moves the
//! deadline to `interval + 1s` after it arrived.

use std::time::Duration;

use tokio::time::Instant;

/// Slack added to the interval when waiting for a pong.
const PONG_GRACE: Duration = Duration::from_secs(1);

/// Next-ping and next-timeout deadlines for one epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogSchedule {
    interval: Duration,
    next_ping: Instant,
    next_timeout: Instant,
}

impl WatchdogSchedule {
    /// Starts a schedule at `start`.
    pub fn new(interval: Duration, start: Instant) -> Self {
        Self {
            interval,
            next_ping: start + interval,
            next_timeout: start + interval + interval + PONG_GRACE,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// When the next ping is due.
    pub fn next_ping(&self) -> Instant {
        self.next_ping
    }

    /// When the connection is declared dead unless a pong arrives first.
    pub fn next_timeout(&self) -> Instant {
        self.next_timeout
    }

    /// Records that a ping was sent at `now`.
    pub fn ping_sent(&mut self, now: Instant) {
        self.next_ping = now + self.interval;
    }

    /// Records that a pong arrived at `now`.
    pub fn pong_received(&mut self, now: Instant) {
        self.next_timeout = now + self.interval + PONG_GRACE;
    }
}
