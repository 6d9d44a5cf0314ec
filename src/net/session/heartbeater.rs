use std::collections::VecDeque;
use std::task::Context;
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

/// Heartbeat timer of one connection, with round trip bookkeeping.
pub struct Heartbeater {
    interval: Interval,

    /// Round trips of acknowledged heartbeats, oldest first.
    latencies: VecDeque<Duration>,

    /// When the unacknowledged heartbeat was sent.
    sent: Option<Instant>,
}

// Enough history for an average without growing forever.
const LATENCIES_MAX_LEN: usize = 1000;

impl std::fmt::Debug for Heartbeater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Heartbeater")
            .field("interval", &self.interval.period())
            .field("latencies", &self.latencies.len())
            .field("sent", &self.sent.is_some())
            .finish_non_exhaustive()
    }
}

impl Heartbeater {
    /// Starts a heartbeat timer, the first beat is due immediately.
    #[must_use]
    pub fn new(period: Duration) -> Self {
        let mut interval = interval_at(Instant::now(), period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self {
            interval,
            latencies: VecDeque::new(),
            sent: None,
        }
    }

    #[must_use]
    pub fn period(&self) -> Duration {
        self.interval.period()
    }

    /// Whether a heartbeat is due.
    pub fn poll_beat(&mut self, cx: &mut Context<'_>) -> bool {
        self.interval.poll_tick(cx).is_ready()
    }

    /// Checks whether the last heartbeat is still waiting for an ACK.
    #[must_use]
    pub const fn has_sent(&self) -> bool {
        self.sent.is_some()
    }

    /// Gets the average round trip of acknowledged heartbeats.
    #[must_use]
    pub fn average(&self) -> Option<Duration> {
        // CLIPPY: the length is bounded by LATENCIES_MAX_LEN.
        #[allow(clippy::cast_possible_truncation)]
        let len = self.latencies.len() as u32;
        self.latencies
            .iter()
            .fold(Duration::ZERO, |acc, entry| acc + *entry)
            .checked_div(len)
    }

    /// Gets the most recent round trip.
    #[must_use]
    pub fn recent(&self) -> Option<Duration> {
        self.latencies.back().copied()
    }

    /// Records an acknowledgement, returning the round trip.
    ///
    /// Returns `None` if no heartbeat was waiting for one.
    pub fn acknowledged(&mut self) -> Option<Duration> {
        let latency = self.sent.take()?.elapsed();
        if self.latencies.len() == LATENCIES_MAX_LEN {
            self.latencies.pop_front();
        }
        self.latencies.push_back(latency);
        Some(latency)
    }

    /// Records that a heartbeat has been sent.
    ///
    /// Returns `true` if the previous one was never acknowledged.
    pub fn record_sent(&mut self) -> bool {
        self.sent.replace(Instant::now()).is_some()
    }
}
