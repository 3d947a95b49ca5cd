use std::time::{Duration, Instant};

/// Iteration count between pings in the legacy cadence.
pub const LEGACY_PING_ITERATIONS: u32 = 400;

pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(1);

/// When the capture loop sends its keepalive ping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepAlivePolicy {
    /// Ping when at least this much wall-clock time passed since the last one.
    Interval(Duration),
    /// Ping once every `n` loop iterations, whatever each iteration read.
    EveryIterations(u32),
}

impl Default for KeepAlivePolicy {
    fn default() -> Self {
        KeepAlivePolicy::Interval(DEFAULT_PING_INTERVAL)
    }
}

/// Ping scheduler owned by the capture worker.
#[derive(Debug)]
pub(crate) struct KeepAlive {
    policy: KeepAlivePolicy,
    iterations: u32,
    last_ping: Instant,
}

impl KeepAlive {
    pub fn new(policy: KeepAlivePolicy) -> Self {
        Self {
            policy,
            iterations: 0,
            last_ping: Instant::now(),
        }
    }

    /// Account for one loop iteration; returns true when a ping is due.
    pub fn tick(&mut self) -> bool {
        self.tick_at(Instant::now())
    }

    fn tick_at(&mut self, now: Instant) -> bool {
        match self.policy {
            KeepAlivePolicy::EveryIterations(n) => {
                self.iterations += 1;
                if self.iterations >= n.max(1) {
                    self.iterations = 0;
                    true
                } else {
                    false
                }
            }
            KeepAlivePolicy::Interval(period) => {
                if now.saturating_duration_since(self.last_ping) >= period {
                    self.last_ping = now;
                    true
                } else {
                    false
                }
            }
        }
    }
}
