use std::time::Duration;

/// Tracks compute time spent on converged steps and says when to rewind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetCycle {
    elapsed: Duration,
    period: Duration,
}

impl ResetCycle {
    pub fn new(period: Duration) -> Self {
        Self {
            elapsed: Duration::ZERO,
            period,
        }
    }

    /// Add the duration of one converged step. Returns `true` once the
    /// accumulated time has reached the period.
    pub fn accumulate(&mut self, step: Duration) -> bool {
        self.elapsed = self.elapsed.saturating_add(step);
        self.is_due()
    }

    pub fn is_due(&self) -> bool {
        self.elapsed >= self.period
    }

    pub fn reset(&mut self) {
        self.elapsed = Duration::ZERO;
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}
