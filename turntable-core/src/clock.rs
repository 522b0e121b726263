//! Monotonic frame clock.

use web_time::Instant;

/// Produces the time elapsed between successive frames.
#[derive(Debug, Clone, Default)]
pub struct Clock {
    last: Option<Instant>,
    elapsed: f64,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seconds since the previous call; the first call returns 0.
    pub fn delta(&mut self) -> f32 {
        self.delta_at(Instant::now())
    }

    /// Same as [`Clock::delta`] with an explicit current time.
    pub fn delta_at(&mut self, now: Instant) -> f32 {
        let delta = match self.last {
            Some(last) => now.saturating_duration_since(last).as_secs_f64(),
            None => 0.0,
        };
        self.last = Some(now);
        self.elapsed += delta;
        delta as f32
    }

    /// Total seconds accumulated by [`Clock::delta`] calls.
    #[inline]
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }
}
