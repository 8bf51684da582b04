/// default countdown rate, in Hz
pub const DEFAULT_TIMER_RATE: f64 = 60.0;

/// Countdown register decremented at a fixed rate by accumulated wall-clock
/// time, independently of how fast instructions execute.
#[derive(Debug, Clone, PartialEq)]
pub struct Timer {
    decrement_threshold: f64,
    elapsed: f64,
    pub value: u8,
}

impl Timer {
    pub fn new(rate_hz: f64) -> Self {
        Timer {
            decrement_threshold: 1.0 / rate_hz,
            elapsed: 0.0,
            value: 0,
        }
    }

    /// seconds between decrements
    pub fn decrement_threshold(&self) -> f64 {
        self.decrement_threshold
    }

    /// seconds accumulated since the last decrement
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Advance by `dt` seconds. At most one decrement is applied per call, so
    /// callers should keep `dt` below the threshold; any surplus is carried
    /// over rather than turned into extra decrements.
    pub fn tick(&mut self, dt: f64) {
        self.elapsed += dt;
        if self.elapsed >= self.decrement_threshold {
            self.elapsed -= self.decrement_threshold;
            self.value = self.value.saturating_sub(1);
        }
    }
}

impl Default for Timer {
    fn default() -> Self {
        Timer::new(DEFAULT_TIMER_RATE)
    }
}
