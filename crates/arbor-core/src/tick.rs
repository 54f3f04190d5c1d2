/// Per-tick input handed to every evaluation step.
///
/// `now` is the simulation clock in the same time units as leaf durations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickContext {
    pub tick: u64,
    pub dt_seconds: f32,
    pub now: f64,
}

impl TickContext {
    pub fn new(tick: u64, now: f64) -> Self {
        Self {
            tick,
            dt_seconds: 0.0,
            now,
        }
    }

    pub fn elapsed_since(&self, start: f64) -> f64 {
        self.now - start
    }
}

/// Fixed-step clock: every [`FixedClock::advance`] yields the next tick.
///
/// `now` is derived from the tick count rather than accumulated, so tick `n` always reads
/// `origin + n * dt` regardless of how long the clock has been running.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedClock {
    next_tick: u64,
    origin: f64,
    step: f64,
}

impl FixedClock {
    pub fn new(dt_seconds: f64) -> Self {
        Self {
            next_tick: 0,
            origin: 0.0,
            step: dt_seconds,
        }
    }

    pub fn starting_at(mut self, now: f64) -> Self {
        self.origin = now;
        self
    }

    pub fn advance(&mut self) -> TickContext {
        let ctx = TickContext {
            tick: self.next_tick,
            dt_seconds: self.step as f32,
            now: self.origin + self.next_tick as f64 * self.step,
        };
        self.next_tick += 1;
        ctx
    }
}
