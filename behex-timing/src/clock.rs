use std::time::Instant;

/// Monotonic stopwatch reporting seconds since its last reset.
///
/// Two instances drive a run: the experiment clock, zeroed once at start
/// and never again (trigger-log timestamps), and the response clock,
/// re-zeroed at the flip that presents a stimulus so reaction times count
/// from stimulus onset.
#[derive(Clone, Debug)]
pub struct Clock {
    start: Instant,
}

impl Clock {
    pub fn new() -> Self {
        Clock { start: Instant::now() }
    }

    pub fn reset(&mut self) {
        self.start = Instant::now();
    }

    /// Seconds elapsed since the last reset.
    pub fn elapsed(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Clock::new()
    }
}
