/// Trigger log: three parallel sequences of (experiment-clock time,
/// trigger code, trial id), append-only. The equal-length invariant is
/// maintained by construction - `push` is the only way in.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TriggerLog {
    times: Vec<f64>,
    codes: Vec<u16>,
    trials: Vec<i64>,
}

impl TriggerLog {
    pub fn push(&mut self, time: f64, code: u16, trial: i64) {
        self.times.push(time);
        self.codes.push(code);
        self.trials.push(trial);
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn clear(&mut self) {
        self.times.clear();
        self.codes.clear();
        self.trials.clear();
    }

    /// Entries from `start` on, for incremental flushing.
    pub fn entries_from(
        &self,
        start: usize,
    ) -> impl Iterator<Item = (f64, u16, i64)> + '_ {
        (start..self.len())
            .map(|i| (self.times[i], self.codes[i], self.trials[i]))
    }

    pub fn codes(&self) -> &[u16] {
        &self.codes
    }

    pub fn trials(&self) -> &[i64] {
        &self.trials
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }
}
