use crate::table::RowKey;

/// Progress through the trial table, advanced only by the sequencer.
///
/// `current_idx` is the zero-based position of the trial being (or last)
/// shown, -1 before anything ran; `current_trial` the identifier at that
/// position; `current_loc` the row key. The two save marks bound the
/// incremental-flush windows for the behavioral and trigger logs.
#[derive(Clone, Debug, PartialEq)]
pub struct Cursor {
    pub current_idx: isize,
    pub current_trial: i64,
    pub current_loc: Option<RowKey>,
    pub last_beh_save: usize,
    pub last_log_save: usize,
}

impl Default for Cursor {
    fn default() -> Self {
        Cursor {
            current_idx: -1,
            current_trial: 0,
            current_loc: None,
            last_beh_save: 0,
            last_log_save: 0,
        }
    }
}

impl Cursor {
    pub fn reset(&mut self) {
        *self = Cursor::default();
    }

    pub fn advance(&mut self, position: usize, key: RowKey, trial: i64) {
        self.current_idx = position as isize;
        self.current_loc = Some(key);
        self.current_trial = trial;
    }

    /// Position of the next trial to show (resume semantics).
    pub fn next_position(&self) -> usize {
        (self.current_idx + 1) as usize
    }
}
