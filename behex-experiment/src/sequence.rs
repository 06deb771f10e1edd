use behex_core::{Cell, Error, Result, Row, Surface, TRIAL_COL, Table};
use tracing::{info, warn};

use crate::breaks::{BreakOptions, break_due};
use crate::experiment::Experiment;

/// Per-trial collaborator: the concrete experiment supplies "show one
/// trial given its row". `after_trial` runs once the trial's data has
/// been flushed, for bookkeeping the paradigm wants per trial.
pub trait Paradigm<S: Surface> {
    fn show_trial(&mut self, exp: &mut Experiment<S>, trial: Row) -> Result<()>;

    fn after_trial(
        &mut self,
        _exp: &mut Experiment<S>,
        _trial: &Row,
    ) -> Result<()> {
        Ok(())
    }
}

/// Adaptive controller driving one trial-table column.
///
/// `next_value` returning `None` signals exhaustion, which ends the
/// sequence cleanly. `add_result` is the full-row alternative to plain
/// correctness reporting; controllers that only need correctness keep the
/// default no-op.
pub trait Staircase {
    fn next_value(&mut self) -> Option<f64>;

    fn add_response(&mut self, correct: bool);

    fn add_result(&mut self, _row: &Row) {}
}

/// What gets reported back to the staircase after each trial.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StaircaseReport {
    #[default]
    Correctness,
    FullRow,
}

/// Options of one sequencing run.
#[derive(Debug)]
pub struct RunOptions {
    /// Trial identifier to start at (exact match); `None` resumes one
    /// past the cursor.
    pub start_from: Option<i64>,
    /// Trial identifier to stop after, inclusive; `None` runs to the end
    /// of the table, re-reading its length every iteration so trials
    /// appended mid-run are picked up.
    pub stop_after: Option<i64>,
    /// Accuracy threshold for early stopping, evaluated over all
    /// behavioral rows with trial identifier at or below the current one.
    pub stop_at_corr: Option<f64>,
    /// How many consecutive evaluations must sit at or above the
    /// threshold before stopping.
    pub n_consecutive: u32,
    /// Trials that must have elapsed before an accuracy stop may fire.
    pub min_trials: u32,
    /// Postfix added to the subject identifier in data file names.
    pub subject_postfix: String,
    /// Column written with staircase values; required when a staircase
    /// is attached.
    pub staircase_param: Option<String>,
    pub staircase_report: StaircaseReport,
    /// Skip staircase reporting for trials with no recorded reaction
    /// time.
    pub ignore_no_response: bool,
    pub breaks: BreakOptions,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            start_from: None,
            stop_after: None,
            stop_at_corr: None,
            n_consecutive: 1,
            min_trials: 0,
            subject_postfix: String::new(),
            staircase_param: None,
            staircase_report: StaircaseReport::default(),
            ignore_no_response: false,
            breaks: BreakOptions::default(),
        }
    }
}

/// How a sequencing run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// The stop boundary was reached.
    Completed,
    /// The accuracy-based early stop fired.
    AccuracyReached,
    /// The staircase ran out of values.
    StaircaseExhausted,
}

/// Correct/total over behavioral rows with trial identifier at or below
/// `current_trial`. Only rows whose `ifcorrect` cell has been populated
/// count; trials not yet shown are excluded, recorded non-responses count
/// as incorrect.
pub(crate) fn correctness_tally(
    beh: &Table,
    current_trial: i64,
) -> (usize, usize) {
    let Some(trials) = beh.column(TRIAL_COL) else {
        return (0, 0);
    };
    let Some(outcomes) = beh.column("ifcorrect") else {
        return (0, 0);
    };
    let mut total = 0;
    let mut correct = 0;
    for (trial, outcome) in trials.zip(outcomes) {
        if trial.as_i64().is_some_and(|t| t <= current_trial) {
            match outcome.as_bool() {
                Some(true) => {
                    total += 1;
                    correct += 1;
                }
                Some(false) => total += 1,
                None => {}
            }
        }
    }
    (total, correct)
}

impl<S: Surface> Experiment<S> {
    /// Present all trials from the resolved start to the resolved stop.
    ///
    /// Each iteration advances the cursor, lets the staircase (when
    /// attached) set its column, hands the row to the paradigm, reports
    /// the outcome back to the staircase, flushes both logs
    /// incrementally, evaluates the accuracy stop, and consults the break
    /// policy - except after the final trial.
    ///
    /// A quit press anywhere inside the loop flushes the logs before the
    /// error unwinds, so files on disk stay consistent.
    pub fn run_trials<P: Paradigm<S>>(
        &mut self,
        paradigm: &mut P,
        mut staircase: Option<&mut (dyn Staircase + '_)>,
        opts: &RunOptions,
    ) -> Result<RunOutcome> {
        let outcome = self.run_inner(paradigm, staircase.as_deref_mut(), opts);
        if matches!(outcome, Err(Error::Quit)) {
            if let Err(err) = self.save_data(&opts.subject_postfix) {
                warn!(%err, "final flush after quit failed");
            }
            info!("quit key pressed, sequence aborted");
        }
        outcome
    }

    fn run_inner<P: Paradigm<S>>(
        &mut self,
        paradigm: &mut P,
        mut staircase: Option<&mut (dyn Staircase + '_)>,
        opts: &RunOptions,
    ) -> Result<RunOutcome> {
        self.trials.require_column(TRIAL_COL)?;
        if staircase.is_some() && opts.staircase_param.is_none() {
            return Err(Error::config(
                "a staircase needs `staircase_param` naming the column \
                 it drives",
            ));
        }

        let mut position = match opts.start_from {
            Some(id) => self.trials.find_trial(id).ok_or_else(|| {
                Error::Config(format!(
                    "`start_from` trial {id} not in the trial table"
                ))
            })?,
            None => self.cursor.next_position(),
        };
        let stop_position = match opts.stop_after {
            Some(id) => Some(self.trials.find_trial(id).ok_or_else(|| {
                Error::Config(format!(
                    "`stop_after` trial {id} not in the trial table"
                ))
            })?),
            None => None,
        };

        let mut n_above = 0u32;
        let mut elapsed_trials = 0u32;
        let mut trials_without_break = 0u32;
        let mut tally = None;

        loop {
            // without an explicit stop, the boundary tracks the table,
            // which may have grown since the last iteration
            let last = match stop_position {
                Some(stop) => stop,
                None => match self.trials.n_rows().checked_sub(1) {
                    Some(last) => last,
                    None => break,
                },
            };
            if position > last {
                break;
            }

            let key = self
                .trials
                .key_at(position)
                .cloned()
                .expect("position is bounded by the table length");
            let trial_id = self.trials.trial_at(position)?;
            self.cursor.advance(position, key, trial_id);

            if let Some(stair) = staircase.as_deref_mut() {
                let param =
                    opts.staircase_param.as_deref().expect("checked above");
                match stair.next_value() {
                    Some(value) => {
                        self.trials.set(position, param, Cell::Float(value))?;
                        self.beh.set(position, param, Cell::Float(value))?;
                    }
                    None => {
                        info!("staircase exhausted, stopping the sequence");
                        self.save_data(&opts.subject_postfix)?;
                        return Ok(RunOutcome::StaircaseExhausted);
                    }
                }
            }

            let row = self.trials.row(position).expect("cursor row exists");
            paradigm.show_trial(self, row.clone())?;
            elapsed_trials += 1;

            if let Some(stair) = staircase.as_deref_mut() {
                let rt = self.beh.get(position, "RT").and_then(Cell::as_f64);
                let no_response = rt.is_none_or(f64::is_nan);
                if !(no_response && opts.ignore_no_response) {
                    match opts.staircase_report {
                        StaircaseReport::Correctness => {
                            let correct = self
                                .beh
                                .get(position, "ifcorrect")
                                .and_then(Cell::as_bool)
                                .unwrap_or(false);
                            stair.add_response(correct);
                        }
                        StaircaseReport::FullRow => {
                            let beh_row =
                                self.beh.row(position).expect("row exists");
                            stair.add_result(&beh_row);
                        }
                    }
                }
            }

            self.save_data(&opts.subject_postfix)?;
            paradigm.after_trial(self, &row)?;

            if let Some(threshold) = opts.stop_at_corr {
                let (total, correct) =
                    correctness_tally(&self.beh, self.cursor.current_trial);
                tally = Some((total, correct));
                let correctness = if total > 0 {
                    correct as f64 / total as f64
                } else {
                    0.0
                };
                n_above =
                    if correctness >= threshold { n_above + 1 } else { 0 };
                if n_above >= opts.n_consecutive.max(1)
                    && elapsed_trials >= opts.min_trials
                {
                    info!(correctness, "accuracy threshold reached");
                    return Ok(RunOutcome::AccuracyReached);
                }
            } else if opts.breaks.show_correctness {
                tally = Some(correctness_tally(
                    &self.beh,
                    self.cursor.current_trial,
                ));
            }

            let is_last = match stop_position {
                Some(stop) => position == stop,
                None => position + 1 >= self.trials.n_rows(),
            };
            if !is_last {
                trials_without_break += 1;
                let force = opts.breaks.force_on_error
                    && self
                        .beh
                        .get(position, "ifcorrect")
                        .and_then(Cell::as_bool)
                        == Some(false);
                if break_due(
                    trials_without_break,
                    self.settings.break_every_n_trials,
                    force,
                ) {
                    trials_without_break = 0;
                    self.present_break(&opts.breaks, tally)?;
                }
            }

            position += 1;
        }
        Ok(RunOutcome::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn beh(rows: &[(i64, Option<bool>)]) -> Table {
        Table::from_records(
            vec![TRIAL_COL.into(), "ifcorrect".into()],
            rows.iter()
                .map(|(trial, correct)| {
                    vec![
                        Cell::Int(*trial),
                        correct.map(Cell::Bool).unwrap_or(Cell::Missing),
                    ]
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn tally_ignores_unshown_trials() {
        let table = beh(&[
            (1, Some(true)),
            (2, Some(false)),
            (3, Some(true)),
            (4, None),
            (5, None),
        ]);
        assert_eq!(correctness_tally(&table, 3), (3, 2));
        assert_eq!(correctness_tally(&table, 5), (3, 2));
    }

    #[test]
    fn tally_without_outcome_column_is_empty() {
        let table = Table::from_records(
            vec![TRIAL_COL.into()],
            vec![vec![Cell::Int(1)]],
        )
        .unwrap();
        assert_eq!(correctness_tally(&table, 1), (0, 0));
    }
}
