//! End-to-end runs of the trial sequencer against the simulated surface
//! and scripted input.

use std::collections::HashMap;

use behex_core::{Cell, Error, Key, KeyEvent, Result, Row, TRIAL_COL, Table};
use behex_experiment::sim::{SimSurface, experiment};
use behex_experiment::{
    BreakOptions, Experiment, Paradigm, PresentOptions, RunOptions,
    RunOutcome, Staircase,
};
use behex_io::sim::ScriptedKeys;
use behex_timing::Frames;

/// What the scripted paradigm records for a trial.
#[derive(Clone, Copy, Debug)]
enum Outcome {
    Correct,
    Incorrect,
    NoResponse,
}

/// Paradigm that writes scripted outcomes straight into the behavioral
/// log, with no actual presentation.
struct ScriptedParadigm {
    outcomes: HashMap<i64, Outcome>,
    shown: Vec<i64>,
    append_until: Option<usize>,
}

impl ScriptedParadigm {
    fn new(outcomes: &[(i64, Outcome)]) -> Self {
        ScriptedParadigm {
            outcomes: outcomes.iter().copied().collect(),
            shown: Vec::new(),
            append_until: None,
        }
    }

    fn all_correct() -> Self {
        ScriptedParadigm {
            outcomes: HashMap::new(),
            shown: Vec::new(),
            append_until: None,
        }
    }
}

impl Paradigm<SimSurface> for ScriptedParadigm {
    fn show_trial(
        &mut self,
        exp: &mut Experiment<SimSurface>,
        trial: Row,
    ) -> Result<()> {
        let id = trial.trial().expect("trial id present");
        self.shown.push(id);
        let position = trial.position;
        match self.outcomes.get(&id).copied().unwrap_or(Outcome::Correct) {
            Outcome::Correct => {
                exp.beh.set(position, "key", Cell::from("f"))?;
                exp.beh.set(position, "resp", Cell::from("left"))?;
                exp.beh.set(position, "ifcorrect", Cell::Bool(true))?;
                exp.beh.set(position, "RT", Cell::Float(0.42))?;
            }
            Outcome::Incorrect => {
                exp.beh.set(position, "key", Cell::from("j"))?;
                exp.beh.set(position, "resp", Cell::from("right"))?;
                exp.beh.set(position, "ifcorrect", Cell::Bool(false))?;
                exp.beh.set(position, "RT", Cell::Float(0.61))?;
            }
            Outcome::NoResponse => exp.record_no_response()?,
        }
        Ok(())
    }

    fn after_trial(
        &mut self,
        exp: &mut Experiment<SimSurface>,
        _trial: &Row,
    ) -> Result<()> {
        if let Some(target) = self.append_until {
            if exp.trials.n_rows() < target {
                let next_id = exp.trials.n_rows() as i64 + 1;
                exp.append_trial(vec![
                    Cell::Int(next_id),
                    Cell::from("left"),
                ])?;
            }
        }
        Ok(())
    }
}

fn trial_table(ids: &[i64]) -> Table {
    Table::from_records(
        vec![TRIAL_COL.into(), "correct_resp".into()],
        ids.iter()
            .map(|id| vec![Cell::Int(*id), Cell::from("left")])
            .collect(),
    )
    .unwrap()
}

fn harness(ids: &[i64]) -> (Experiment<SimSurface>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let mut exp = experiment(ScriptedKeys::new(vec![]));
    exp.data_dir = dir.path().to_path_buf();
    exp.set_trials(trial_table(ids));
    (exp, dir)
}

#[test]
fn visits_every_row_once_in_order() {
    let (mut exp, _dir) = harness(&[1, 2, 5, 7, 9]);
    let mut paradigm = ScriptedParadigm::all_correct();

    let outcome = exp
        .run_trials(&mut paradigm, None, &RunOptions::default())
        .unwrap();

    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(paradigm.shown, vec![1, 2, 5, 7, 9]);
    assert_eq!(exp.cursor.current_trial, 9);
    // exactly one populated outcome row per trial
    for position in 0..exp.beh.n_rows() {
        assert_eq!(
            exp.beh.get(position, "ifcorrect"),
            Some(&Cell::Bool(true)),
            "row {position} has no outcome"
        );
    }

    // flushed once per trial, header exactly once
    let text = std::fs::read_to_string(exp.beh_path("")).unwrap();
    assert_eq!(text.lines().count(), 6);
    assert_eq!(text.lines().filter(|l| l.contains("ifcorrect")).count(), 1);

    // a repeated flush with no new data adds nothing
    exp.save_data("").unwrap();
    assert_eq!(
        std::fs::read_to_string(exp.beh_path("")).unwrap(),
        text
    );
}

#[test]
fn resume_continues_past_the_stop() {
    let (mut exp, _dir) = harness(&[1, 2, 5, 7, 9]);
    let mut paradigm = ScriptedParadigm::all_correct();

    let opts = RunOptions { stop_after: Some(5), ..RunOptions::default() };
    exp.run_trials(&mut paradigm, None, &opts).unwrap();
    assert_eq!(paradigm.shown, vec![1, 2, 5]);

    // resuming picks up one past the cursor, never re-presenting
    let mut rest = ScriptedParadigm::all_correct();
    exp.run_trials(&mut rest, None, &RunOptions::default()).unwrap();
    assert_eq!(rest.shown, vec![7, 9]);
}

#[test]
fn start_from_skips_earlier_trials() {
    let (mut exp, _dir) = harness(&[1, 2, 5, 7, 9]);
    let mut paradigm = ScriptedParadigm::all_correct();

    let opts = RunOptions { start_from: Some(5), ..RunOptions::default() };
    exp.run_trials(&mut paradigm, None, &opts).unwrap();
    assert!(paradigm.shown.iter().all(|id| *id >= 5));
    assert_eq!(paradigm.shown, vec![5, 7, 9]);
}

#[test]
fn unknown_start_or_stop_is_a_config_error() {
    let (mut exp, _dir) = harness(&[1, 2, 3]);
    let mut paradigm = ScriptedParadigm::all_correct();

    let opts = RunOptions { start_from: Some(42), ..RunOptions::default() };
    let err = exp.run_trials(&mut paradigm, None, &opts).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert!(paradigm.shown.is_empty());
}

#[test]
fn missing_trial_column_fails_before_the_loop() {
    let dir = tempfile::tempdir().unwrap();
    let mut exp = experiment(ScriptedKeys::new(vec![]));
    exp.data_dir = dir.path().to_path_buf();
    exp.set_trials(
        Table::from_records(
            vec!["dir".into()],
            vec![vec![Cell::from("left")]],
        )
        .unwrap(),
    );

    let mut paradigm = ScriptedParadigm::all_correct();
    let err = exp
        .run_trials(&mut paradigm, None, &RunOptions::default())
        .unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert!(paradigm.shown.is_empty());
}

#[test]
fn accuracy_stop_uses_cumulative_window() {
    // one early error, then correct throughout: the cumulative
    // correctness first reaches 0.8 after trial 5 and stays above it,
    // so the second consecutive window closes the run after trial 6
    let ids: Vec<i64> = (1..=10).collect();
    let (mut exp, _dir) = harness(&ids);
    let mut paradigm = ScriptedParadigm::new(&[(1, Outcome::Incorrect)]);

    let opts = RunOptions {
        stop_at_corr: Some(0.8),
        n_consecutive: 2,
        min_trials: 5,
        ..RunOptions::default()
    };
    let outcome = exp.run_trials(&mut paradigm, None, &opts).unwrap();

    assert_eq!(outcome, RunOutcome::AccuracyReached);
    assert_eq!(paradigm.shown, vec![1, 2, 3, 4, 5, 6]);
}

#[test]
fn accuracy_stop_waits_for_min_trials() {
    let ids: Vec<i64> = (1..=10).collect();
    let (mut exp, _dir) = harness(&ids);
    let mut paradigm = ScriptedParadigm::all_correct();

    let opts = RunOptions {
        stop_at_corr: Some(0.8),
        n_consecutive: 2,
        min_trials: 5,
        ..RunOptions::default()
    };
    let outcome = exp.run_trials(&mut paradigm, None, &opts).unwrap();

    // the threshold is crossed from trial 1 on, but the floor holds the
    // run open until five trials have elapsed
    assert_eq!(outcome, RunOutcome::AccuracyReached);
    assert_eq!(paradigm.shown.len(), 5);
}

#[test]
fn below_threshold_window_resets_the_streak() {
    let ids: Vec<i64> = (1..=10).collect();
    let (mut exp, _dir) = harness(&ids);
    let mut paradigm = ScriptedParadigm::new(&[(2, Outcome::Incorrect)]);

    let opts = RunOptions {
        stop_at_corr: Some(0.6),
        n_consecutive: 2,
        ..RunOptions::default()
    };
    let outcome = exp.run_trials(&mut paradigm, None, &opts).unwrap();

    // windows: 1.0, 0.5 (reset), 0.67, 0.75 -> stop after trial 4
    assert_eq!(outcome, RunOutcome::AccuracyReached);
    assert_eq!(paradigm.shown, vec![1, 2, 3, 4]);
}

#[test]
fn growing_table_extends_the_run() {
    let (mut exp, _dir) = harness(&[1, 2, 3]);
    let mut paradigm = ScriptedParadigm::all_correct();
    paradigm.append_until = Some(6);

    exp.run_trials(&mut paradigm, None, &RunOptions::default()).unwrap();
    assert_eq!(paradigm.shown, vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(exp.beh.n_rows(), 6);
}

struct FixedStaircase {
    values: Vec<f64>,
    reported: Vec<bool>,
}

impl Staircase for FixedStaircase {
    fn next_value(&mut self) -> Option<f64> {
        if self.values.is_empty() {
            None
        } else {
            Some(self.values.remove(0))
        }
    }

    fn add_response(&mut self, correct: bool) {
        self.reported.push(correct);
    }
}

#[test]
fn staircase_drives_its_column_and_stops_cleanly() {
    let (mut exp, _dir) = harness(&[1, 2, 3, 4, 5]);
    let mut paradigm = ScriptedParadigm::new(&[(2, Outcome::Incorrect)]);
    let mut staircase =
        FixedStaircase { values: vec![0.8, 0.6, 0.7], reported: Vec::new() };

    let opts = RunOptions {
        staircase_param: Some("intensity".into()),
        ..RunOptions::default()
    };
    let outcome = exp
        .run_trials(&mut paradigm, Some(&mut staircase), &opts)
        .unwrap();

    // three values, then a clean stop before the fourth trial ran
    assert_eq!(outcome, RunOutcome::StaircaseExhausted);
    assert_eq!(paradigm.shown, vec![1, 2, 3]);
    assert_eq!(staircase.reported, vec![true, false, true]);
    assert_eq!(exp.trials.get(1, "intensity"), Some(&Cell::Float(0.6)));
    assert_eq!(exp.beh.get(1, "intensity"), Some(&Cell::Float(0.6)));
    assert_eq!(exp.beh.get(3, "intensity"), Some(&Cell::Missing));
}

#[test]
fn staircase_without_param_is_a_config_error() {
    let (mut exp, _dir) = harness(&[1, 2, 3]);
    let mut paradigm = ScriptedParadigm::all_correct();
    let mut staircase =
        FixedStaircase { values: vec![0.5], reported: Vec::new() };

    let err = exp
        .run_trials(&mut paradigm, Some(&mut staircase), &RunOptions::default())
        .unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert!(paradigm.shown.is_empty());
}

#[test]
fn staircase_skips_unreported_non_responses() {
    let (mut exp, _dir) = harness(&[1, 2, 3]);
    let mut paradigm = ScriptedParadigm::new(&[(2, Outcome::NoResponse)]);
    let mut staircase = FixedStaircase {
        values: vec![0.8, 0.7, 0.6],
        reported: Vec::new(),
    };

    let opts = RunOptions {
        staircase_param: Some("intensity".into()),
        ignore_no_response: true,
        ..RunOptions::default()
    };
    exp.run_trials(&mut paradigm, Some(&mut staircase), &opts).unwrap();

    // the timed-out trial is not reported back
    assert_eq!(staircase.reported, vec![true, true]);
}

#[test]
fn breaks_fire_every_n_trials_but_not_after_the_last() {
    let (mut exp, _dir) = harness(&[1, 2, 3, 4, 5]);
    exp.settings.break_every_n_trials = Some(2);
    // any key ends a break
    let keys = ScriptedKeys::new(vec![])
        .then_hold(KeyEvent::press(Key::code("space")));
    exp.input = behex_io::ResponseInput::select(
        behex_io::Keyboard::new(Box::new(keys)),
        None,
        false,
    )
    .unwrap();

    let mut paradigm = ScriptedParadigm::all_correct();
    exp.run_trials(&mut paradigm, None, &RunOptions::default()).unwrap();

    // breaks after trials 2 and 4; trial 5 is last, no trailing break.
    // the paradigm never flips, so every flip is a break screen
    assert_eq!(exp.surface.flips, 2);
    assert_eq!(exp.triggers.log().codes(), &[32, 32]);
}

#[test]
fn error_forced_break_fires_immediately() {
    let (mut exp, _dir) = harness(&[1, 2, 3]);
    let keys = ScriptedKeys::new(vec![])
        .then_hold(KeyEvent::press(Key::code("space")));
    exp.input = behex_io::ResponseInput::select(
        behex_io::Keyboard::new(Box::new(keys)),
        None,
        false,
    )
    .unwrap();

    let mut paradigm = ScriptedParadigm::new(&[(2, Outcome::Incorrect)]);
    let opts = RunOptions {
        breaks: BreakOptions { force_on_error: true, ..BreakOptions::default() },
        ..RunOptions::default()
    };
    exp.run_trials(&mut paradigm, None, &opts).unwrap();

    // only the incorrect trial 2 forces a break
    assert_eq!(exp.surface.flips, 1);
}

/// Paradigm that actually presents and collects a response per trial.
struct PresentingParadigm;

impl Paradigm<SimSurface> for PresentingParadigm {
    fn show_trial(
        &mut self,
        exp: &mut Experiment<SimSurface>,
        _trial: Row,
    ) -> Result<()> {
        let response = exp
            .present(
                &["stim"],
                Some(Frames::Finite(20)),
                &PresentOptions::awaiting(),
            )?
            .expect("awaiting always yields a response");
        match response.key {
            Some(key) => {
                let press =
                    behex_core::KeyPress { key, rt: response.rt };
                exp.handle_response(Some(press), None)?;
            }
            None => exp.record_no_response()?,
        }
        Ok(())
    }
}

#[test]
fn quit_mid_presentation_flushes_consistent_files() {
    let (mut exp, _dir) = harness(&[1, 2]);
    exp.stim.insert("stim".into(), "stim".into());
    // trial 1: immediate "f" press; trial 2: quit during frame 1
    let keys = ScriptedKeys::new(vec![
        vec![KeyEvent::press(Key::code("f"))],
        vec![],
        vec![],
        vec![KeyEvent::press(Key::code("q"))],
    ]);
    exp.input = behex_io::ResponseInput::select(
        behex_io::Keyboard::new(Box::new(keys)),
        None,
        false,
    )
    .unwrap();

    let mut paradigm = PresentingParadigm;
    let err = exp
        .run_trials(&mut paradigm, None, &RunOptions::default())
        .unwrap_err();
    assert!(matches!(err, Error::Quit));

    // trial 1 landed on disk complete, trial 2 is present but has no
    // contradictory outcome - its cells are empty
    let text = std::fs::read_to_string(exp.beh_path("")).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[1].contains("true"));
    assert!(lines[1].contains("left"));
    let trial2: Vec<&str> = lines[2].split(',').collect();
    let columns: Vec<&str> = lines[0].split(',').collect();
    let ifcorrect_col =
        columns.iter().position(|c| *c == "ifcorrect").unwrap();
    assert_eq!(trial2[ifcorrect_col], "");

    // the response trigger for trial 1 was flushed too
    let log = std::fs::read_to_string(exp.log_path("")).unwrap();
    assert!(log.lines().count() >= 2);
}

#[test]
fn handle_response_records_the_outcome() {
    let (mut exp, _dir) = harness(&[1]);
    exp.stim.insert("stim".into(), "stim".into());
    let keys =
        ScriptedKeys::new(vec![vec![KeyEvent::press(Key::code("j"))]]);
    exp.input = behex_io::ResponseInput::select(
        behex_io::Keyboard::new(Box::new(keys)),
        None,
        false,
    )
    .unwrap();

    let mut paradigm = PresentingParadigm;
    exp.run_trials(&mut paradigm, None, &RunOptions::default()).unwrap();

    // "j" maps to "right" while the correct response was "left"
    assert_eq!(exp.beh.get(0, "resp"), Some(&Cell::from("right")));
    assert_eq!(exp.beh.get(0, "ifcorrect"), Some(&Cell::Bool(false)));
    assert!(exp
        .beh
        .get(0, "RT")
        .and_then(Cell::as_f64)
        .is_some_and(|rt| rt >= 0.0));
    // the per-key trigger (re-keyed from "right") went out immediately
    assert_eq!(exp.triggers.log().codes(), &[16]);
}
