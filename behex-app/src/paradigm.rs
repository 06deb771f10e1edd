use behex_core::{Cell, Error, KeyPress, Result, Row, TRIAL_COL, Table};
use behex_experiment::trialgen::{repeat_rows, shuffle_rows};
use behex_experiment::{Experiment, Paradigm, PresentOptions};
use behex_timing::Frames;

use crate::surface::WindowSurface;
use crate::visual::{ArrowDirection, Visual};

/// Two-alternative arrow task: fixation, an arrow pointing left or
/// right, a response window open until a key arrives, then optional
/// color feedback.
pub struct ArrowTask {
    pub feedback: bool,
}

impl ArrowTask {
    /// Register the stimuli the task draws.
    pub fn build_stimuli(exp: &mut Experiment<WindowSurface>) {
        let white = [255, 255, 255, 255];
        exp.stim
            .insert("fixation".into(), Visual::cross(40.0, 2.0, white));
        exp.stim.insert(
            "left".into(),
            Visual::arrow(ArrowDirection::Left, 60.0, white),
        );
        exp.stim.insert(
            "right".into(),
            Visual::arrow(ArrowDirection::Right, 60.0, white),
        );
        exp.stim.insert(
            "feedback_good".into(),
            Visual::circle(30.0, [0, 160, 0, 255]),
        );
        exp.stim.insert(
            "feedback_bad".into(),
            Visual::circle(30.0, [200, 0, 0, 255]),
        );
    }

    /// Balanced trial table: `n_reps` repetitions of each direction,
    /// shuffled, trial identifiers reassigned consecutively from 1.
    pub fn build_trials(
        exp: &mut Experiment<WindowSurface>,
        n_reps: usize,
    ) -> Result<Table> {
        let base = Table::from_records(
            vec![TRIAL_COL.into(), "dir".into(), "correct_resp".into()],
            vec![
                vec![Cell::Int(0), Cell::from("left"), Cell::from("left")],
                vec![Cell::Int(0), Cell::from("right"), Cell::from("right")],
            ],
        )?;
        let repeated = repeat_rows(&base, n_reps)?;
        let mut trials = shuffle_rows(&repeated, None, exp.rng())?;
        for position in 0..trials.n_rows() {
            trials.set(position, TRIAL_COL, Cell::Int(position as i64 + 1))?;
        }
        Ok(trials)
    }
}

impl Paradigm<WindowSurface> for ArrowTask {
    fn show_trial(
        &mut self,
        exp: &mut Experiment<WindowSurface>,
        trial: Row,
    ) -> Result<()> {
        exp.clear_input();
        exp.present(&["fixation"], None, &PresentOptions::default())?;

        let direction = trial
            .get("dir")
            .and_then(Cell::as_str)
            .ok_or_else(|| Error::config("trial has no `dir` value"))?
            .to_string();
        let response = exp
            .present(
                &[&direction],
                Some(Frames::Infinite),
                &PresentOptions::awaiting(),
            )?
            .expect("awaited presentation yields a response");

        let correct = match response.key {
            Some(key) => {
                let press = KeyPress { key, rt: response.rt };
                let (_, correct, _) = exp.handle_response(Some(press), None)?;
                correct
            }
            None => {
                exp.record_no_response()?;
                false
            }
        };

        if self.feedback {
            let name = if correct { "feedback_good" } else { "feedback_bad" };
            let frames = exp
                .get_time("feedback")
                .ok_or_else(|| Error::config("no `feedback` time"))?;
            exp.present(&[name], Some(frames), &PresentOptions::default())?;
        }
        if let Some(frames) = exp.get_time("after_response") {
            exp.present(&[], Some(frames), &PresentOptions::default())?;
        }
        Ok(())
    }
}
