use std::collections::HashMap;
use std::path::PathBuf;

use behex_core::{
    Cell, Cursor, Error, Key, KeyPress, Result, ResponseMapping, Surface,
    Table,
};
use behex_io::{
    KeySource, Keyboard, ResponseDevice, ResponseInput, Settings,
    TriggerChannel, save_beh_data, save_trigger_log,
};
use behex_io::{BoxLink, TriggerPort};
use behex_timing::{
    Clock, FrameTable, Frames, measure_frame_time, seconds_to_frames,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;

use crate::subject::{Subject, SubjectInfo};

/// Default fraction of a frame subtracted from the presentation loop's
/// wall-clock budget, so refresh-detection jitter does not push a
/// presentation one frame long. Tunable per experiment.
pub const HALF_FRAME_TOLERANCE: f64 = 0.5;

/// The experiment context: every piece of state a run touches, owned in
/// one place and passed by reference to the sequencer, the presentation
/// loop and the break policy.
///
/// `trials` is the trial table; `beh` the behavioral log, a working copy
/// of `trials` created at [`reset_beh`](Experiment::reset_beh) time and
/// extended with outcome columns as they are first written. The cursor is
/// advanced only by [`run_trials`](Experiment::run_trials).
///
/// Two clocks drive timing: `exp_clock` is zeroed once at construction
/// and stamps the trigger log; reaction times come from the input
/// devices' own clocks, re-zeroed at the flip that presents a stimulus.
pub struct Experiment<S: Surface> {
    pub settings: Settings,
    pub surface: S,
    /// Stimulus registry, name to drawable.
    pub stim: HashMap<String, S::Stim>,
    pub mapping: ResponseMapping,
    pub input: ResponseInput,
    pub triggers: TriggerChannel,
    pub trials: Table,
    pub beh: Table,
    pub cursor: Cursor,
    pub exp_clock: Clock,
    pub subject: Subject,
    pub data_dir: PathBuf,
    /// Seconds per display frame, measured or supplied at calibration.
    pub frame_time: f64,
    /// Frame-based timing table, read-only after calibration.
    pub times: FrameTable,
    pub half_frame_tolerance: f64,
    rng: StdRng,
}

impl<S: Surface> std::fmt::Debug for Experiment<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Experiment")
            .field("subject", &self.subject)
            .field("data_dir", &self.data_dir)
            .field("frame_time", &self.frame_time)
            .field("half_frame_tolerance", &self.half_frame_tolerance)
            .finish_non_exhaustive()
    }
}

impl<S: Surface> Experiment<S> {
    /// Wire up the context from loaded settings and the collaborator
    /// devices. The response box, when absent, falls back to the keyboard
    /// unless the settings require it; the trigger port is only attached
    /// when `send_triggers` is set.
    ///
    /// Trigger-table entries keyed by response name are re-keyed to the
    /// physical keys of the selected device, so a response press can be
    /// trigger-stamped by the key it arrived on.
    pub fn new(
        settings: Settings,
        surface: S,
        keyboard: Box<dyn KeySource>,
        response_box: Option<Box<dyn BoxLink>>,
        trigger_port: Option<Box<dyn TriggerPort>>,
        data_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        let input = ResponseInput::select(
            Keyboard::new(keyboard),
            response_box,
            settings.require_response_box,
        )?;

        let keys = if input.has_box() {
            settings.resp_keys_box.clone().ok_or_else(|| {
                Error::config(
                    "response box active but `resp_keys_box` is not set",
                )
            })?
        } else {
            settings.resp_keys.clone()
        };
        let mapping = ResponseMapping::new(
            keys,
            settings.resp_names.clone(),
            settings.quit_key(),
        )?;

        let mut trigger_table = settings.triggers.clone();
        let rekeyed: Vec<(Key, String)> = mapping
            .responses()
            .map(|(key, name)| (key.clone(), name.to_string()))
            .collect();
        for (key, name) in rekeyed {
            if let Some(code) = trigger_table.remove(&name) {
                trigger_table.insert(key.to_string(), code);
            }
        }
        let port = if settings.send_triggers { trigger_port } else { None };
        let triggers = TriggerChannel::new(trigger_table, port);

        let mut rng = StdRng::from_os_rng();
        let subject = Subject::test(&mut rng);

        Ok(Experiment {
            settings,
            surface,
            stim: HashMap::new(),
            mapping,
            input,
            triggers,
            trials: Table::default(),
            beh: Table::default(),
            cursor: Cursor::default(),
            exp_clock: Clock::new(),
            subject,
            data_dir: data_dir.into(),
            frame_time: 0.0,
            times: FrameTable::default(),
            half_frame_tolerance: HALF_FRAME_TOLERANCE,
            rng,
        })
    }

    /// Replace the random generator, for reproducible runs and tests.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Measure the frame time (unless one is supplied) and convert the
    /// seconds-based timing table to frames. Run once at setup; the frame
    /// table is read-only afterwards.
    pub fn calibrate(
        &mut self,
        samples: usize,
        frame_time: Option<f64>,
    ) -> Result<()> {
        let frame_time = match frame_time {
            Some(ft) => ft,
            None => measure_frame_time(&mut self.surface, samples)?,
        };
        self.frame_time = frame_time;
        self.times = seconds_to_frames(&self.settings.times, frame_time);
        info!(frame_time, "display calibrated");
        Ok(())
    }

    /// Install a new trial table and reset all run state against it.
    pub fn set_trials(&mut self, trials: Table) {
        self.trials = trials;
        self.reset_beh();
    }

    /// Reset the progress cursor, re-create the behavioral log as a fresh
    /// working copy of the trial table, and clear the trigger log. Needed
    /// before re-running after a finished sequence.
    pub fn reset_beh(&mut self) {
        self.cursor.reset();
        self.beh = self.trials.clone();
        self.triggers.clear_log();
    }

    /// Append a trial row while a run is in progress (open-ended trial
    /// tables). The behavioral log grows in step, padded with missing
    /// outcome cells.
    pub fn append_trial(&mut self, cells: Vec<Cell>) -> Result<()> {
        self.trials.push_row(cells.clone())?;
        let mut beh_cells = cells;
        beh_cells.resize(self.beh.columns().len(), Cell::Missing);
        self.beh.push_row(beh_cells)?;
        Ok(())
    }

    /// Duration of a named event, drawn fresh from the frame table
    /// (range entries sample a new value per call).
    pub fn get_time(&mut self, name: &str) -> Option<Frames> {
        self.times.sample(name, &mut self.rng)
    }

    /// Zero-based position of the trial being shown.
    pub(crate) fn current_row(&self) -> Result<usize> {
        if self.cursor.current_idx < 0 {
            return Err(Error::config("no trial is being shown"));
        }
        Ok(self.cursor.current_idx as usize)
    }

    /// Poll the keyboard for the quit key; [`Error::Quit`] if pressed.
    pub fn check_quit(&mut self) -> Result<()> {
        if self.input.quit_pressed(self.mapping.quit_key()) {
            return Err(Error::Quit);
        }
        Ok(())
    }

    /// Wait for the subject's response (or take one already collected),
    /// stamp it with its per-key trigger, judge it against the trial's
    /// correct response and record the outcome in the behavioral log at
    /// the cursor row.
    ///
    /// `correct_resp` overrides the `correct_resp` column of the trial
    /// table. Returns `(key, ifcorrect, rt)`.
    pub fn handle_response(
        &mut self,
        collected: Option<KeyPress>,
        correct_resp: Option<&str>,
    ) -> Result<(Key, bool, f64)> {
        let press = match collected {
            Some(press) => press,
            None => self.input.wait_key_checked(
                Some(self.mapping.keys()),
                self.mapping.quit_key(),
            )?,
        };
        // the response trigger goes out now, not at a flip boundary
        if let Some(code) = self.triggers.resolve(&press.key.to_string()) {
            self.triggers.send_now(
                code,
                &self.exp_clock,
                self.cursor.current_trial,
            );
        }
        if self.mapping.is_quit(&press.key) {
            return Err(Error::Quit);
        }

        let position = self.current_row()?;
        let correct_resp = match correct_resp {
            Some(resp) => resp.to_string(),
            None => self
                .trials
                .get(position, "correct_resp")
                .and_then(|cell| cell.as_str())
                .ok_or_else(|| {
                    Error::config(
                        "trial table has no `correct_resp` value \
                         for the current trial",
                    )
                })?
                .to_string(),
        };
        let response = self
            .mapping
            .label(&press.key)
            .unwrap_or_default()
            .to_string();
        let ifcorrect = response == correct_resp;

        self.beh
            .set(position, "key", Cell::Text(press.key.to_string()))?;
        self.beh.set(position, "resp", Cell::Text(response))?;
        self.beh.set(position, "ifcorrect", Cell::Bool(ifcorrect))?;
        self.beh.set(position, "RT", Cell::Float(press.rt))?;
        Ok((press.key, ifcorrect, press.rt))
    }

    /// Record a response window that ran out: counted as incorrect, with
    /// no key and a NaN reaction time.
    pub fn record_no_response(&mut self) -> Result<()> {
        let position = self.current_row()?;
        self.beh.set(position, "ifcorrect", Cell::Bool(false))?;
        self.beh.set(position, "RT", Cell::Float(f64::NAN))?;
        Ok(())
    }

    pub fn beh_path(&self, postfix: &str) -> PathBuf {
        self.data_dir
            .join(format!("{}{}.csv", self.subject.id, postfix))
    }

    pub fn log_path(&self, postfix: &str) -> PathBuf {
        self.data_dir
            .join(format!("{}{}_trig.log", self.subject.id, postfix))
    }

    /// Flush behavioral and trigger logs incrementally - only rows and
    /// entries not written by an earlier call.
    pub fn save_data(&mut self, postfix: &str) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        let beh_path = self.beh_path(postfix);
        let log_path = self.log_path(postfix);
        save_beh_data(&self.beh, &mut self.cursor, &beh_path)?;
        save_trigger_log(
            self.triggers.log(),
            &mut self.cursor,
            &log_path,
        )
    }

    /// Run the subject-info dialog; a cancellation is the quit signal.
    pub fn collect_subject(
        &mut self,
        dialog: &mut dyn SubjectInfo,
    ) -> Result<()> {
        let default = self.subject.clone();
        match dialog.collect(&default)? {
            Some(subject) => {
                info!(id = %subject.id, "subject registered");
                self.subject = subject;
                Ok(())
            }
            None => Err(Error::Quit),
        }
    }

    /// Discard any input queued on all devices.
    pub fn clear_input(&mut self) {
        self.input.clear_buffer();
    }
}
