use behex_core::{Error, Response, Result, Surface};
use behex_io::{ResponseDevice, Trigger};
use behex_timing::{Clock, Frames};
use tracing::debug;

use crate::experiment::Experiment;

/// Knobs of one presentation window.
///
/// With no explicit `trigger`, the first element's name is looked up in
/// the trigger table (silently presenting when unmapped); `Trigger::Off`
/// suppresses even a mapped default.
#[derive(Debug, Default)]
pub struct PresentOptions {
    pub trigger: Option<Trigger>,
    /// Zero the reaction-time clock at the flip that shows the first
    /// frame, so reaction times count from stimulus onset.
    pub reset_rt_clock: bool,
    /// Poll for a response after every flip and return on the first
    /// matching press.
    pub await_response: bool,
    /// Frame at which a clearing trigger (code 0) is emitted. A value at
    /// or past the end of the presentation is treated as unset.
    pub trigger_off_frame: Option<u32>,
}

impl PresentOptions {
    pub fn awaiting() -> Self {
        PresentOptions {
            reset_rt_clock: true,
            await_response: true,
            ..PresentOptions::default()
        }
    }

    pub fn trigger(mut self, trigger: impl Into<Trigger>) -> Self {
        self.trigger = Some(trigger.into());
        self
    }

    pub fn no_trigger(mut self) -> Self {
        self.trigger = Some(Trigger::Off);
        self
    }

    pub fn trigger_off_at(mut self, frame: u32) -> Self {
        self.trigger_off_frame = Some(frame);
        self
    }
}

impl<S: Surface> Experiment<S> {
    /// Present stimuli for a number of display frames.
    ///
    /// `elements` name entries of the stimulus registry; unknown names
    /// draw nothing, but the frames, triggers and response polling still
    /// run (a blank interval). With `duration` of `None` the frame table
    /// is sampled under the first element's name.
    ///
    /// The loop runs for `duration` refreshes, or until the elapsed
    /// wall-clock time reaches the duration minus half a frame of
    /// tolerance (see `half_frame_tolerance`), whichever comes first -
    /// never more than `duration` refreshes. An infinite duration is only
    /// legal when awaiting a response and is rejected before any frame is
    /// drawn.
    ///
    /// Returns `Ok(None)` for plain presentations; when awaiting, the
    /// first matching press, or a timeout response (no key, NaN reaction
    /// time) if the window ran out. The quit key surfaces as
    /// [`Error::Quit`] from any frame.
    pub fn present(
        &mut self,
        elements: &[&str],
        duration: Option<Frames>,
        opts: &PresentOptions,
    ) -> Result<Option<Response>> {
        let duration = match duration {
            Some(duration) => duration,
            None => {
                let name = elements.first().ok_or_else(|| {
                    Error::config(
                        "present needs a duration or a named first element",
                    )
                })?;
                self.get_time(name).ok_or_else(|| {
                    Error::Config(format!("no timing entry for `{name}`"))
                })?
            }
        };
        if duration.is_infinite() && !opts.await_response {
            return Err(Error::InvalidDuration);
        }

        match &opts.trigger {
            Some(Trigger::Off) => {}
            Some(trigger) => self.triggers.arm(trigger, opts.reset_rt_clock),
            None => {
                if let Some(name) = elements.first() {
                    let default = Trigger::Name((*name).to_string());
                    self.triggers.arm(&default, opts.reset_rt_clock);
                }
            }
        }

        let frames = match duration {
            Frames::Finite(n) => Some(n),
            Frames::Infinite => None,
        };
        let trigger_off = opts
            .trigger_off_frame
            .filter(|off| *off > 0 && frames.is_none_or(|n| *off < n));
        let budget = frames.map(|n| {
            (f64::from(n) - self.half_frame_tolerance) * self.frame_time
        });

        let wall = Clock::new();
        let mut frame = 0u32;
        loop {
            if trigger_off == Some(frame) {
                self.triggers.arm_code(0, false);
            }

            for name in elements {
                if let Some(stim) = self.stim.get(*name) {
                    self.surface.draw(stim)?;
                }
            }
            self.surface.flip()?;

            // the armed code and the clock reset share the swap boundary
            let reset_rt = self
                .triggers
                .fire_armed(&self.exp_clock, self.cursor.current_trial);
            if frame == 0 && (reset_rt || opts.reset_rt_clock) {
                self.input.reset_rt_clock();
            }

            if opts.await_response {
                if let Some(press) =
                    self.input.poll_first(Some(self.mapping.keys()))
                {
                    if self.mapping.is_quit(&press.key) {
                        return Err(Error::Quit);
                    }
                    return Ok(Some(press.into()));
                }
            }
            self.check_quit()?;

            frame += 1;
            if let Some(total) = frames {
                if frame >= total {
                    break;
                }
                if wall.elapsed() >= budget.unwrap_or(f64::INFINITY) {
                    debug!(
                        frame,
                        total, "presentation cut short on wall-clock budget"
                    );
                    break;
                }
            }
        }

        if opts.await_response {
            Ok(Some(Response::timeout()))
        } else {
            Ok(None)
        }
    }
}
