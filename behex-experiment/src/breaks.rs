use behex_core::{Result, Surface};
use behex_io::{ResponseDevice, Trigger};

use crate::experiment::Experiment;
use crate::present::PresentOptions;

/// Periodic-break predicate: a break is due after `every` trials since
/// the last one (`None` or 0 disables periodic breaks), or when forced by
/// a per-trial rule.
pub fn break_due(since_break: u32, every: Option<u32>, force: bool) -> bool {
    force || every.is_some_and(|n| n > 0 && since_break >= n)
}

/// What the break screen shows and when extra breaks fire.
#[derive(Clone, Debug, Default)]
pub struct BreakOptions {
    /// Stimulus-registry name of an image shown during the break.
    pub image: Option<String>,
    /// Free text shown during the break.
    pub text: Option<String>,
    /// Display the running correctness tally.
    pub show_correctness: bool,
    /// Force a break after every incorrect response.
    pub force_on_error: bool,
}

fn correctness_text(language: &str, total: usize, correct: usize) -> String {
    let percent = if total > 0 {
        correct as f64 / total as f64 * 100.0
    } else {
        0.0
    };
    match language {
        "pl" => format!("{correct} / {total} poprawnych wyborów ({percent:.1}%)"),
        _ => format!("{correct} / {total} correct choices ({percent:.1}%)"),
    }
}

impl<S: Surface> Experiment<S> {
    /// Show the break screen and block until the subject (or operator)
    /// acknowledges it with a key press. The `break` trigger is emitted
    /// with the screen when mapped; afterwards the `after_break` (or
    /// `after_response`) settle interval runs if the timing table has
    /// one.
    pub fn present_break(
        &mut self,
        opts: &BreakOptions,
        tally: Option<(usize, usize)>,
    ) -> Result<()> {
        if self.triggers.contains("break") {
            self.triggers.arm(&Trigger::from("break"), false);
        }

        if let Some(name) = &opts.image {
            if let Some(stim) = self.stim.get(name) {
                self.surface.draw(stim)?;
            }
        }
        if let Some(text) = &opts.text {
            let stim = self.surface.make_text(text)?;
            self.surface.draw(&stim)?;
        }
        if opts.show_correctness {
            if let Some((total, correct)) = tally {
                let text = correctness_text(
                    &self.settings.language,
                    total,
                    correct,
                );
                let stim = self.surface.make_text(&text)?;
                self.surface.draw(&stim)?;
            }
        }
        self.surface.flip()?;
        let _ = self
            .triggers
            .fire_armed(&self.exp_clock, self.cursor.current_trial);

        // stale input must not end the break instantly
        self.input.clear_buffer();
        self.input.wait_key_checked(None, self.mapping.quit_key())?;

        for name in ["after_break", "after_response"] {
            if let Some(frames) = self.get_time(name) {
                self.present(&[], Some(frames), &PresentOptions::default())?;
                break;
            }
        }
        Ok(())
    }
}
