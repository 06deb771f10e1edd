use std::collections::HashMap;

use behex_core::TriggerLog;
use behex_timing::Clock;
use tracing::{debug, warn};

/// Hardware trigger output (LPT port, Cedrus c-pod, ...).
///
/// `write` latches `code` on the output lines; writing `0` clears them.
pub trait TriggerPort {
    fn write(&mut self, code: u16) -> std::io::Result<()>;
}

/// What to emit for an event: a raw code, a symbolic name resolved through
/// the trigger table, or explicitly nothing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Trigger {
    Code(u16),
    Name(String),
    Off,
}

impl From<u16> for Trigger {
    fn from(code: u16) -> Self {
        Trigger::Code(code)
    }
}

impl From<&str> for Trigger {
    fn from(name: &str) -> Self {
        Trigger::Name(name.to_string())
    }
}

#[derive(Clone, Copy, Debug)]
struct Armed {
    code: u16,
    reset_rt: bool,
}

/// Schedules trigger codes for emission at the next buffer swap and keeps
/// the trigger log.
///
/// A code armed with [`arm`](TriggerChannel::arm) is emitted by
/// [`fire_armed`](TriggerChannel::fire_armed), which the presentation loop
/// calls right after the flip the code was armed for - so the hardware
/// pulse, the log timestamp and an optional reaction-time clock reset all
/// share the swap boundary.
///
/// A failing port write never aborts the run: the port is disabled for the
/// rest of the run, a single warning is emitted, and the channel keeps
/// logging codes.
pub struct TriggerChannel {
    table: HashMap<String, u16>,
    port: Option<Box<dyn TriggerPort>>,
    port_failed: bool,
    log: TriggerLog,
    armed: Option<Armed>,
}

impl TriggerChannel {
    pub fn new(
        table: HashMap<String, u16>,
        port: Option<Box<dyn TriggerPort>>,
    ) -> Self {
        TriggerChannel {
            table,
            port,
            port_failed: false,
            log: TriggerLog::default(),
            armed: None,
        }
    }

    /// Trigger code mapped to a symbolic name, if any.
    pub fn resolve(&self, name: &str) -> Option<u16> {
        self.table.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    /// Schedule a trigger for the next flip. Unmapped names are a no-op,
    /// not an error - stimuli without a trigger entry simply present
    /// silently. `reset_rt` asks for the reaction-time clock to be zeroed
    /// at the same swap boundary.
    pub fn arm(&mut self, trigger: &Trigger, reset_rt: bool) {
        let code = match trigger {
            Trigger::Code(code) => Some(*code),
            Trigger::Name(name) => self.resolve(name),
            Trigger::Off => None,
        };
        if let Some(code) = code {
            self.armed = Some(Armed { code, reset_rt });
        }
    }

    pub fn arm_code(&mut self, code: u16, reset_rt: bool) {
        self.armed = Some(Armed { code, reset_rt });
    }

    pub fn has_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Emit the armed code, if any. Called immediately after the flip the
    /// code was armed for. Returns whether a reaction-time clock reset was
    /// requested for this boundary.
    pub fn fire_armed(&mut self, exp_clock: &Clock, trial: i64) -> bool {
        match self.armed.take() {
            Some(armed) => {
                self.send_now(armed.code, exp_clock, trial);
                armed.reset_rt
            }
            None => false,
        }
    }

    /// Write `code` to the port (when one is attached and healthy) and
    /// append it to the trigger log. Code `0` means "trigger cleared" and
    /// is logged like any other code.
    pub fn send_now(&mut self, code: u16, exp_clock: &Clock, trial: i64) {
        if !self.port_failed {
            if let Some(port) = self.port.as_mut() {
                if let Err(err) = port.write(code) {
                    self.port_failed = true;
                    warn!(
                        %err,
                        code,
                        "trigger port write failed; \
                         continuing with log-only triggers"
                    );
                } else {
                    debug!(code, trial, "trigger sent");
                }
            }
        }
        self.log.push(exp_clock.elapsed(), code, trial);
    }

    pub fn log(&self) -> &TriggerLog {
        &self.log
    }

    /// Clear the log, at sequence-reset time.
    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    /// Whether hardware triggering has been degraded to log-only.
    pub fn degraded(&self) -> bool {
        self.port_failed
    }
}
