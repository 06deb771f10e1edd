//! Deterministic stand-ins for hardware, used by the test suites and
//! available to downstream crates for dry runs without devices attached.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use behex_core::KeyEvent;

use crate::device::{BoxLink, KeySource};
use crate::trigger::TriggerPort;

/// Shared view of the codes written to a [`RecordingPort`], kept outside
/// the port because the channel takes ownership of it.
#[derive(Clone, Debug, Default)]
pub struct SharedCodes(Rc<RefCell<Vec<u16>>>);

impl SharedCodes {
    pub fn take(&self) -> Vec<u16> {
        self.0.borrow_mut().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
}

/// Trigger port that records every write.
pub struct RecordingPort {
    codes: SharedCodes,
}

impl RecordingPort {
    pub fn new(codes: SharedCodes) -> Self {
        RecordingPort { codes }
    }
}

impl TriggerPort for RecordingPort {
    fn write(&mut self, code: u16) -> std::io::Result<()> {
        self.codes.0.borrow_mut().push(code);
        Ok(())
    }
}

/// Trigger port whose writes always fail, for degradation tests.
pub struct FailingPort;

impl TriggerPort for FailingPort {
    fn write(&mut self, _code: u16) -> std::io::Result<()> {
        Err(std::io::Error::new(
            std::io::ErrorKind::NotConnected,
            "trigger port unplugged",
        ))
    }
}

/// Shared counter, for observing clock resets on a scripted device.
#[derive(Clone, Debug, Default)]
pub struct SharedCount(Rc<RefCell<u32>>);

impl SharedCount {
    pub fn get(&self) -> u32 {
        *self.0.borrow()
    }

    fn bump(&self) {
        *self.0.borrow_mut() += 1;
    }
}

/// Keyboard source replaying scripted event batches, one batch per poll.
///
/// Once the script is exhausted, polls return nothing - unless a held
/// event was configured with [`then_hold`](ScriptedKeys::then_hold), which
/// makes every further poll yield that event (so blocking waits in tests
/// terminate).
pub struct ScriptedKeys {
    batches: VecDeque<Vec<KeyEvent>>,
    held: Option<KeyEvent>,
}

impl ScriptedKeys {
    pub fn new(batches: Vec<Vec<KeyEvent>>) -> Self {
        ScriptedKeys { batches: batches.into(), held: None }
    }

    pub fn then_hold(mut self, event: KeyEvent) -> Self {
        self.held = Some(event);
        self
    }
}

impl KeySource for ScriptedKeys {
    fn poll(&mut self) -> Vec<KeyEvent> {
        match self.batches.pop_front() {
            Some(batch) => batch,
            None => self.held.clone().map(|e| vec![e]).unwrap_or_default(),
        }
    }
}

/// Response-box link replaying scripted batches, counting RT resets.
pub struct ScriptedBox {
    batches: VecDeque<Vec<KeyEvent>>,
    resets: SharedCount,
}

impl ScriptedBox {
    pub fn new(batches: Vec<Vec<KeyEvent>>) -> Self {
        ScriptedBox { batches: batches.into(), resets: SharedCount::default() }
    }

    /// Clone of the reset counter, to keep after the box is moved into
    /// the device.
    pub fn resets(&self) -> SharedCount {
        self.resets.clone()
    }
}

impl BoxLink for ScriptedBox {
    fn poll(&mut self) -> Vec<KeyEvent> {
        self.batches.pop_front().unwrap_or_default()
    }

    fn reset_rt_timer(&mut self) {
        self.resets.bump();
    }
}
