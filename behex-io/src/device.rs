use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use behex_core::{Error, Key, KeyEvent, KeyPress, Result};
use behex_timing::{Clock, precise_sleep};
use tracing::info;

/// How long to sleep between polls while blocking on a key press.
const POLL_INTERVAL: Duration = Duration::from_micros(500);

/// Raw keyboard event pump, provided by the windowing layer.
pub trait KeySource {
    /// Drain every event queued since the last call.
    fn poll(&mut self) -> Vec<KeyEvent>;
}

/// Driver link to an external response box.
///
/// The box reports presses and releases as separate queue entries, each
/// stamped against the box's own reaction-time timer.
pub trait BoxLink {
    fn poll(&mut self) -> Vec<KeyEvent>;
    fn reset_rt_timer(&mut self);
}

/// Uniform polling interface over input devices.
///
/// `poll_keys` consumes matching presses and leaves everything else
/// queued; `wait_key` blocks until one matching press arrives, silently
/// discarding whatever else comes in while it waits.
pub trait ResponseDevice {
    fn wait_key(&mut self, allowed: Option<&[Key]>) -> KeyPress;

    fn poll_keys(&mut self, allowed: Option<&[Key]>) -> Vec<KeyPress>;

    /// Earliest matching press, consuming all queued matches.
    fn poll_first(&mut self, allowed: Option<&[Key]>) -> Option<KeyPress> {
        self.poll_keys(allowed).into_iter().next()
    }

    /// Discard all pending input, so stale presses do not leak into the
    /// next response window.
    fn clear_buffer(&mut self);

    fn reset_rt_clock(&mut self);
}

fn matches(key: &Key, allowed: Option<&[Key]>) -> bool {
    allowed.is_none_or(|keys| keys.contains(key))
}

/// Keyboard input. Presses are stamped against the device clock on
/// receipt; release events carry no information here and are dropped.
pub struct Keyboard {
    source: Box<dyn KeySource>,
    clock: Clock,
    pending: VecDeque<KeyPress>,
}

impl Keyboard {
    pub fn new(source: Box<dyn KeySource>) -> Self {
        Keyboard {
            source,
            clock: Clock::new(),
            pending: VecDeque::new(),
        }
    }

    fn pump(&mut self) {
        for event in self.source.poll() {
            if event.pressed {
                let rt = event.time.unwrap_or_else(|| self.clock.elapsed());
                self.pending.push_back(KeyPress { key: event.key, rt });
            }
        }
    }

    fn drain(&mut self, allowed: Option<&[Key]>, keep_rest: bool) -> Vec<KeyPress> {
        self.pump();
        let mut out = Vec::new();
        let mut rest = VecDeque::new();
        for press in self.pending.drain(..) {
            if matches(&press.key, allowed) {
                out.push(press);
            } else if keep_rest {
                rest.push_back(press);
            }
        }
        self.pending = rest;
        out
    }

    /// First matching press, discarding scanned non-matching input.
    pub(crate) fn take_press(&mut self, allowed: Option<&[Key]>) -> Option<KeyPress> {
        self.drain(allowed, false).into_iter().next()
    }
}

impl ResponseDevice for Keyboard {
    fn wait_key(&mut self, allowed: Option<&[Key]>) -> KeyPress {
        loop {
            if let Some(press) = self.take_press(allowed) {
                return press;
            }
            precise_sleep(POLL_INTERVAL);
        }
    }

    fn poll_keys(&mut self, allowed: Option<&[Key]>) -> Vec<KeyPress> {
        self.drain(allowed, true)
    }

    fn clear_buffer(&mut self) {
        self.pump();
        self.pending.clear();
    }

    fn reset_rt_clock(&mut self) {
        self.clock.reset();
    }
}

/// External response box behind a [`BoxLink`].
///
/// Only queue entries with `pressed == true` count as responses. Releases
/// decrement the per-key tracking table; a release with no matching prior
/// press is ignored.
pub struct ResponseBox {
    link: Box<dyn BoxLink>,
    held: HashMap<Key, u32>,
    pending: VecDeque<KeyPress>,
}

impl ResponseBox {
    pub fn new(link: Box<dyn BoxLink>) -> Self {
        ResponseBox {
            link,
            held: HashMap::new(),
            pending: VecDeque::new(),
        }
    }

    fn pump(&mut self) {
        for event in self.link.poll() {
            if event.pressed {
                *self.held.entry(event.key.clone()).or_insert(0) += 1;
                let rt = event.time.unwrap_or(f64::NAN);
                self.pending.push_back(KeyPress { key: event.key, rt });
            } else if let Some(count) = self.held.get_mut(&event.key) {
                *count -= 1;
                if *count == 0 {
                    self.held.remove(&event.key);
                }
            }
            // untracked release: ignored
        }
    }

    fn drain(&mut self, allowed: Option<&[Key]>, keep_rest: bool) -> Vec<KeyPress> {
        self.pump();
        let mut out = Vec::new();
        let mut rest = VecDeque::new();
        for press in self.pending.drain(..) {
            if matches(&press.key, allowed) {
                out.push(press);
            } else if keep_rest {
                rest.push_back(press);
            }
        }
        self.pending = rest;
        out
    }

    pub(crate) fn take_press(&mut self, allowed: Option<&[Key]>) -> Option<KeyPress> {
        self.drain(allowed, false).into_iter().next()
    }
}

impl ResponseDevice for ResponseBox {
    fn wait_key(&mut self, allowed: Option<&[Key]>) -> KeyPress {
        loop {
            if let Some(press) = self.take_press(allowed) {
                return press;
            }
            precise_sleep(POLL_INTERVAL);
        }
    }

    fn poll_keys(&mut self, allowed: Option<&[Key]>) -> Vec<KeyPress> {
        self.drain(allowed, true)
    }

    fn clear_buffer(&mut self) {
        self.pump();
        self.pending.clear();
        self.held.clear();
    }

    fn reset_rt_clock(&mut self) {
        self.link.reset_rt_timer();
    }
}

/// The input devices of a run, selected once at setup.
///
/// The response box, when present, is the primary device; the keyboard is
/// always kept around because the quit key lives there even when a box is
/// active.
pub struct ResponseInput {
    keyboard: Keyboard,
    response_box: Option<ResponseBox>,
}

impl std::fmt::Debug for ResponseInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseInput")
            .field("has_box", &self.response_box.is_some())
            .finish_non_exhaustive()
    }
}

impl ResponseInput {
    /// Pick the primary device. Absence of a response box is fatal only
    /// when `require_box` is set; otherwise the keyboard takes over.
    pub fn select(
        keyboard: Keyboard,
        link: Option<Box<dyn BoxLink>>,
        require_box: bool,
    ) -> Result<Self> {
        let response_box = match link {
            Some(link) => Some(ResponseBox::new(link)),
            None if require_box => {
                return Err(Error::DeviceNotFound(
                    "no response box detected".to_string(),
                ));
            }
            None => {
                info!("no response box, using the keyboard");
                None
            }
        };
        Ok(ResponseInput { keyboard, response_box })
    }

    pub fn has_box(&self) -> bool {
        self.response_box.is_some()
    }

    /// Poll the keyboard for the quit key, leaving other presses queued.
    pub fn quit_pressed(&mut self, quit: Option<&Key>) -> bool {
        match quit {
            Some(key) => !self
                .keyboard
                .poll_keys(Some(std::slice::from_ref(key)))
                .is_empty(),
            None => false,
        }
    }

    /// Block until a matching press on the primary device, watching the
    /// keyboard for the quit key the whole time. A quit press - direct or
    /// out-of-band - surfaces as [`Error::Quit`].
    pub fn wait_key_checked(
        &mut self,
        allowed: Option<&[Key]>,
        quit: Option<&Key>,
    ) -> Result<KeyPress> {
        loop {
            if self.quit_pressed(quit) {
                return Err(Error::Quit);
            }
            let press = match self.response_box.as_mut() {
                Some(device) => device.take_press(allowed),
                None => self.keyboard.take_press(allowed),
            };
            if let Some(press) = press {
                if quit == Some(&press.key) {
                    return Err(Error::Quit);
                }
                return Ok(press);
            }
            precise_sleep(POLL_INTERVAL);
        }
    }
}

impl ResponseDevice for ResponseInput {
    fn wait_key(&mut self, allowed: Option<&[Key]>) -> KeyPress {
        match self.response_box.as_mut() {
            Some(device) => device.wait_key(allowed),
            None => self.keyboard.wait_key(allowed),
        }
    }

    fn poll_keys(&mut self, allowed: Option<&[Key]>) -> Vec<KeyPress> {
        match self.response_box.as_mut() {
            Some(device) => device.poll_keys(allowed),
            None => self.keyboard.poll_keys(allowed),
        }
    }

    fn clear_buffer(&mut self) {
        self.keyboard.clear_buffer();
        if let Some(device) = self.response_box.as_mut() {
            device.clear_buffer();
        }
    }

    fn reset_rt_clock(&mut self) {
        self.keyboard.reset_rt_clock();
        if let Some(device) = self.response_box.as_mut() {
            device.reset_rt_clock();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{ScriptedBox, ScriptedKeys};

    fn press(name: &str) -> KeyEvent {
        KeyEvent::press(Key::code(name))
    }

    #[test]
    fn keyboard_stamps_presses_and_drops_releases() {
        let source = ScriptedKeys::new(vec![vec![
            press("f"),
            KeyEvent::release(Key::code("f")),
            press("j"),
        ]]);
        let mut keyboard = Keyboard::new(Box::new(source));
        let presses = keyboard.poll_keys(None);
        assert_eq!(presses.len(), 2);
        assert_eq!(presses[0].key, Key::code("f"));
        assert!(presses[0].rt >= 0.0);
    }

    #[test]
    fn poll_keys_leaves_non_matching_queued() {
        let source = ScriptedKeys::new(vec![vec![press("f"), press("q")]]);
        let mut keyboard = Keyboard::new(Box::new(source));

        let quit = [Key::code("q")];
        let quits = keyboard.poll_keys(Some(&quit));
        assert_eq!(quits.len(), 1);

        // the response press is still there for the next poll
        let rest = keyboard.poll_keys(None);
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].key, Key::code("f"));
    }

    #[test]
    fn wait_key_skips_non_matching() {
        let source = ScriptedKeys::new(vec![
            vec![],
            vec![press("x")],
            vec![press("j")],
        ]);
        let mut keyboard = Keyboard::new(Box::new(source));
        let allowed = [Key::code("f"), Key::code("j")];
        let press = keyboard.wait_key(Some(&allowed));
        assert_eq!(press.key, Key::code("j"));
    }

    #[test]
    fn box_ignores_untracked_release() {
        let link = ScriptedBox::new(vec![vec![
            KeyEvent::release(Key::Button(1)),
            KeyEvent::press_at(Key::Button(2), 0.412),
            KeyEvent::release(Key::Button(2)),
        ]]);
        let mut device = ResponseBox::new(Box::new(link));
        let presses = device.poll_keys(None);
        assert_eq!(presses.len(), 1);
        assert_eq!(presses[0].key, Key::Button(2));
        assert!((presses[0].rt - 0.412).abs() < 1e-12);
    }

    #[test]
    fn clear_buffer_discards_everything() {
        let source = ScriptedKeys::new(vec![vec![press("f")], vec![press("j")]]);
        let mut keyboard = Keyboard::new(Box::new(source));
        keyboard.clear_buffer();
        // only the second batch survives
        let presses = keyboard.poll_keys(None);
        assert_eq!(presses.len(), 1);
        assert_eq!(presses[0].key, Key::code("j"));
    }

    #[test]
    fn missing_box_falls_back_or_fails() {
        let keyboard = Keyboard::new(Box::new(ScriptedKeys::new(vec![])));
        let input = ResponseInput::select(keyboard, None, false).unwrap();
        assert!(!input.has_box());

        let keyboard = Keyboard::new(Box::new(ScriptedKeys::new(vec![])));
        let err = ResponseInput::select(keyboard, None, true).unwrap_err();
        assert!(matches!(err, Error::DeviceNotFound(_)));
    }

    #[test]
    fn wait_key_checked_surfaces_quit() {
        let source = ScriptedKeys::new(vec![vec![press("f")], vec![press("q")]]);
        let keyboard = Keyboard::new(Box::new(source));
        let mut input = ResponseInput::select(keyboard, None, false).unwrap();

        let allowed = [Key::code("j"), Key::code("q")];
        let quit = Key::code("q");
        let err = input
            .wait_key_checked(Some(&allowed), Some(&quit))
            .unwrap_err();
        assert!(matches!(err, Error::Quit));
    }
}
