use std::fmt;

use serde::{Deserialize, Serialize};

/// Physical input identifier: a named keyboard key or a response-box button.
///
/// Settings files spell keyboard keys as strings (`"f"`, `"left"`) and box
/// buttons as plain integers, so the two variants deserialize untagged.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    Button(u8),
    Code(String),
}

impl Key {
    pub fn code(name: &str) -> Self {
        Key::Code(name.to_string())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Button(n) => write!(f, "{n}"),
            Key::Code(name) => f.write_str(name),
        }
    }
}

/// Raw queue entry reported by an input device.
///
/// Response boxes report presses and releases as separate entries with a
/// device-native timestamp; keyboards report presses without one (they are
/// stamped against the device clock on receipt).
#[derive(Clone, Debug, PartialEq)]
pub struct KeyEvent {
    pub key: Key,
    pub pressed: bool,
    /// Seconds on the device reaction-time clock, when the device has one.
    pub time: Option<f64>,
}

impl KeyEvent {
    pub fn press(key: Key) -> Self {
        KeyEvent { key, pressed: true, time: None }
    }

    pub fn release(key: Key) -> Self {
        KeyEvent { key, pressed: false, time: None }
    }

    pub fn press_at(key: Key, time: f64) -> Self {
        KeyEvent { key, pressed: true, time: Some(time) }
    }
}

/// A registered press, timed against the reaction-time clock.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyPress {
    pub key: Key,
    /// Seconds since the last reaction-time clock reset.
    pub rt: f64,
}

/// Outcome of an awaited presentation window.
///
/// `key` is `None` when the window ran out without a matching press; the
/// reaction time is NaN in that case.
#[derive(Clone, Debug)]
pub struct Response {
    pub key: Option<Key>,
    pub rt: f64,
}

impl Response {
    pub fn timeout() -> Self {
        Response { key: None, rt: f64::NAN }
    }

    pub fn is_response(&self) -> bool {
        self.key.is_some()
    }
}

impl From<KeyPress> for Response {
    fn from(press: KeyPress) -> Self {
        Response { key: Some(press.key), rt: press.rt }
    }
}
