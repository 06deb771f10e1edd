use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use behex_core::{Error, Key, Result};
use behex_timing::TimeTable;
use serde::Deserialize;

fn default_language() -> String {
    "eng".to_string()
}

/// The reserved quit key: enabled or not, and which physical key.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct QuitOptions {
    pub enable: bool,
    pub button: Key,
}

/// Experiment settings, loaded once from a `settings.json` file.
///
/// `resp_keys` is the keyboard mapping; `resp_keys_box` the alternative
/// used when a response box is attached. `triggers` maps event and
/// response names to hardware codes. Keys the scaffolding does not know
/// about are kept in `extra` for the concrete experiment (stimulus sizes,
/// colors, and so on).
#[derive(Clone, Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub send_triggers: bool,
    pub resp_keys: Vec<Key>,
    #[serde(default)]
    pub resp_keys_box: Option<Vec<Key>>,
    pub resp_names: Vec<String>,
    pub triggers: HashMap<String, u16>,
    pub quit: QuitOptions,
    pub times: TimeTable,
    #[serde(default)]
    pub break_every_n_trials: Option<u32>,
    #[serde(default)]
    pub require_response_box: bool,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(text)
            .map_err(|e| Error::Config(format!("invalid settings: {e}")))?;
        if settings.resp_keys.len() != settings.resp_names.len() {
            return Err(Error::Config(format!(
                "{} resp_keys but {} resp_names",
                settings.resp_keys.len(),
                settings.resp_names.len()
            )));
        }
        Ok(settings)
    }

    /// Quit key when quitting is enabled.
    pub fn quit_key(&self) -> Option<Key> {
        self.quit.enable.then(|| self.quit.button.clone())
    }
}

#[cfg(test)]
mod tests {
    use behex_timing::TimeSpec;

    use super::*;

    pub const EXAMPLE: &str = r#"{
        "send_triggers": false,
        "resp_keys": ["f", "j"],
        "resp_keys_box": [1, 2],
        "resp_names": ["left", "right"],
        "triggers": {"left": 8, "right": 16, "fixation": 1, "break": 32},
        "quit": {"enable": true, "button": "q"},
        "times": {"fixation": [0.5, 1.0], "stim": 0.1, "probe": "inf"},
        "break_every_n_trials": 10,
        "language": "eng",
        "fixation_radius": 0.15
    }"#;

    #[test]
    fn parses_full_example() {
        let s = Settings::from_json(EXAMPLE).unwrap();
        assert_eq!(s.resp_keys, vec![Key::code("f"), Key::code("j")]);
        assert_eq!(
            s.resp_keys_box,
            Some(vec![Key::Button(1), Key::Button(2)])
        );
        assert_eq!(s.triggers["left"], 8);
        assert_eq!(s.quit_key(), Some(Key::code("q")));
        assert_eq!(s.times.get("stim"), Some(TimeSpec::Fixed(0.1)));
        assert_eq!(s.break_every_n_trials, Some(10));
        assert!(s.extra.contains_key("fixation_radius"));
    }

    #[test]
    fn missing_required_key_is_config_error() {
        let err = Settings::from_json(r#"{"resp_keys": ["f"]}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn key_name_count_mismatch_rejected() {
        let bad = EXAMPLE.replace(r#""resp_names": ["left", "right"]"#,
                                  r#""resp_names": ["left"]"#);
        assert!(Settings::from_json(&bad).is_err());
    }
}
