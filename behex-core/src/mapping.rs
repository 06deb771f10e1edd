use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::key::Key;

/// Reserved semantic label for the quit key.
pub const QUIT_LABEL: &str = "quit";

/// Bijective-per-key mapping from physical keys to semantic response
/// labels, plus its inverse. Built once at setup from the settings file;
/// the quit key, when enabled, is appended under the reserved `quit`
/// label.
#[derive(Clone, Debug)]
pub struct ResponseMapping {
    keys: Vec<Key>,
    labels: HashMap<Key, String>,
    inverse: HashMap<String, Key>,
    quit_key: Option<Key>,
}

impl ResponseMapping {
    pub fn new(
        keys: Vec<Key>,
        names: Vec<String>,
        quit_key: Option<Key>,
    ) -> Result<Self> {
        if keys.len() != names.len() {
            return Err(Error::Config(format!(
                "{} response keys but {} response names",
                keys.len(),
                names.len()
            )));
        }
        let mut all_keys = keys;
        let mut labels = HashMap::new();
        let mut inverse = HashMap::new();
        for (key, name) in all_keys.iter().zip(&names) {
            labels.insert(key.clone(), name.clone());
            inverse.insert(name.clone(), key.clone());
        }
        if let Some(quit) = &quit_key {
            all_keys.push(quit.clone());
            labels.insert(quit.clone(), QUIT_LABEL.to_string());
            inverse.insert(QUIT_LABEL.to_string(), quit.clone());
        }
        Ok(ResponseMapping { keys: all_keys, labels, inverse, quit_key })
    }

    /// All mapped keys, quit key included - the allowed-key list for
    /// response windows.
    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub fn label(&self, key: &Key) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    pub fn key_for(&self, label: &str) -> Option<&Key> {
        self.inverse.get(label)
    }

    pub fn is_quit(&self, key: &Key) -> bool {
        self.quit_key.as_ref() == Some(key)
    }

    pub fn quit_key(&self) -> Option<&Key> {
        self.quit_key.as_ref()
    }

    /// Response (key, label) pairs, quit excluded.
    pub fn responses(&self) -> impl Iterator<Item = (&Key, &str)> {
        self.keys
            .iter()
            .filter(|k| !self.is_quit(k))
            .filter_map(|k| self.labels.get(k).map(|l| (k, l.as_str())))
    }
}
