//! Headless surface and a ready-made context for tests and dry runs
//! without a window or devices attached.

use std::path::Path;

use behex_core::{Result, Surface};
use behex_io::Settings;
use behex_io::sim::ScriptedKeys;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::experiment::Experiment;

/// Surface that records draw and flip calls instead of rendering.
/// Stimuli are plain strings, so tests can assert what was drawn.
pub struct SimSurface {
    /// Refresh rate reported to the calibrator; `None` simulates an
    /// unmeasurable display.
    pub rate: Option<f64>,
    /// Fail the first measurement attempt, to exercise the retry.
    pub fail_first_measure: bool,
    pub flips: usize,
    pub draws: Vec<String>,
    measure_calls: usize,
}

impl SimSurface {
    pub fn new() -> Self {
        SimSurface {
            rate: Some(100.0),
            fail_first_measure: false,
            flips: 0,
            draws: Vec::new(),
            measure_calls: 0,
        }
    }
}

impl Default for SimSurface {
    fn default() -> Self {
        SimSurface::new()
    }
}

impl Surface for SimSurface {
    type Stim = String;

    fn draw(&mut self, stim: &String) -> Result<()> {
        self.draws.push(stim.clone());
        Ok(())
    }

    fn flip(&mut self) -> Result<()> {
        self.flips += 1;
        Ok(())
    }

    fn measure_refresh_rate(&mut self, _samples: usize) -> Option<f64> {
        self.measure_calls += 1;
        if self.fail_first_measure && self.measure_calls == 1 {
            return None;
        }
        self.rate
    }

    fn make_text(&mut self, text: &str) -> Result<String> {
        Ok(format!("text:{text}"))
    }

    fn load_image(&mut self, path: &Path) -> Result<String> {
        Ok(format!("image:{}", path.display()))
    }
}

/// Settings used by the simulated context: two response keys, a quit
/// key, triggers for the usual events, and a small timing table.
pub const SETTINGS_JSON: &str = r#"{
    "send_triggers": false,
    "resp_keys": ["f", "j"],
    "resp_keys_box": [1, 2],
    "resp_names": ["left", "right"],
    "triggers": {"left": 8, "right": 16, "fixation": 1, "break": 32},
    "quit": {"enable": true, "button": "q"},
    "times": {
        "fixation": 0.3,
        "stim": 0.1,
        "feedback": [0.2, 0.4],
        "probe": "inf"
    },
    "break_every_n_trials": 0,
    "language": "eng"
}"#;

/// Simulated context: [`SimSurface`], scripted keyboard, no response box,
/// no trigger port, a seeded generator and a 10 ms frame time. Data goes
/// to `data/` unless the test points `data_dir` elsewhere.
pub fn experiment(keys: ScriptedKeys) -> Experiment<SimSurface> {
    let settings =
        Settings::from_json(SETTINGS_JSON).expect("embedded settings parse");
    let mut exp = Experiment::new(
        settings,
        SimSurface::new(),
        Box::new(keys),
        None,
        None,
        "data",
    )
    .expect("simulated context wires up")
    .with_rng(StdRng::seed_from_u64(42));
    exp.calibrate(25, Some(0.01)).expect("supplied frame time");
    exp
}
