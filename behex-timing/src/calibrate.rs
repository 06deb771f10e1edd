use behex_core::{Error, Result, Surface};
use tracing::{debug, warn};

/// Measure the display's refresh interval in seconds per frame.
///
/// The surface measures its own rate over `samples` frames; a second
/// attempt is made when the first yields no stable result (cold caches,
/// compositor warm-up). Two failures are a [`Error::Calibration`].
pub fn measure_frame_time<S: Surface>(
    surface: &mut S,
    samples: usize,
) -> Result<f64> {
    for attempt in 0..2 {
        match surface.measure_refresh_rate(samples) {
            Some(rate) if rate > 0.0 => {
                debug!(rate_hz = rate, attempt, "refresh rate measured");
                return Ok(1.0 / rate);
            }
            _ => {
                warn!(attempt, "refresh-rate measurement gave no stable result");
            }
        }
    }
    Err(Error::Calibration)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use behex_core::Error;

    use super::*;

    struct FlakySurface {
        rates: Vec<Option<f64>>,
        calls: usize,
    }

    impl Surface for FlakySurface {
        type Stim = ();

        fn draw(&mut self, _stim: &()) -> Result<()> {
            Ok(())
        }

        fn flip(&mut self) -> Result<()> {
            Ok(())
        }

        fn measure_refresh_rate(&mut self, _samples: usize) -> Option<f64> {
            let rate = self.rates.get(self.calls).copied().flatten();
            self.calls += 1;
            rate
        }

        fn make_text(&mut self, _text: &str) -> Result<()> {
            Ok(())
        }

        fn load_image(&mut self, _path: &Path) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn second_attempt_recovers() {
        let mut surface = FlakySurface { rates: vec![None, Some(100.0)], calls: 0 };
        let frame_time = measure_frame_time(&mut surface, 25).unwrap();
        assert!((frame_time - 0.01).abs() < 1e-12);
        assert_eq!(surface.calls, 2);
    }

    #[test]
    fn two_failures_are_fatal() {
        let mut surface = FlakySurface { rates: vec![None, None], calls: 0 };
        let err = measure_frame_time(&mut surface, 25).unwrap_err();
        assert!(matches!(err, Error::Calibration));
    }
}
