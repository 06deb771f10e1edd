use std::path::Path;

use crate::error::Result;

/// Display collaborator contract.
///
/// The scaffolding never draws primitives itself: a concrete surface owns
/// the window and back buffer, rasterizes stimuli, and swaps buffers at
/// the display refresh. `flip` returns once the swap is underway, which is
/// the boundary trigger emission and clock resets are synchronized to.
///
/// `make_text` and `load_image` build stimuli for break screens and
/// instruction pages; surfaces without those needs can return a
/// configuration error.
pub trait Surface {
    type Stim;

    fn draw(&mut self, stim: &Self::Stim) -> Result<()>;

    fn flip(&mut self) -> Result<()>;

    /// Measure the refresh rate in Hz over `samples` frames, or `None`
    /// when no stable rate could be determined.
    fn measure_refresh_rate(&mut self, samples: usize) -> Option<f64>;

    fn make_text(&mut self, text: &str) -> Result<Self::Stim>;

    fn load_image(&mut self, path: &Path) -> Result<Self::Stim>;
}
