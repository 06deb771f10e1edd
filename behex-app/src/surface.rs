use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ab_glyph::FontVec;
use behex_core::{Error, Key, KeyEvent, Result, Surface};
use behex_io::KeySource;
use pixels::{Pixels, SurfaceTexture};
use tiny_skia::{Color, Pixmap};
use tracing::{debug, info, warn};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::platform::pump_events::EventLoopExtPumpEvents;
use winit::window::{Fullscreen, Window, WindowId};

const BACKGROUND: Color = Color::BLACK;

/// Settings files name keys the way subjects see them; translate winit
/// key codes to those names.
fn key_name(code: KeyCode) -> String {
    let name = format!("{code:?}");
    if let Some(letter) = name.strip_prefix("Key") {
        letter.to_ascii_lowercase()
    } else if let Some(digit) = name.strip_prefix("Digit") {
        digit.to_string()
    } else if let Some(arrow) = name.strip_prefix("Arrow") {
        arrow.to_ascii_lowercase()
    } else if name == "Enter" {
        "return".to_string()
    } else {
        name.to_ascii_lowercase()
    }
}

/// Owns the window, the GPU surface and the back canvas; fed by the
/// event pump.
struct WindowHost {
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    canvas: Option<Pixmap>,
    events: VecDeque<KeyEvent>,
    close_requested: bool,
}

impl WindowHost {
    fn new() -> Self {
        WindowHost {
            window: None,
            pixels: None,
            canvas: None,
            events: VecDeque::new(),
            close_requested: false,
        }
    }

    fn create_window(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let monitor = event_loop
            .primary_monitor()
            .or_else(|| event_loop.available_monitors().next())
            .ok_or_else(|| Error::display("no monitor available"))?;

        let attributes = Window::default_attributes()
            .with_title("behex")
            .with_fullscreen(Some(Fullscreen::Borderless(Some(monitor))))
            .with_resizable(false);
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .map_err(|e| Error::Display(format!("create window: {e}")))?,
        );
        window.set_cursor_visible(false);

        let size = window.inner_size();
        let texture =
            SurfaceTexture::new(size.width, size.height, window.clone());
        let pixels = Pixels::new(size.width, size.height, texture)
            .map_err(|e| Error::Display(format!("create surface: {e}")))?;
        let mut canvas = Pixmap::new(size.width, size.height)
            .ok_or_else(|| Error::display("zero-sized window"))?;
        canvas.fill(BACKGROUND);

        info!(
            width = size.width,
            height = size.height,
            "window created"
        );
        self.pixels = Some(pixels);
        self.canvas = Some(canvas);
        window.request_redraw();
        self.window = Some(window);
        Ok(())
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        if size.width == 0 || size.height == 0 {
            return;
        }
        if let Some(pixels) = &mut self.pixels {
            if let Err(e) = pixels.resize_surface(size.width, size.height) {
                warn!(%e, "surface resize failed");
            }
            if let Err(e) = pixels.resize_buffer(size.width, size.height) {
                warn!(%e, "buffer resize failed");
            }
        }
        if let Some(canvas) = Pixmap::new(size.width, size.height) {
            self.canvas = Some(canvas);
        }
    }
}

impl ApplicationHandler for WindowHost {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.create_window(event_loop) {
                warn!(%e, "window creation failed");
                self.close_requested = true;
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => self.close_requested = true,
            WindowEvent::KeyboardInput { event, .. } => {
                if event.repeat {
                    return;
                }
                if let PhysicalKey::Code(code) = event.physical_key {
                    self.events.push_back(KeyEvent {
                        key: Key::Code(key_name(code)),
                        pressed: event.state.is_pressed(),
                        time: None,
                    });
                }
            }
            WindowEvent::Resized(size) => self.resize(size),
            _ => {}
        }
    }
}

struct Pump {
    event_loop: EventLoop<()>,
    host: WindowHost,
}

impl Pump {
    fn pump_once(&mut self) {
        let _ = self
            .event_loop
            .pump_app_events(Some(Duration::ZERO), &mut self.host);
    }

    fn present_frame(&mut self) -> Result<()> {
        self.pump_once();
        if self.host.close_requested {
            return Err(Error::Quit);
        }
        let host = &mut self.host;
        let (pixels, canvas) =
            match (host.pixels.as_mut(), host.canvas.as_mut()) {
                (Some(pixels), Some(canvas)) => (pixels, canvas),
                _ => return Err(Error::display("window not ready")),
            };
        pixels.frame_mut().copy_from_slice(canvas.data());
        pixels
            .render()
            .map_err(|e| Error::Display(format!("render: {e}")))?;
        canvas.fill(BACKGROUND);
        if let Some(window) = &host.window {
            window.request_redraw();
        }
        Ok(())
    }
}

/// Keyboard source bridged over the shared event pump, handed to the
/// experiment's input layer.
pub struct WinitKeys {
    pump: Rc<RefCell<Pump>>,
}

impl KeySource for WinitKeys {
    fn poll(&mut self) -> Vec<KeyEvent> {
        let mut pump = self.pump.borrow_mut();
        pump.pump_once();
        pump.host.events.drain(..).collect()
    }
}

/// Display surface over winit + pixels, drawing with tiny-skia.
///
/// `flip` uploads the back canvas, presents it (vsync-paced by the FIFO
/// present mode) and pumps the event loop; a closed window surfaces as
/// the quit signal.
pub struct WindowSurface {
    pump: Rc<RefCell<Pump>>,
    font: FontVec,
}

impl WindowSurface {
    /// Open a borderless fullscreen window on the primary monitor and
    /// load the UI font used for break screens and instructions.
    pub fn new(font_path: &Path) -> Result<Self> {
        let bytes = std::fs::read(font_path).map_err(|e| {
            Error::Config(format!(
                "cannot read font {}: {e}",
                font_path.display()
            ))
        })?;
        let font = FontVec::try_from_vec(bytes)
            .map_err(|e| Error::Config(format!("invalid font: {e}")))?;

        let event_loop = EventLoop::new()
            .map_err(|e| Error::Display(format!("event loop: {e}")))?;
        let mut pump = Pump { event_loop, host: WindowHost::new() };

        // pump until the window exists; resumed() fires on the first few
        // iterations on every backend
        for _ in 0..200 {
            pump.pump_once();
            if pump.host.window.is_some() || pump.host.close_requested {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        if pump.host.window.is_none() {
            return Err(Error::display("window never appeared"));
        }

        Ok(WindowSurface { pump: Rc::new(RefCell::new(pump)), font })
    }

    /// Event source for the experiment's keyboard device, sharing this
    /// surface's pump.
    pub fn key_source(&self) -> WinitKeys {
        WinitKeys { pump: Rc::clone(&self.pump) }
    }
}

impl Surface for WindowSurface {
    type Stim = crate::visual::Visual;

    fn draw(&mut self, stim: &crate::visual::Visual) -> Result<()> {
        let mut pump = self.pump.borrow_mut();
        let canvas = pump
            .host
            .canvas
            .as_mut()
            .ok_or_else(|| Error::display("window not ready"))?;
        stim.rasterize(canvas)
    }

    fn flip(&mut self) -> Result<()> {
        self.pump.borrow_mut().present_frame()
    }

    fn measure_refresh_rate(&mut self, samples: usize) -> Option<f64> {
        // warm up the swapchain before trusting intervals
        for _ in 0..5 {
            self.flip().ok()?;
        }
        let mut intervals = Vec::with_capacity(samples);
        let mut last = Instant::now();
        for _ in 0..samples.max(1) {
            self.flip().ok()?;
            let now = Instant::now();
            intervals.push((now - last).as_secs_f64());
            last = now;
        }
        let mean = intervals.iter().sum::<f64>() / intervals.len() as f64;
        if mean <= 0.0 {
            return None;
        }
        let jitter = intervals
            .iter()
            .map(|interval| (interval - mean).abs())
            .fold(0.0, f64::max);
        debug!(mean, jitter, "refresh intervals measured");
        if jitter > mean * 0.2 {
            // unstable timing, let the calibrator retry
            return None;
        }
        Some(1.0 / mean)
    }

    fn make_text(&mut self, text: &str) -> Result<Self::Stim> {
        let pixmap = crate::visual::render_text(
            &self.font,
            text,
            32.0,
            [255, 255, 255, 255],
        )?;
        Ok(crate::visual::Visual::bitmap(pixmap))
    }

    fn load_image(&mut self, path: &Path) -> Result<Self::Stim> {
        let image = image::open(path)
            .map_err(|e| {
                Error::Config(format!(
                    "cannot load image {}: {e}",
                    path.display()
                ))
            })?
            .into_rgba8();
        let (width, height) = image.dimensions();
        let mut pixmap = Pixmap::new(width, height)
            .ok_or_else(|| Error::display("empty image"))?;
        for (pixel, raw) in
            pixmap.pixels_mut().iter_mut().zip(image.pixels())
        {
            let [r, g, b, a] = raw.0;
            let premul = |channel: u8| {
                (channel as u16 * a as u16 / 255) as u8
            };
            if let Some(color) = tiny_skia::PremultipliedColorU8::from_rgba(
                premul(r),
                premul(g),
                premul(b),
                a,
            ) {
                *pixel = color;
            }
        }
        Ok(crate::visual::Visual::bitmap(pixmap))
    }
}
