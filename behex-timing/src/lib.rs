pub mod calibrate;
pub mod clock;
pub mod frames;
pub mod sleep;

pub use calibrate::measure_frame_time;
pub use clock::Clock;
pub use frames::{
    FrameSpec, FrameTable, Frames, TimeSpec, TimeTable, seconds_to_frames,
};
pub use sleep::precise_sleep;
