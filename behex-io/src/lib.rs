pub mod device;
pub mod save;
pub mod settings;
pub mod sim;
pub mod trigger;

pub use device::{
    BoxLink, Keyboard, KeySource, ResponseBox, ResponseDevice, ResponseInput,
};
pub use save::{save_beh_data, save_trigger_log};
pub use settings::{QuitOptions, Settings};
pub use trigger::{Trigger, TriggerChannel, TriggerPort};
