pub mod cursor;
pub mod error;
pub mod key;
pub mod mapping;
pub mod surface;
pub mod table;
pub mod triggers;

pub use cursor::Cursor;
pub use error::{Error, Result};
pub use key::{Key, KeyEvent, KeyPress, Response};
pub use mapping::{QUIT_LABEL, ResponseMapping};
pub use surface::Surface;
pub use table::{Cell, Row, RowKey, TRIAL_COL, Table};
pub use triggers::TriggerLog;
