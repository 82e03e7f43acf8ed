//! Patient and metering records: SQLite storage and the browsing UI.

pub mod storage;
pub mod ui;

pub use storage::{Metering, NewMetering, Patient, RecordStore, Tag};
pub use ui::MeteringBrowser;
