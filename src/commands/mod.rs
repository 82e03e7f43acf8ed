//! Application command handlers for auscult.
//!
//! This module organizes command handling into separate submodules, each responsible for a specific
//! application command (capture, review, patient management).
//!
//! # Commands
//! - `record`: Capture a session with live waveform charting and save it
//! - `review`: Review a saved metering with playback and cursor follow
//! - `patients`: Register and list patients
//! - `history`: Browse a patient's saved meterings
//! - `config`: Open configuration file in user's preferred editor
//! - `list_devices`: List available audio input devices
//! - `logs`: Display recent log entries

pub mod config;
pub mod history;
pub mod list_devices;
pub mod logs;
pub mod patients;
pub mod record;
pub mod review;

pub use config::handle_config;
pub use history::handle_history;
pub use list_devices::handle_list_devices;
pub use logs::handle_logs;
pub use patients::{handle_patients_add, handle_patients_list};
pub use record::handle_record;
pub use review::handle_review;
