//! Capture feature: sample sources and the live recording TUI.

pub mod mic;
pub mod transport;
pub mod ui;

pub use mic::MicSource;
pub use transport::{decode_le_i16, BleSource, ByteTransport, SampleSource, SourceEvent};
pub use ui::{CaptureCommand, CaptureTui};
