//! Sample-source abstraction over the capture transports.
//!
//! A source delivers raw int16 sample chunks over a channel, in arrival
//! order, until stopped. The microphone source wraps a cpal input stream;
//! the BLE source wraps an external byte transport that notifies
//! little-endian int16 payloads. The session controller consumes either
//! through the same interface, so tests can substitute a fake.

use anyhow::{anyhow, Result};
use std::sync::mpsc::{Receiver, Sender};
use std::thread::JoinHandle;

/// One delivery from an active source.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    /// A decoded chunk of raw samples, in temporal order.
    Chunk(Vec<i16>),
    /// The source faulted mid-capture (device lost, stream error). Chunk
    /// delivery may end here, but the session stays stoppable and whatever
    /// was accumulated remains savable.
    Fault(String),
}

/// A capture source that streams int16 sample chunks.
pub trait SampleSource {
    /// Starts delivery. Fails if the underlying device/transport is not
    /// available; in that case no channel is handed out and the session
    /// must not enter capture.
    fn start(&mut self) -> Result<Receiver<SourceEvent>>;

    /// Synchronously stops delivery. After this returns, the transport no
    /// longer feeds the channel (late in-flight deliveries are the
    /// controller's job to reject).
    fn stop(&mut self);

    /// Sample rate of the delivered stream in Hz. Only meaningful after
    /// `start` succeeded.
    fn sample_rate(&self) -> u32;

    /// Human-readable source description for the footer and the logs.
    fn describe(&self) -> String;
}

/// External byte transport: a connected device that notifies byte payloads.
///
/// This is the collaborator boundary for the BLE path. `connect` hands out
/// a channel of raw notification payloads; `disconnect` must be safe to
/// call more than once.
pub trait ByteTransport: Send {
    fn connect(&mut self) -> Result<Receiver<Vec<u8>>>;
    fn disconnect(&mut self);
}

/// Decodes a notification payload as little-endian signed 16-bit samples.
///
/// An odd byte length means a torn or malformed payload; the whole chunk is
/// rejected rather than guessing at alignment.
pub fn decode_le_i16(bytes: &[u8]) -> Result<Vec<i16>> {
    if bytes.len() % 2 != 0 {
        return Err(anyhow!(
            "malformed chunk: odd byte length {}",
            bytes.len()
        ));
    }

    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

/// Adapts a [`ByteTransport`] into a [`SampleSource`].
///
/// Malformed payloads are logged and dropped at the chunk boundary; one bad
/// notification must not abort a multi-minute session. When the transport
/// channel closes, delivery ends.
pub struct BleSource {
    transport: Box<dyn ByteTransport>,
    sample_rate: u32,
    name: String,
    decoder: Option<JoinHandle<()>>,
}

impl BleSource {
    pub fn new(transport: Box<dyn ByteTransport>, sample_rate: u32, name: String) -> Self {
        Self {
            transport,
            sample_rate,
            name,
            decoder: None,
        }
    }

    fn forward(bytes_rx: Receiver<Vec<u8>>, events_tx: Sender<SourceEvent>) {
        for payload in bytes_rx {
            match decode_le_i16(&payload) {
                Ok(chunk) => {
                    if events_tx.send(SourceEvent::Chunk(chunk)).is_err() {
                        // Receiver gone: capture already stopped.
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!("Dropping malformed chunk: {e}");
                }
            }
        }
        tracing::debug!("BLE decode loop ended");
    }
}

impl SampleSource for BleSource {
    fn start(&mut self) -> Result<Receiver<SourceEvent>> {
        let bytes_rx = self.transport.connect()?;
        let (events_tx, events_rx) = std::sync::mpsc::channel();
        self.decoder = Some(std::thread::spawn(move || {
            Self::forward(bytes_rx, events_tx);
        }));
        tracing::info!("BLE source started: {} at {}Hz", self.name, self.sample_rate);
        Ok(events_rx)
    }

    fn stop(&mut self) {
        self.transport.disconnect();
        if let Some(handle) = self.decoder.take() {
            let _ = handle.join();
        }
        tracing::debug!("BLE source stopped");
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn describe(&self) -> String {
        format!("BLE: {}", self.name)
    }
}

/// Stand-in transport for a BLE sensor that is not connected.
///
/// The real transport is supplied by the platform integration; until one
/// is registered, starting a BLE capture fails the same way a missing
/// device does, and the session never enters capture.
pub struct DisconnectedTransport {
    pub name: String,
}

impl ByteTransport for DisconnectedTransport {
    fn connect(&mut self) -> Result<Receiver<Vec<u8>>> {
        let name = if self.name.is_empty() {
            "(unnamed)".to_string()
        } else {
            self.name.clone()
        };
        Err(anyhow!("BLE device {name} is not connected"))
    }

    fn disconnect(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_decode_little_endian_pairs() {
        // 100 = 0x0064, -100 = 0xFF9C, 32767 = 0x7FFF, 0 = 0x0000
        let bytes = [0x64, 0x00, 0x9C, 0xFF, 0xFF, 0x7F, 0x00, 0x00];
        assert_eq!(decode_le_i16(&bytes).unwrap(), vec![100, -100, 32767, 0]);
    }

    #[test]
    fn test_decode_empty_payload() {
        assert_eq!(decode_le_i16(&[]).unwrap(), Vec::<i16>::new());
    }

    #[test]
    fn test_decode_rejects_odd_length() {
        assert!(decode_le_i16(&[0x01]).is_err());
        assert!(decode_le_i16(&[0x01, 0x02, 0x03]).is_err());
    }

    struct FakeTransport {
        payloads: Vec<Vec<u8>>,
    }

    impl ByteTransport for FakeTransport {
        fn connect(&mut self) -> Result<Receiver<Vec<u8>>> {
            let (tx, rx) = mpsc::channel();
            for payload in self.payloads.drain(..) {
                tx.send(payload).unwrap();
            }
            Ok(rx)
        }

        fn disconnect(&mut self) {}
    }

    #[test]
    fn test_ble_source_decodes_and_drops_bad_chunks() {
        let transport = FakeTransport {
            payloads: vec![
                vec![0x64, 0x00, 0x9C, 0xFF], // [100, -100]
                vec![0x01],                   // malformed, dropped
                vec![0xFF, 0x7F],             // [32767]
            ],
        };
        let mut source = BleSource::new(Box::new(transport), 20000, "fake".into());
        let rx = source.start().unwrap();

        let chunks: Vec<SourceEvent> = rx.iter().collect();
        source.stop();

        assert_eq!(
            chunks,
            vec![
                SourceEvent::Chunk(vec![100, -100]),
                SourceEvent::Chunk(vec![32767]),
            ]
        );
        assert_eq!(source.sample_rate(), 20000);
    }

    struct RefusingTransport;

    impl ByteTransport for RefusingTransport {
        fn connect(&mut self) -> Result<Receiver<Vec<u8>>> {
            Err(anyhow!("no device connected"))
        }

        fn disconnect(&mut self) {}
    }

    #[test]
    fn test_ble_source_start_fails_without_device() {
        let mut source = BleSource::new(Box::new(RefusingTransport), 20000, "none".into());
        assert!(source.start().is_err());
    }
}
