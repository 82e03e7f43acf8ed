//! Capture/playback session orchestration.
//!
//! The controller owns the live window, the full-resolution accumulator,
//! and the playback cursor. Sources and transports never touch the buffers
//! directly: the capture loop drains the source channel and folds each
//! event into the controller, one at a time and in arrival order, so there
//! is no parallel mutation to guard against. Renderers only ever receive
//! snapshots.

pub mod artifact;
pub mod window;

use crate::capture::transport::{SampleSource, SourceEvent};
use crate::pressure;
use crate::records::storage::{NewMetering, RecordStore, Tag};
use anyhow::{anyhow, Result};
use chrono::Local;
use std::path::PathBuf;
use std::sync::mpsc::Receiver;
use window::{Accumulator, SlidingWindow};

/// Session lifecycle. Non-reentrant: a capture cannot start while one is
/// already running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Capturing,
    StoppedWithData,
    StoppedEmpty,
    Reviewing,
}

/// Per-session configuration. The sample rate is whatever the active
/// source reports; there is no universal rate.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Seconds of audio the live window retains.
    pub live_window_secs: f64,
    /// Directory WAV artifacts are finalized into.
    pub artifact_dir: PathBuf,
}

/// Owns one capture/review session's state and buffers.
pub struct SessionController {
    config: SessionConfig,
    state: SessionState,
    sample_rate: u32,
    window: SlidingWindow,
    accumulator: Accumulator,
    artifact_path: Option<PathBuf>,
    cursor: Option<usize>,
    fault: Option<String>,
}

impl SessionController {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            state: SessionState::Idle,
            sample_rate: 0,
            window: SlidingWindow::with_capacity(1),
            accumulator: Accumulator::new(),
            artifact_path: None,
            cursor: None,
            fault: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Raw samples accumulated so far (full resolution).
    pub fn samples(&self) -> &[i16] {
        self.accumulator.samples()
    }

    /// Copy of the live window, oldest first, for rendering.
    pub fn window_snapshot(&self) -> Vec<f64> {
        self.window.snapshot()
    }

    pub fn artifact_path(&self) -> Option<&PathBuf> {
        self.artifact_path.as_ref()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn last_fault(&self) -> Option<&str> {
        self.fault.as_deref()
    }

    pub fn has_data(&self) -> bool {
        !self.accumulator.is_empty()
    }

    /// Starts a capture session on `source`.
    ///
    /// Fails without a state change when the source cannot start (no device
    /// connected, permission denied); the caller surfaces that to the user
    /// rather than presenting a misleadingly empty chart. On success both
    /// buffers are cleared and chunk delivery begins on the returned
    /// channel.
    pub fn start_capture(
        &mut self,
        source: &mut dyn SampleSource,
    ) -> Result<Receiver<SourceEvent>> {
        if self.state == SessionState::Capturing {
            return Err(anyhow!("capture already running"));
        }

        let receiver = source.start()?;
        self.sample_rate = source.sample_rate();
        self.window = SlidingWindow::for_duration(self.sample_rate, self.config.live_window_secs);
        self.accumulator.clear();
        self.artifact_path = None;
        self.cursor = None;
        self.fault = None;
        self.state = SessionState::Capturing;

        tracing::info!(
            "Capture started: {} at {}Hz, window cap {} samples",
            source.describe(),
            self.sample_rate,
            self.window.capacity()
        );
        Ok(receiver)
    }

    /// Applies one source event in arrival order.
    pub fn apply(&mut self, event: SourceEvent) {
        match event {
            SourceEvent::Chunk(chunk) => self.push_chunk(&chunk),
            SourceEvent::Fault(message) => self.note_fault(message),
        }
    }

    /// Appends one chunk to both buffers.
    ///
    /// Valid only while capturing: transport callbacks can outlive the
    /// logical stop, and a late chunk must not mutate frozen buffers.
    pub fn push_chunk(&mut self, raw: &[i16]) {
        if self.state != SessionState::Capturing {
            tracing::debug!("Discarding late chunk of {} samples", raw.len());
            return;
        }

        self.accumulator.extend_from_slice(raw);
        self.window
            .extend(raw.iter().map(|&s| pressure::sample_to_pascal(s)));
    }

    /// Records a mid-capture source fault.
    ///
    /// The session stays stoppable and everything accumulated before the
    /// fault remains savable; a partial clinical capture beats a discarded
    /// one.
    pub fn note_fault(&mut self, message: String) {
        tracing::error!("Source fault during capture: {message}");
        self.fault = Some(message);
    }

    /// Stops the capture and freezes both buffers.
    ///
    /// With data accumulated, the WAV artifact is finalized and the session
    /// moves to `StoppedWithData`; an artifact write failure is logged but
    /// the in-memory samples stay savable. With nothing accumulated the
    /// session moves to `StoppedEmpty` and save stays disabled.
    pub fn stop_capture(&mut self) -> SessionState {
        if self.state != SessionState::Capturing {
            return self.state;
        }

        if self.accumulator.is_empty() {
            tracing::warn!("Capture stopped with no samples");
            self.state = SessionState::StoppedEmpty;
        } else {
            match artifact::finalize(
                &self.config.artifact_dir,
                self.accumulator.samples(),
                self.sample_rate,
            ) {
                Ok(path) => self.artifact_path = Some(path),
                Err(e) => {
                    tracing::error!("Artifact finalization failed: {e}");
                    self.artifact_path = None;
                }
            }
            self.state = SessionState::StoppedWithData;
        }

        self.state
    }

    /// Enters review/playback of the stopped session.
    pub fn begin_review(&mut self) -> Result<()> {
        if self.state != SessionState::StoppedWithData {
            return Err(anyhow!("no finished session to review"));
        }
        self.state = SessionState::Reviewing;
        Ok(())
    }

    /// Folds one playback status tick into the cursor.
    ///
    /// The cursor always indexes the original full-resolution sequence;
    /// chart-space mapping is the renderer's job. Ticks arriving outside
    /// review (late collaborator callbacks) are ignored.
    pub fn set_playback_position(&mut self, position_millis: u64) {
        if self.state != SessionState::Reviewing {
            return;
        }
        let seconds = position_millis as f64 / 1000.0;
        let index = (seconds * self.sample_rate as f64).round() as usize;
        self.cursor = Some(index.min(self.accumulator.len().saturating_sub(1)));
    }

    pub fn clear_cursor(&mut self) {
        self.cursor = None;
    }

    /// Persists the finished session as a metering record.
    ///
    /// On failure the in-memory session is left untouched so the user can
    /// retry without re-capturing.
    pub fn save(
        &self,
        store: &mut RecordStore,
        patient_id: i64,
        tag: Tag,
        observations: &str,
    ) -> Result<i64> {
        if !matches!(
            self.state,
            SessionState::StoppedWithData | SessionState::Reviewing
        ) {
            return Err(anyhow!("no finished session to save"));
        }

        let metering = NewMetering {
            patient_id,
            date: Local::now().to_rfc3339(),
            data: self.accumulator.samples().to_vec(),
            tag,
            observations: observations.to_string(),
            audio_uri: self
                .artifact_path
                .as_ref()
                .map(|p| p.to_string_lossy().to_string()),
        };

        let id = store.create_metering(&metering)?;
        tracing::info!(
            "Metering saved: id={id}, patient={patient_id}, {} samples",
            metering.data.len()
        );
        Ok(id)
    }

    /// Returns to `Idle`, dropping session data.
    ///
    /// The caller must unload any playback resource before starting the
    /// next capture; the controller only owns the buffers.
    pub fn reset(&mut self) {
        self.accumulator.clear();
        self.window.clear();
        self.artifact_path = None;
        self.cursor = None;
        self.fault = None;
        self.state = SessionState::Idle;
    }

    /// Applies new chart/source settings. Rejected while capturing:
    /// swapping the data source mid-capture would silently corrupt the
    /// window's temporal meaning.
    pub fn reconfigure(&mut self, config: SessionConfig) -> Result<()> {
        if self.state == SessionState::Capturing {
            return Err(anyhow!("stop the capture before changing settings"));
        }
        self.config = config;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    struct FakeSource {
        chunks: Vec<Vec<i16>>,
        available: bool,
        sample_rate: u32,
    }

    impl FakeSource {
        fn with_chunks(chunks: Vec<Vec<i16>>) -> Self {
            Self {
                chunks,
                available: true,
                sample_rate: 20000,
            }
        }

        fn unavailable() -> Self {
            Self {
                chunks: Vec::new(),
                available: false,
                sample_rate: 20000,
            }
        }
    }

    impl SampleSource for FakeSource {
        fn start(&mut self) -> Result<Receiver<SourceEvent>> {
            if !self.available {
                return Err(anyhow!("no device connected"));
            }
            let (tx, rx) = mpsc::channel();
            for chunk in self.chunks.drain(..) {
                tx.send(SourceEvent::Chunk(chunk)).unwrap();
            }
            Ok(rx)
        }

        fn stop(&mut self) {}

        fn sample_rate(&self) -> u32 {
            self.sample_rate
        }

        fn describe(&self) -> String {
            "fake".to_string()
        }
    }

    fn test_config(name: &str) -> SessionConfig {
        SessionConfig {
            live_window_secs: 1.0,
            artifact_dir: std::env::temp_dir().join(format!(
                "auscult_session_test_{}_{}",
                std::process::id(),
                name
            )),
        }
    }

    fn controller(name: &str) -> SessionController {
        SessionController::new(test_config(name))
    }

    #[test]
    fn test_capture_scenario_with_chunks() {
        // Scenario: start, receive [100, -100, 32767] then [0], stop, save.
        let mut session = controller("scenario_a");
        let mut source =
            FakeSource::with_chunks(vec![vec![100, -100, 32767], vec![0]]);

        let rx = session.start_capture(&mut source).unwrap();
        for event in rx.try_iter() {
            session.apply(event);
        }
        assert_eq!(session.samples(), &[100, -100, 32767, 0]);
        assert_eq!(session.window_snapshot().len(), 4);

        assert_eq!(session.stop_capture(), SessionState::StoppedWithData);

        let mut store = RecordStore::open_in_memory().unwrap();
        let patient_id = store
            .create_patient("Test Patient", 40, None, None, None)
            .unwrap();
        let id = session
            .save(&mut store, patient_id, Tag::Green, "post-op check")
            .unwrap();

        let record = store.get_metering(id).unwrap().unwrap();
        assert_eq!(record.patient_id, patient_id);
        assert_eq!(record.tag, Tag::Green);
        assert_eq!(record.data, vec![100, -100, 32767, 0]);

        std::fs::remove_dir_all(test_config("scenario_a").artifact_dir).ok();
    }

    #[test]
    fn test_start_rejected_when_source_unavailable() {
        // Scenario: no connected device. State stays Idle, nothing saved.
        let mut session = controller("scenario_b");
        let mut source = FakeSource::unavailable();

        assert!(session.start_capture(&mut source).is_err());
        assert_eq!(session.state(), SessionState::Idle);
        assert!(!session.has_data());

        let mut store = RecordStore::open_in_memory().unwrap();
        assert!(session.save(&mut store, 1, Tag::Blue, "").is_err());
    }

    #[test]
    fn test_start_rejected_while_capturing() {
        let mut session = controller("reentrant");
        let mut source = FakeSource::with_chunks(vec![]);
        let _rx = session.start_capture(&mut source).unwrap();

        let mut second = FakeSource::with_chunks(vec![]);
        assert!(session.start_capture(&mut second).is_err());
        assert_eq!(session.state(), SessionState::Capturing);
    }

    #[test]
    fn test_late_chunks_rejected_after_stop() {
        let mut session = controller("late_chunk");
        let mut source = FakeSource::with_chunks(vec![vec![1, 2, 3]]);
        let rx = session.start_capture(&mut source).unwrap();
        for event in rx.try_iter() {
            session.apply(event);
        }
        session.stop_capture();

        let before_samples = session.samples().to_vec();
        let before_window = session.window_snapshot();

        session.push_chunk(&[7, 8, 9]);

        assert_eq!(session.samples(), before_samples.as_slice());
        assert_eq!(session.window_snapshot(), before_window);

        std::fs::remove_dir_all(test_config("late_chunk").artifact_dir).ok();
    }

    #[test]
    fn test_window_caps_while_accumulator_grows() {
        // 20001 samples at a 1s/20kHz window: the window holds exactly the
        // last 20000 (first sample evicted), the accumulator all 20001.
        let mut session = controller("window_cap");
        let samples: Vec<i16> = (0..=20000).map(|i| (i % 1000) as i16).collect();
        let mut source = FakeSource::with_chunks(
            samples.chunks(512).map(|c| c.to_vec()).collect(),
        );

        let rx = session.start_capture(&mut source).unwrap();
        for event in rx.try_iter() {
            session.apply(event);
        }

        assert_eq!(session.samples().len(), 20001);
        let window = session.window_snapshot();
        assert_eq!(window.len(), 20000);
        assert_eq!(window[0], pressure::sample_to_pascal(samples[1]));
        assert_eq!(
            window[19999],
            pressure::sample_to_pascal(samples[20000])
        );
    }

    #[test]
    fn test_stop_with_no_data_disables_save() {
        let mut session = controller("empty_stop");
        let mut source = FakeSource::with_chunks(vec![]);
        let _rx = session.start_capture(&mut source).unwrap();
        assert_eq!(session.stop_capture(), SessionState::StoppedEmpty);

        let mut store = RecordStore::open_in_memory().unwrap();
        assert!(session.save(&mut store, 1, Tag::Blue, "").is_err());
    }

    #[test]
    fn test_save_failure_preserves_session_for_retry() {
        let mut session = controller("retry");
        let mut source = FakeSource::with_chunks(vec![vec![5, 6]]);
        let rx = session.start_capture(&mut source).unwrap();
        for event in rx.try_iter() {
            session.apply(event);
        }
        session.stop_capture();

        let mut store = RecordStore::open_in_memory().unwrap();
        // No such patient: the foreign key rejects the insert.
        assert!(session.save(&mut store, 999, Tag::Red, "x").is_err());

        // Session data survives the failure; retry succeeds.
        assert_eq!(session.state(), SessionState::StoppedWithData);
        assert_eq!(session.samples(), &[5, 6]);
        let patient_id = store
            .create_patient("Retry Patient", 55, None, None, None)
            .unwrap();
        assert!(session
            .save(&mut store, patient_id, Tag::Red, "x")
            .is_ok());

        std::fs::remove_dir_all(test_config("retry").artifact_dir).ok();
    }

    #[test]
    fn test_playback_cursor_maps_millis_to_sample_index() {
        let mut session = controller("cursor");
        let samples: Vec<i16> = vec![0; 20000];
        let mut source = FakeSource::with_chunks(vec![samples]);
        let rx = session.start_capture(&mut source).unwrap();
        for event in rx.try_iter() {
            session.apply(event);
        }
        session.stop_capture();
        session.begin_review().unwrap();

        session.set_playback_position(250);
        assert_eq!(session.cursor(), Some(5000));

        // Past the end clamps to the last sample.
        session.set_playback_position(10_000);
        assert_eq!(session.cursor(), Some(19999));

        std::fs::remove_dir_all(test_config("cursor").artifact_dir).ok();
    }

    #[test]
    fn test_playback_tick_ignored_outside_review() {
        let mut session = controller("late_tick");
        session.set_playback_position(1000);
        assert_eq!(session.cursor(), None);
    }

    #[test]
    fn test_reconfigure_rejected_while_capturing() {
        let mut session = controller("reconfigure");
        let mut source = FakeSource::with_chunks(vec![]);
        let _rx = session.start_capture(&mut source).unwrap();
        assert!(session.reconfigure(test_config("reconfigure")).is_err());

        session.stop_capture();
        assert!(session.reconfigure(test_config("reconfigure")).is_ok());
    }

    #[test]
    fn test_fault_keeps_session_stoppable_and_savable() {
        let mut session = controller("fault");
        let mut source = FakeSource::with_chunks(vec![vec![10, 20]]);
        let rx = session.start_capture(&mut source).unwrap();
        for event in rx.try_iter() {
            session.apply(event);
        }
        session.apply(SourceEvent::Fault("device disconnected".into()));

        assert_eq!(session.state(), SessionState::Capturing);
        assert_eq!(session.last_fault(), Some("device disconnected"));
        assert_eq!(session.stop_capture(), SessionState::StoppedWithData);
        assert_eq!(session.samples(), &[10, 20]);

        std::fs::remove_dir_all(test_config("fault").artifact_dir).ok();
    }

    #[test]
    fn test_reset_returns_to_idle_and_clears_buffers() {
        let mut session = controller("reset");
        let mut source = FakeSource::with_chunks(vec![vec![1]]);
        let rx = session.start_capture(&mut source).unwrap();
        for event in rx.try_iter() {
            session.apply(event);
        }
        session.stop_capture();
        session.reset();

        assert_eq!(session.state(), SessionState::Idle);
        assert!(!session.has_data());
        assert!(session.artifact_path().is_none());

        std::fs::remove_dir_all(test_config("reset").artifact_dir).ok();
    }
}
