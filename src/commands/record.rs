//! Capture a new auscultation session.
//!
//! Runs the live capture loop with real-time waveform charting, then hands
//! the finished session to review/playback and the save flow. Supports an
//! external stop trigger via SIGUSR1 signal.

use crate::capture::transport::DisconnectedTransport;
use crate::capture::ui::CaptureFrame;
use crate::capture::{BleSource, CaptureCommand, CaptureTui, MicSource, SampleSource};
use crate::config::{AuscultConfig, SourceKind};
use crate::playback::{Player, ReviewCommand, ReviewFrame, ReviewTui, SystemPlayer};
use crate::pressure;
use crate::records::storage::{RecordStore, Tag};
use crate::session::{SessionConfig, SessionController, SessionState};
use crate::ui::ErrorScreen;
use anyhow::anyhow;
use cliclack::{confirm, input, intro, outro, select};
use console::style;
use std::path::PathBuf;

/// Handles the capture workflow end to end.
///
/// # Arguments
/// * `patient` - Preselected patient id for the save flow
/// * `source_override` - Capture source overriding the configured one
pub async fn handle_record(
    patient: Option<i64>,
    source_override: Option<SourceKind>,
) -> Result<(), anyhow::Error> {
    tracing::info!("=== auscult capture started ===");

    let config = match AuscultConfig::load() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("Failed to load configuration: {err}");
            let error_message = format!(
                "Configuration Error:\n\n{err}\n\nPlease check your ~/.config/auscult/auscult.toml file and try again."
            );
            let mut error_screen = ErrorScreen::new()?;
            error_screen.show_error(&error_message)?;
            error_screen.cleanup()?;
            return Err(anyhow!("Configuration error: {err}"));
        }
    };

    let source_kind = source_override.unwrap_or(config.audio.source);
    let mut source: Box<dyn SampleSource> = match source_kind {
        SourceKind::Mic => Box::new(MicSource::new(config.audio.device.clone())),
        SourceKind::Ble => Box::new(BleSource::new(
            Box::new(DisconnectedTransport {
                name: config.ble.device_name.clone(),
            }),
            config.ble.sample_rate,
            config.ble.device_name.clone(),
        )),
    };

    let mut session = SessionController::new(SessionConfig {
        live_window_secs: config.chart.live_window_secs,
        artifact_dir: data_dir()?.join("recordings"),
    });

    let events = match session.start_capture(source.as_mut()) {
        Ok(events) => events,
        Err(e) => {
            tracing::error!("Failed to start capture: {}", e);
            let error_message = format!(
                "Recording Error:\n\n{e}\n\nPlease check your capture source and try again."
            );
            let mut error_screen = ErrorScreen::new()?;
            error_screen.show_error(&error_message)?;
            error_screen.cleanup()?;
            return Err(e);
        }
    };

    let mut tui = CaptureTui::new(config.chart.live_y_max)
        .map_err(|e| anyhow!("Failed to initialize UI: {e}"))?;

    let term = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGUSR1, term.clone())
        .map_err(|e| anyhow!("Failed to register signal handler: {e}"))?;

    tracing::debug!("Entering capture loop. Press 'Enter' to stop or 'Escape'/'q' to cancel.");
    let source_label = source.describe();
    let mut canceled = false;
    let mut frame_count = 0u64;

    loop {
        // Fold pending source events in arrival order before anything else;
        // the chart must never observe a half-applied chunk.
        for event in events.try_iter() {
            session.apply(event);
        }

        if term.load(std::sync::atomic::Ordering::Relaxed) {
            tracing::info!("Received SIGUSR1: stopping capture via external trigger");
            break;
        }

        match tui.handle_input() {
            Ok(CaptureCommand::Continue) => {
                frame_count += 1;
                if frame_count % 60 == 0 {
                    let duration_secs =
                        session.samples().len() as f32 / session.sample_rate().max(1) as f32;
                    tracing::debug!("Capturing: {:.1}s recorded", duration_secs);
                }

                let window = session.window_snapshot();
                tui.render(&CaptureFrame {
                    window: &window,
                    total_samples: session.samples().len(),
                    sample_rate: session.sample_rate(),
                    source_label: &source_label,
                    fault: session.last_fault(),
                })
                .map_err(|e| anyhow!("Render failed: {e}"))?;
            }
            Ok(CaptureCommand::Stop) => break,
            Ok(CaptureCommand::Cancel) => {
                canceled = true;
                break;
            }
            Ok(CaptureCommand::Settings) => {
                // Swapping sources mid-capture would corrupt the window's
                // temporal meaning, so the controller rejects it.
                if let Err(e) = session.reconfigure(SessionConfig {
                    live_window_secs: config.chart.live_window_secs,
                    artifact_dir: data_dir()?.join("recordings"),
                }) {
                    tui.show_notice(&e.to_string());
                }
            }
            Err(e) => {
                tracing::error!("Input handling error: {}", e);
                return Err(anyhow!("Input handling error: {e}"));
            }
        }
    }

    // Apply whatever was delivered before the stop, then freeze. Anything
    // the transport sends after this point is rejected by the controller.
    for event in events.try_iter() {
        session.apply(event);
    }
    let state = session.stop_capture();
    source.stop();

    tui.cleanup().map_err(|e| anyhow!("Cleanup failed: {e}"))?;
    drop(tui);

    if canceled {
        tracing::info!("Capture canceled; session discarded");
        session.reset();
        return Ok(());
    }

    if state == SessionState::StoppedEmpty {
        println!("No samples captured; nothing to save.");
        return Ok(());
    }

    review_and_save(&mut session, &config, patient).await
}

/// Review loop over the finished session, then the save flow.
async fn review_and_save(
    session: &mut SessionController,
    config: &AuscultConfig,
    preselected_patient: Option<i64>,
) -> Result<(), anyhow::Error> {
    session.begin_review()?;

    let pascal_data = pressure::samples_to_pascal(session.samples());
    let sample_rate = session.sample_rate().max(1);
    let duration_millis = (session.samples().len() as u64 * 1000) / sample_rate as u64;

    let mut player = SystemPlayer::new();
    let mut playback_available = false;
    if let Some(path) = session.artifact_path().cloned() {
        match player.load(&path, duration_millis) {
            Ok(()) => playback_available = true,
            Err(e) => {
                // A broken playback resource does not touch the artifact or
                // the in-memory session.
                tracing::warn!("Playback unavailable: {e}");
            }
        }
    }

    let mut tui = ReviewTui::new(config.chart.min_review_y_max, config.chart.target_points)
        .map_err(|e| anyhow!("Failed to initialize review UI: {e}"))?;

    let mut save_requested = false;
    loop {
        let status = player.status();
        if status.is_playing {
            session.set_playback_position(status.position_millis);
        }

        tui.render(&ReviewFrame {
            data: &pascal_data,
            sample_rate,
            cursor: session.cursor(),
            is_playing: status.is_playing,
            can_save: true,
        })
        .map_err(|e| anyhow!("Render failed: {e}"))?;

        match tui.handle_input() {
            Ok(ReviewCommand::Continue) => {}
            Ok(ReviewCommand::Play) => {
                if playback_available {
                    session.clear_cursor();
                    if let Err(e) = player.play() {
                        tracing::warn!("Playback failed: {e}");
                    }
                }
            }
            Ok(ReviewCommand::Save) => {
                save_requested = true;
                break;
            }
            Ok(ReviewCommand::Exit) => break,
            Err(e) => {
                tracing::error!("Input handling error: {}", e);
                break;
            }
        }
    }

    player.unload();
    tui.cleanup().map_err(|e| anyhow!("Cleanup failed: {e}"))?;
    drop(tui);

    if !save_requested {
        tracing::info!("Session not saved; discarding");
        session.reset();
        return Ok(());
    }

    save_flow(session, preselected_patient)
}

/// Prompts for the clinical metadata and persists the session.
///
/// A failed save keeps the in-memory session so the user can retry without
/// re-capturing.
fn save_flow(
    session: &mut SessionController,
    preselected_patient: Option<i64>,
) -> Result<(), anyhow::Error> {
    ctrlc::set_handler(move || {}).ok();

    let mut store = RecordStore::new(&data_dir()?)?;

    intro(style(" save metering ").on_white().black())?;

    let patient_id = match preselected_patient {
        Some(id) => {
            store
                .get_patient(id)?
                .ok_or_else(|| anyhow!("no patient with id {id}"))?;
            id
        }
        None => {
            let patients = store.get_all_patients()?;
            if patients.is_empty() {
                outro("No patients registered. Run 'auscult patients add' first.")?;
                return Err(anyhow!(
                    "cannot save without a patient; session data was not persisted"
                ));
            }
            let mut patient_prompt = select("Select patient:");
            for patient in &patients {
                patient_prompt = patient_prompt.item(
                    patient.id,
                    format!("{} ({})", patient.name, patient.age),
                    "",
                );
            }
            patient_prompt
                .interact()
                .map_err(|e| anyhow!("Selection cancelled: {e}"))?
        }
    };

    let tag: Tag = select("Clinical tag:")
        .item(Tag::Green, "green", "normal finding")
        .item(Tag::Red, "red", "requires attention")
        .item(Tag::Blue, "blue", "unclassified")
        .initial_value(Tag::Blue)
        .interact()
        .map_err(|e| anyhow!("Selection cancelled: {e}"))?;

    let observations: String = input("Observations:")
        .placeholder("free-text clinical notes")
        .required(false)
        .interact()
        .map_err(|e| anyhow!("Input cancelled: {e}"))?;

    loop {
        match session.save(&mut store, patient_id, tag, &observations) {
            Ok(id) => {
                outro(format!("Metering #{id} saved."))?;
                session.reset();
                return Ok(());
            }
            Err(e) => {
                tracing::error!("Save failed: {e}");
                // The session stays in memory; offer a retry instead of
                // dropping a clinical record on a transient failure.
                let retry = confirm(format!("Save failed: {e}. Retry?"))
                    .initial_value(true)
                    .interact()
                    .unwrap_or(false);
                if !retry {
                    outro("Session not saved. The capture remains on disk as a WAV artifact.")?;
                    return Err(anyhow!("save failed: {e}"));
                }
            }
        }
    }
}

/// Data directory for the database and WAV artifacts.
pub fn data_dir() -> Result<PathBuf, anyhow::Error> {
    Ok(dirs::home_dir()
        .ok_or_else(|| anyhow!("Could not determine home directory"))?
        .join(".local")
        .join("share")
        .join("auscult"))
}
