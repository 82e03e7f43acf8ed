//! Review a saved metering: scrollable chart, playback, metadata editing.

use crate::config::AuscultConfig;
use crate::playback::{Player, ReviewCommand, ReviewFrame, ReviewTui, SystemPlayer};
use crate::pressure;
use crate::records::storage::{Metering, RecordStore, Tag};
use crate::session::artifact;
use anyhow::anyhow;
use cliclack::{input, intro, outro, select};
use console::style;
use std::path::Path;

/// Reviews a saved metering by id.
///
/// The full recording is charted in review mode; if the WAV artifact is
/// still on disk it can be played back with a cursor that auto-follows.
/// The clinical tag and observations can be edited afterwards.
pub async fn handle_review(metering_id: i64) -> Result<(), anyhow::Error> {
    tracing::info!("=== auscult review: metering #{metering_id} ===");

    let config = AuscultConfig::load().unwrap_or_else(|e| {
        tracing::warn!("Failed to load configuration, using defaults: {e}");
        AuscultConfig::default()
    });

    let mut store = RecordStore::new(&super::record::data_dir()?)?;
    let metering = store
        .get_metering(metering_id)?
        .ok_or_else(|| anyhow!("No metering with id {metering_id}. Use 'auscult history' to browse."))?;

    // The database doesn't record the capture rate; the artifact header
    // does. Fall back to the configured sensor rate for artifact-less rows.
    let sample_rate = metering
        .audio_uri
        .as_deref()
        .and_then(|uri| artifact::read_sample_rate(Path::new(uri)).ok())
        .unwrap_or(config.ble.sample_rate);

    let edit_requested = run_review_loop(&config, &metering, sample_rate)?;

    if edit_requested {
        edit_flow(&mut store, &metering)?;
    }

    Ok(())
}

/// Runs the review TUI loop. Returns whether the user asked to edit.
fn run_review_loop(
    config: &AuscultConfig,
    metering: &Metering,
    sample_rate: u32,
) -> Result<bool, anyhow::Error> {
    let pascal_data = pressure::samples_to_pascal(&metering.data);
    let duration_millis = (metering.data.len() as u64 * 1000) / sample_rate.max(1) as u64;

    let mut player = SystemPlayer::new();
    let mut playback_available = false;
    if let Some(uri) = &metering.audio_uri {
        match player.load(Path::new(uri), duration_millis) {
            Ok(()) => playback_available = true,
            Err(e) => tracing::warn!("Playback unavailable: {e}"),
        }
    }

    let mut tui = ReviewTui::new(config.chart.min_review_y_max, config.chart.target_points)
        .map_err(|e| anyhow!("Failed to initialize review UI: {e}"))?;

    let mut cursor: Option<usize> = None;
    let mut edit_requested = false;

    loop {
        let status = player.status();
        if status.is_playing {
            let seconds = status.position_millis as f64 / 1000.0;
            let index = (seconds * sample_rate as f64).round() as usize;
            cursor = Some(index.min(metering.data.len().saturating_sub(1)));
        }

        tui.render(&ReviewFrame {
            data: &pascal_data,
            sample_rate,
            cursor,
            is_playing: status.is_playing,
            can_save: true,
        })
        .map_err(|e| anyhow!("Render failed: {e}"))?;

        match tui.handle_input() {
            Ok(ReviewCommand::Continue) => {}
            Ok(ReviewCommand::Play) => {
                if playback_available {
                    cursor = None;
                    if let Err(e) = player.play() {
                        tracing::warn!("Playback failed: {e}");
                    }
                }
            }
            Ok(ReviewCommand::Save) => {
                edit_requested = true;
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
    Ok(edit_requested)
}

/// Edits the clinical fields of an existing metering.
fn edit_flow(store: &mut RecordStore, metering: &Metering) -> Result<(), anyhow::Error> {
    ctrlc::set_handler(move || {}).ok();

    intro(style(" edit metering ").on_white().black())?;

    let tag: Tag = select("Clinical tag:")
        .item(Tag::Green, "green", "normal finding")
        .item(Tag::Red, "red", "requires attention")
        .item(Tag::Blue, "blue", "unclassified")
        .initial_value(metering.tag)
        .interact()
        .map_err(|e| anyhow!("Selection cancelled: {e}"))?;

    let observations: String = input("Observations:")
        .placeholder("free-text clinical notes")
        .default_input(metering.observations.as_deref().unwrap_or(""))
        .required(false)
        .interact()
        .map_err(|e| anyhow!("Input cancelled: {e}"))?;

    store.update_metering(metering.id, tag, &observations)?;
    outro(format!("Metering #{} updated.", metering.id))?;
    Ok(())
}
