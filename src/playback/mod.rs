//! Audio playback collaborator for reviewing a finished session.
//!
//! The session layer only depends on the `Player` trait: load a WAV
//! artifact, start playback, poll status ticks, unload. The shipped
//! implementation spawns the platform audio player and derives the
//! position from wall-clock time against the known duration; tests
//! substitute a fake.

pub mod ui;

pub use ui::{ReviewCommand, ReviewFrame, ReviewTui};

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use std::process::Child;
use std::time::Instant;

/// One playback status tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackStatus {
    pub position_millis: u64,
    pub duration_millis: u64,
    pub is_playing: bool,
}

/// Playback of one loaded sound resource.
///
/// `unload` must be idempotent: it is called on explicit stop and again on
/// teardown, and a double unload must not fail or leak.
pub trait Player {
    fn load(&mut self, uri: &Path, duration_millis: u64) -> Result<()>;
    fn play(&mut self) -> Result<()>;
    fn status(&mut self) -> PlaybackStatus;
    fn unload(&mut self);
}

/// Plays WAV artifacts through the system audio player.
pub struct SystemPlayer {
    uri: Option<PathBuf>,
    duration_millis: u64,
    child: Option<Child>,
    started: Option<Instant>,
}

impl SystemPlayer {
    pub fn new() -> Self {
        Self {
            uri: None,
            duration_millis: 0,
            child: None,
            started: None,
        }
    }

    /// Candidate player commands, tried in order.
    #[cfg(target_os = "macos")]
    fn player_commands() -> &'static [&'static str] {
        &["afplay"]
    }

    #[cfg(not(target_os = "macos"))]
    fn player_commands() -> &'static [&'static str] {
        &["aplay", "paplay", "mpv", "ffplay"]
    }
}

impl Default for SystemPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl Player for SystemPlayer {
    fn load(&mut self, uri: &Path, duration_millis: u64) -> Result<()> {
        // Loading a new resource while the previous one is still allocated
        // would leak the old child process.
        self.unload();

        if !uri.exists() {
            return Err(anyhow!("audio file not found: {}", uri.display()));
        }

        self.uri = Some(uri.to_path_buf());
        self.duration_millis = duration_millis;
        tracing::debug!("Playback resource loaded: {}", uri.display());
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        let uri = self
            .uri
            .clone()
            .ok_or_else(|| anyhow!("no playback resource loaded"))?;

        // Restarting playback replays from the beginning.
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }

        let mut spawned = None;
        for player in Self::player_commands() {
            let mut command = std::process::Command::new(player);
            command
                .arg(&uri)
                .stdout(std::process::Stdio::null())
                .stderr(std::process::Stdio::null());
            if *player == "aplay" {
                command.arg("-q");
            }
            if let Ok(child) = command.spawn() {
                tracing::debug!("Playback started via {player}");
                spawned = Some(child);
                break;
            }
        }

        let child = spawned.ok_or_else(|| {
            anyhow!("no audio player found; install afplay, aplay, paplay, mpv or ffplay")
        })?;

        self.child = Some(child);
        self.started = Some(Instant::now());
        Ok(())
    }

    fn status(&mut self) -> PlaybackStatus {
        let finished = match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(Some(_))),
            None => true,
        };

        let position_millis = match self.started {
            Some(started) if !finished => {
                (started.elapsed().as_millis() as u64).min(self.duration_millis)
            }
            Some(_) => self.duration_millis,
            None => 0,
        };

        PlaybackStatus {
            position_millis,
            duration_millis: self.duration_millis,
            is_playing: !finished,
        }
    }

    fn unload(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
            tracing::debug!("Playback resource unloaded");
        }
        self.uri = None;
        self.started = None;
        self.duration_millis = 0;
    }
}

impl Drop for SystemPlayer {
    fn drop(&mut self) {
        self.unload();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_without_resource() {
        let mut player = SystemPlayer::new();
        let status = player.status();
        assert!(!status.is_playing);
        assert_eq!(status.position_millis, 0);
        assert_eq!(status.duration_millis, 0);
    }

    #[test]
    fn test_unload_is_idempotent() {
        let mut player = SystemPlayer::new();
        player.unload();
        player.unload();
        let status = player.status();
        assert!(!status.is_playing);
    }

    #[test]
    fn test_play_without_load_fails() {
        let mut player = SystemPlayer::new();
        assert!(player.play().is_err());
    }

    #[test]
    fn test_load_missing_file_fails() {
        let mut player = SystemPlayer::new();
        let missing = std::env::temp_dir().join("auscult_does_not_exist.wav");
        assert!(player.load(&missing, 1000).is_err());
    }
}
