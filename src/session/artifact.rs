//! WAV artifact finalization for a captured session.
//!
//! The persisted artifact is a canonical PCM WAV: 44-byte RIFF/WAVE/fmt/data
//! header followed by raw little-endian int16 mono samples at the session's
//! sample rate. External players are picky about this header, so it must be
//! byte-exact.

use anyhow::{anyhow, Result};
use chrono::Local;
use hound::WavWriter;
use std::fs;
use std::path::{Path, PathBuf};

/// Writes `samples` as a PCM mono 16-bit WAV at `sample_rate` Hz.
pub fn write_wav(path: &Path, samples: &[i16], sample_rate: u32) -> Result<()> {
    let wav_spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, wav_spec)?;

    for &sample in samples {
        writer.write_sample(sample)?;
    }

    writer.finalize()?;
    tracing::debug!("WAV artifact written: {}", path.display());
    Ok(())
}

/// Finalizes the artifact for a finished session into `artifact_dir`.
///
/// Returns the path of the written file. The filename is timestamped so
/// successive sessions never collide.
pub fn finalize(artifact_dir: &Path, samples: &[i16], sample_rate: u32) -> Result<PathBuf> {
    if samples.is_empty() {
        return Err(anyhow!("no samples captured, nothing to finalize"));
    }

    fs::create_dir_all(artifact_dir)?;

    let stamp = Local::now().format("%Y%m%d-%H%M%S%.3f");
    let path = artifact_dir.join(format!("auscult-{stamp}.wav"));
    write_wav(&path, samples, sample_rate)?;

    let duration_secs = samples.len() as f64 / sample_rate as f64;
    tracing::info!(
        "Session finalized: {:.2}s ({} samples at {}Hz) -> {}",
        duration_secs,
        samples.len(),
        sample_rate,
        path.display()
    );

    Ok(path)
}

/// Reads the sample rate recorded in a WAV artifact's header.
///
/// Used when reviewing a persisted metering: the database does not store
/// the rate, but the artifact header does.
pub fn read_sample_rate(path: &Path) -> Result<u32> {
    let reader = hound::WavReader::open(path)?;
    Ok(reader.spec().sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_wav(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("auscult_test_{}_{}.wav", std::process::id(), name))
    }

    #[test]
    fn test_wav_header_is_canonical() {
        let path = temp_wav("header");
        let samples = [100i16, -100, 32767, 0];
        write_wav(&path, &samples, 20000).unwrap();

        let bytes = fs::read(&path).unwrap();
        fs::remove_file(&path).ok();

        let data_size = samples.len() * 2;
        assert_eq!(bytes.len(), 44 + data_size);

        assert_eq!(&bytes[0..4], b"RIFF");
        let riff_size = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
        assert_eq!(riff_size as usize, 36 + data_size);
        assert_eq!(&bytes[8..12], b"WAVE");

        assert_eq!(&bytes[12..16], b"fmt ");
        let fmt_size = u32::from_le_bytes(bytes[16..20].try_into().unwrap());
        assert_eq!(fmt_size, 16);
        let audio_format = u16::from_le_bytes(bytes[20..22].try_into().unwrap());
        assert_eq!(audio_format, 1); // PCM
        let channels = u16::from_le_bytes(bytes[22..24].try_into().unwrap());
        assert_eq!(channels, 1);
        let sample_rate = u32::from_le_bytes(bytes[24..28].try_into().unwrap());
        assert_eq!(sample_rate, 20000);
        let byte_rate = u32::from_le_bytes(bytes[28..32].try_into().unwrap());
        assert_eq!(byte_rate, 20000 * 2);
        let block_align = u16::from_le_bytes(bytes[32..34].try_into().unwrap());
        assert_eq!(block_align, 2);
        let bits_per_sample = u16::from_le_bytes(bytes[34..36].try_into().unwrap());
        assert_eq!(bits_per_sample, 16);

        assert_eq!(&bytes[36..40], b"data");
        let chunk_size = u32::from_le_bytes(bytes[40..44].try_into().unwrap());
        assert_eq!(chunk_size as usize, data_size);
    }

    #[test]
    fn test_sample_payload_is_little_endian() {
        let path = temp_wav("payload");
        let samples = [100i16, -100, 32767, 0];
        write_wav(&path, &samples, 16000).unwrap();

        let bytes = fs::read(&path).unwrap();
        fs::remove_file(&path).ok();

        let payload = &bytes[44..];
        assert_eq!(payload, [0x64, 0x00, 0x9C, 0xFF, 0xFF, 0x7F, 0x00, 0x00]);
    }

    #[test]
    fn test_read_sample_rate_from_header() {
        let path = temp_wav("rate");
        write_wav(&path, &[1, 2, 3], 20000).unwrap();
        assert_eq!(read_sample_rate(&path).unwrap(), 20000);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_finalize_rejects_empty_session() {
        let dir = std::env::temp_dir();
        assert!(finalize(&dir, &[], 20000).is_err());
    }

    #[test]
    fn test_finalize_writes_into_artifact_dir() {
        let dir = std::env::temp_dir().join(format!("auscult_artifacts_{}", std::process::id()));
        let path = finalize(&dir, &[1, 2, 3], 8000).unwrap();
        assert!(path.starts_with(&dir));
        assert!(path.exists());
        fs::remove_dir_all(&dir).ok();
    }
}
