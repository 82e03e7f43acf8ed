//! Conversion of raw int16 acoustic samples to sound pressure in Pascal.
//!
//! The stethoscope microphone is calibrated at a fixed sensitivity, so the
//! mapping from digital full scale to physical pressure is a constant chain:
//! sample -> dBFS -> dB SPL -> Pa, with the sample's sign reapplied at the end.

/// Microphone sensitivity in dBFS for a 94 dB SPL reference signal.
const MIC_SENSITIVITY_DBFS: f64 = -26.0;
/// Reference sound pressure level in dB SPL.
const REF_DB_SPL: f64 = 94.0;
/// Maximum magnitude of a signed 16-bit sample.
const FULL_SCALE_16_BIT: f64 = 32767.0;
/// Reference air pressure in Pascal (20 µPa).
const REF_PRESSURE_PA: f64 = 20.0e-6;

/// Converts a raw signed 16-bit sample to sound pressure in Pascal.
///
/// A zero sample maps to exactly `0.0` (there is no log of zero to take),
/// and the result carries the sign of the input sample. Total over the full
/// int16 domain.
pub fn sample_to_pascal(sample: i16) -> f64 {
    if sample == 0 {
        return 0.0;
    }

    let magnitude = (sample as f64).abs();

    let dbfs = 20.0 * (magnitude / FULL_SCALE_16_BIT).log10();
    let dbspl = REF_DB_SPL + (dbfs - MIC_SENSITIVITY_DBFS);
    let pascal = REF_PRESSURE_PA * 10f64.powf(dbspl / 20.0);

    if sample < 0 {
        -pascal
    } else {
        pascal
    }
}

/// Converts a slice of raw samples to Pascal, preserving order.
pub fn samples_to_pascal(samples: &[i16]) -> Vec<f64> {
    samples.iter().map(|&s| sample_to_pascal(s)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_sample_maps_to_exact_zero() {
        assert_eq!(sample_to_pascal(0), 0.0);
    }

    #[test]
    fn test_sign_is_preserved() {
        assert!(sample_to_pascal(1) > 0.0);
        assert!(sample_to_pascal(-1) < 0.0);
        assert!(sample_to_pascal(32767) > 0.0);
        assert!(sample_to_pascal(-32768) < 0.0);
    }

    #[test]
    fn test_full_scale_value() {
        // At full scale, dBFS is 0, so SPL is 94 + 26 = 120 dB,
        // which is 20e-6 * 10^6 = 20 Pa.
        let pa = sample_to_pascal(32767);
        assert!((pa - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_monotonic_over_positive_magnitudes() {
        let mut previous = sample_to_pascal(1);
        for sample in [2i16, 10, 100, 1000, 10000, 32767] {
            let current = sample_to_pascal(sample);
            assert!(
                current > previous,
                "expected pressure to grow with magnitude at sample {sample}"
            );
            previous = current;
        }
    }

    #[test]
    fn test_negative_mirror_of_positive() {
        for sample in [1i16, 128, 20000, 32767] {
            let pos = sample_to_pascal(sample);
            let neg = sample_to_pascal(-sample);
            assert!((pos + neg).abs() < 1e-12);
        }
    }

    #[test]
    fn test_sequence_conversion_matches_per_sample() {
        let raw = [100i16, -100, 0, 32767];
        let converted = samples_to_pascal(&raw);
        for (sample, pascal) in raw.iter().zip(converted.iter()) {
            assert_eq!(sample_to_pascal(*sample), *pascal);
        }
    }
}
