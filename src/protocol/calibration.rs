//! Device calibration for the spectral peak power.
//!
//! The firmware samples a 10-bit ADC centred on 512, shifts it six bits
//! left into Q15 and reports the squared FFT magnitude of the strongest bin.
//! Host side, the raw value is shifted back four bits, normalised by the
//! 1.65 V reference over the 512-count half scale, and squared to read as
//! power.

/// ADC reference half-voltage in volts.
pub const REFERENCE_VOLTS: f64 = 1.65;

/// Right shift applied to the Q15 magnitude (`2^4`).
pub const SHIFT_DIVISOR: f64 = 16.0;

/// ADC counts at half scale.
pub const HALF_SCALE_COUNTS: f64 = 512.0;

/// Convert the raw `maxValue` field into calibrated power.
///
/// Evaluated as `(raw * 1.65^2) / (2^4 * 512)` in that order so results match
/// the reference host pipeline bit for bit.
pub fn calibrate_max_value(raw: i32) -> f64 {
    (f64::from(raw) * (REFERENCE_VOLTS * REFERENCE_VOLTS)) / (SHIFT_DIVISOR * HALF_SCALE_COUNTS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_maps_to_zero() {
        assert_eq!(calibrate_max_value(0), 0.0);
    }

    #[test]
    fn negative_raw_stays_negative() {
        let value = calibrate_max_value(-512);
        assert_eq!(value, (-512.0 * (1.65 * 1.65)) / (16.0 * 512.0));
        assert!(value < 0.0);
    }

    #[test]
    fn full_scale_is_finite() {
        assert!(calibrate_max_value(i32::MAX).is_finite());
        assert!(calibrate_max_value(i32::MIN).is_finite());
    }

    #[test]
    fn scale_is_linear_in_raw() {
        let one = calibrate_max_value(1);
        assert!((calibrate_max_value(8192) - 8192.0 * one).abs() < 1e-9);
    }
}
