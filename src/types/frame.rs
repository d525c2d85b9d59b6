//! Decoded telemetry frame

use serde::{Deserialize, Serialize};

use crate::protocol::{ProtocolVariant, calibrate_max_value, encode_frame};

/// One structurally valid frame from the device.
///
/// Frames are self-contained values: nothing refers back to earlier frames,
/// and nothing in the core checks that `id` increases.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Device-side frame counter
    pub id: u32,

    /// Samples per FFT block (`N`)
    pub sample_count: u16,

    /// Device sampling rate (`fs`)
    pub sampling_rate_hz: u16,

    /// Spectrum bin with the highest energy
    pub max_index: u32,

    /// Raw `maxValue` as sent by the device
    pub max_value_raw: i32,

    /// Calibrated power of the strongest bin
    pub max_value: f64,

    /// Closest tone in Hz, 0 when nothing matched
    pub matched_tone: f32,

    /// Index into the external tone table. `Some` only for
    /// [`ProtocolVariant::ToneIndexed`] frames.
    pub tone_index: Option<u32>,
}

impl Frame {
    /// Build a frame from raw field values, deriving the calibrated power.
    pub fn new(
        id: u32,
        sample_count: u16,
        sampling_rate_hz: u16,
        max_index: u32,
        max_value_raw: i32,
        matched_tone: f32,
        tone_index: Option<u32>,
    ) -> Self {
        Self {
            id,
            sample_count,
            sampling_rate_hz,
            max_index,
            max_value_raw,
            max_value: calibrate_max_value(max_value_raw),
            matched_tone,
            tone_index,
        }
    }

    /// Whether the frame names a tone. Index 0 is the "no tone" sentinel.
    pub fn has_tone(&self) -> bool {
        matches!(self.tone_index, Some(index) if index != 0)
    }

    /// Frame rate implied by the device settings in this frame (`fs / N`).
    pub fn nominal_rate_hz(&self) -> Option<f64> {
        if self.sample_count == 0 {
            return None;
        }
        Some(f64::from(self.sampling_rate_hz) / f64::from(self.sample_count))
    }

    /// Wire bytes for this frame in the given layout.
    pub fn to_bytes(&self, variant: ProtocolVariant) -> Vec<u8> {
        let mut out = Vec::with_capacity(variant.frame_len());
        encode_frame(self, variant, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_derives_calibrated_power() {
        let frame = Frame::new(1, 128, 8000, 5, 4096, 440.0, Some(33));
        assert_eq!(frame.max_value, calibrate_max_value(4096));
        assert!(frame.has_tone());
    }

    #[test]
    fn nominal_rate_handles_zero_block() {
        let frame = Frame::new(1, 128, 8000, 0, 0, 0.0, None);
        assert_eq!(frame.nominal_rate_hz(), Some(62.5));

        let broken = Frame::new(1, 0, 8000, 0, 0, 0.0, None);
        assert_eq!(broken.nominal_rate_hz(), None);
    }

    #[test]
    fn to_bytes_has_variant_length() {
        let frame = Frame::new(9, 128, 8000, 1, -1, 1.5, Some(2));
        assert_eq!(frame.to_bytes(ProtocolVariant::Basic).len(), 28);
        assert_eq!(frame.to_bytes(ProtocolVariant::ToneIndexed).len(), 32);
    }
}
