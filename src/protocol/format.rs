//! Frame layout, field decoding and encoding
//!
//! Offsets below are relative to the first payload byte, i.e. the byte
//! right after the `"head"` sentinel.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::calibration::calibrate_max_value;
use crate::types::Frame;

/// Header sentinel.
pub const HEADER: [u8; 4] = *b"head";

/// Tail sentinel.
pub const TAIL: [u8; 4] = *b"tail";

/// Width of either sentinel.
pub const SENTINEL_LEN: usize = 4;

/// Samples per FFT block in the stock firmware.
pub const DEFAULT_SAMPLE_COUNT: u16 = 128;

/// ADC sampling rate of the stock firmware.
pub const DEFAULT_SAMPLING_RATE_HZ: u16 = 8_000;

/// UART rate the firmware configures.
pub const DEFAULT_BAUD_RATE: u32 = 460_800;

/// Largest payload across all variants.
pub const MAX_PAYLOAD_LEN: usize = TONE_INDEX_OFFSET + 4;

const ID_OFFSET: usize = 0;
const SAMPLE_COUNT_OFFSET: usize = 4;
const SAMPLING_RATE_OFFSET: usize = 6;
const MAX_INDEX_OFFSET: usize = 8;
const MAX_VALUE_OFFSET: usize = 12;
const MATCHED_TONE_OFFSET: usize = 16;
const TONE_INDEX_OFFSET: usize = 20;

const BASIC_FIELDS: &[FrameField] = &[
    FrameField::Id,
    FrameField::SampleCount,
    FrameField::SamplingRate,
    FrameField::MaxIndex,
    FrameField::MaxValue,
    FrameField::MatchedTone,
];

const TONE_INDEXED_FIELDS: &[FrameField] = &[
    FrameField::Id,
    FrameField::SampleCount,
    FrameField::SamplingRate,
    FrameField::MaxIndex,
    FrameField::MaxValue,
    FrameField::MatchedTone,
    FrameField::ToneIndex,
];

/// Field layout selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolVariant {
    /// No `toneIndex` field (spectrum/visualizer firmware).
    Basic,
    /// Trailing `toneIndex` field (player firmware).
    #[default]
    ToneIndexed,
}

impl ProtocolVariant {
    /// Payload fields in wire order.
    pub const fn fields(self) -> &'static [FrameField] {
        match self {
            ProtocolVariant::Basic => BASIC_FIELDS,
            ProtocolVariant::ToneIndexed => TONE_INDEXED_FIELDS,
        }
    }

    /// Bytes between the two sentinels.
    pub const fn payload_len(self) -> usize {
        match self {
            ProtocolVariant::Basic => TONE_INDEX_OFFSET,
            ProtocolVariant::ToneIndexed => TONE_INDEX_OFFSET + 4,
        }
    }

    /// Total bytes on the wire, sentinels included.
    pub const fn frame_len(self) -> usize {
        SENTINEL_LEN + self.payload_len() + SENTINEL_LEN
    }

    /// Field that owns byte `offset` of a frame, counted from the first
    /// header byte. Offsets past the payload belong to the tail.
    pub fn field_at(self, offset: usize) -> FrameField {
        let Some(mut payload_offset) = offset.checked_sub(SENTINEL_LEN) else {
            return FrameField::Header;
        };
        for field in self.fields() {
            if payload_offset < field.width() {
                return *field;
            }
            payload_offset -= field.width();
        }
        FrameField::Tail
    }
}

impl fmt::Display for ProtocolVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolVariant::Basic => f.write_str("basic"),
            ProtocolVariant::ToneIndexed => f.write_str("tone_indexed"),
        }
    }
}

/// Named regions of a frame, used for truncation diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameField {
    Header,
    Id,
    SampleCount,
    SamplingRate,
    MaxIndex,
    MaxValue,
    MatchedTone,
    ToneIndex,
    Tail,
}

impl FrameField {
    /// Width on the wire in bytes.
    pub const fn width(self) -> usize {
        match self {
            FrameField::SampleCount | FrameField::SamplingRate => 2,
            _ => 4,
        }
    }

    /// Name as the firmware header struct spells it.
    pub const fn wire_name(self) -> &'static str {
        match self {
            FrameField::Header => "head",
            FrameField::Id => "id",
            FrameField::SampleCount => "N",
            FrameField::SamplingRate => "fs",
            FrameField::MaxIndex => "maxIndex",
            FrameField::MaxValue => "maxValue",
            FrameField::MatchedTone => "matchedTone",
            FrameField::ToneIndex => "toneIndex",
            FrameField::Tail => "tail",
        }
    }
}

impl fmt::Display for FrameField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

fn field<const N: usize>(payload: &[u8; MAX_PAYLOAD_LEN], offset: usize) -> [u8; N] {
    std::array::from_fn(|i| payload[offset + i])
}

/// Decode a payload held in a full-size buffer.
///
/// Only the first `variant.payload_len()` bytes are read; for
/// [`ProtocolVariant::Basic`] the trailing `toneIndex` slot is ignored.
pub fn decode_payload_buffer(variant: ProtocolVariant, payload: &[u8; MAX_PAYLOAD_LEN]) -> Frame {
    let max_value_raw = i32::from_le_bytes(field(payload, MAX_VALUE_OFFSET));
    let tone_index = match variant {
        ProtocolVariant::Basic => None,
        ProtocolVariant::ToneIndexed => {
            Some(u32::from_le_bytes(field(payload, TONE_INDEX_OFFSET)))
        }
    };

    Frame {
        id: u32::from_le_bytes(field(payload, ID_OFFSET)),
        sample_count: u16::from_le_bytes(field(payload, SAMPLE_COUNT_OFFSET)),
        sampling_rate_hz: u16::from_le_bytes(field(payload, SAMPLING_RATE_OFFSET)),
        max_index: u32::from_le_bytes(field(payload, MAX_INDEX_OFFSET)),
        max_value_raw,
        max_value: calibrate_max_value(max_value_raw),
        matched_tone: f32::from_le_bytes(field(payload, MATCHED_TONE_OFFSET)),
        tone_index,
    }
}

/// Decode the bytes between the sentinels.
///
/// Returns `None` unless `payload` is exactly `variant.payload_len()` long.
/// `sample_count` and `sampling_rate_hz` are passed through unchecked.
pub fn decode_payload(variant: ProtocolVariant, payload: &[u8]) -> Option<Frame> {
    if payload.len() != variant.payload_len() {
        return None;
    }
    let mut buffer = [0u8; MAX_PAYLOAD_LEN];
    buffer[..payload.len()].copy_from_slice(payload);
    Some(decode_payload_buffer(variant, &buffer))
}

/// Decode one complete, already aligned frame (sentinels included).
pub fn decode_frame(variant: ProtocolVariant, bytes: &[u8]) -> Option<Frame> {
    if bytes.len() != variant.frame_len() {
        return None;
    }
    let (head, rest) = bytes.split_at(SENTINEL_LEN);
    let (payload, tail) = rest.split_at(variant.payload_len());
    if head != HEADER || tail != TAIL {
        return None;
    }
    decode_payload(variant, payload)
}

/// Serialize `frame` in `variant` layout, appending to `out`.
///
/// The raw `maxValue` is written; the calibrated value is derived data.
/// A missing `tone_index` is written as 0, the "no tone" sentinel.
pub fn encode_frame(frame: &Frame, variant: ProtocolVariant, out: &mut Vec<u8>) {
    out.reserve(variant.frame_len());
    out.extend_from_slice(&HEADER);
    out.extend_from_slice(&frame.id.to_le_bytes());
    out.extend_from_slice(&frame.sample_count.to_le_bytes());
    out.extend_from_slice(&frame.sampling_rate_hz.to_le_bytes());
    out.extend_from_slice(&frame.max_index.to_le_bytes());
    out.extend_from_slice(&frame.max_value_raw.to_le_bytes());
    out.extend_from_slice(&frame.matched_tone.to_le_bytes());
    if variant == ProtocolVariant::ToneIndexed {
        out.extend_from_slice(&frame.tone_index.unwrap_or(0).to_le_bytes());
    }
    out.extend_from_slice(&TAIL);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_decode_ignores_bytes_past_the_basic_payload() {
        let frame = Frame::new(8, 128, 8000, 2, -7, 523.25, None);
        let bytes = frame.to_bytes(ProtocolVariant::Basic);

        let mut buffer = [0xAAu8; MAX_PAYLOAD_LEN];
        buffer[..20].copy_from_slice(&bytes[SENTINEL_LEN..SENTINEL_LEN + 20]);
        assert_eq!(decode_payload_buffer(ProtocolVariant::Basic, &buffer), frame);

        let indexed = decode_payload_buffer(ProtocolVariant::ToneIndexed, &buffer);
        assert_eq!(indexed.tone_index, Some(0xAAAA_AAAA));
    }

    #[test]
    fn lengths_match_the_firmware_struct() {
        assert_eq!(ProtocolVariant::Basic.payload_len(), 20);
        assert_eq!(ProtocolVariant::Basic.frame_len(), 28);
        assert_eq!(ProtocolVariant::ToneIndexed.payload_len(), 24);
        assert_eq!(ProtocolVariant::ToneIndexed.frame_len(), 32);
        assert_eq!(MAX_PAYLOAD_LEN, 24);

        for variant in [ProtocolVariant::Basic, ProtocolVariant::ToneIndexed] {
            let widths: usize = variant.fields().iter().map(|f| f.width()).sum();
            assert_eq!(widths, variant.payload_len());
        }
    }

    #[test]
    fn field_at_walks_the_layout() {
        let v = ProtocolVariant::ToneIndexed;
        assert_eq!(v.field_at(0), FrameField::Header);
        assert_eq!(v.field_at(3), FrameField::Header);
        assert_eq!(v.field_at(4), FrameField::Id);
        assert_eq!(v.field_at(8), FrameField::SampleCount);
        assert_eq!(v.field_at(10), FrameField::SamplingRate);
        assert_eq!(v.field_at(12), FrameField::MaxIndex);
        assert_eq!(v.field_at(16), FrameField::MaxValue);
        assert_eq!(v.field_at(20), FrameField::MatchedTone);
        assert_eq!(v.field_at(24), FrameField::ToneIndex);
        assert_eq!(v.field_at(28), FrameField::Tail);

        assert_eq!(ProtocolVariant::Basic.field_at(24), FrameField::Tail);
    }

    #[test]
    fn decodes_reference_frame() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"head");
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&128u16.to_le_bytes());
        bytes.extend_from_slice(&8000u16.to_le_bytes());
        bytes.extend_from_slice(&5u32.to_le_bytes());
        bytes.extend_from_slice(&(-512i32).to_le_bytes());
        bytes.extend_from_slice(&440.0f32.to_le_bytes());
        bytes.extend_from_slice(&3u32.to_le_bytes());
        bytes.extend_from_slice(b"tail");

        let frame = decode_frame(ProtocolVariant::ToneIndexed, &bytes).expect("valid frame");
        assert_eq!(frame.id, 1);
        assert_eq!(frame.sample_count, 128);
        assert_eq!(frame.sampling_rate_hz, 8000);
        assert_eq!(frame.max_index, 5);
        assert_eq!(frame.max_value_raw, -512);
        assert_eq!(frame.max_value, (-512.0 * (1.65 * 1.65)) / (16.0 * 512.0));
        assert_eq!(frame.matched_tone, 440.0);
        assert_eq!(frame.tone_index, Some(3));
    }

    #[test]
    fn rejects_wrong_length_or_sentinels() {
        let frame = Frame::new(7, 128, 8000, 2, 100, 261.63, None);
        let mut bytes = Vec::new();
        encode_frame(&frame, ProtocolVariant::Basic, &mut bytes);

        assert!(decode_frame(ProtocolVariant::Basic, &bytes).is_some());
        assert!(decode_frame(ProtocolVariant::ToneIndexed, &bytes).is_none());
        assert!(decode_payload(ProtocolVariant::Basic, &bytes[4..bytes.len() - 5]).is_none());

        let last = bytes.len() - 1;
        bytes[last] = b'x';
        assert!(decode_frame(ProtocolVariant::Basic, &bytes).is_none());
    }

    #[test]
    fn missing_tone_index_encodes_as_zero() {
        let frame = Frame::new(1, 128, 8000, 0, 0, 0.0, None);
        let mut bytes = Vec::new();
        encode_frame(&frame, ProtocolVariant::ToneIndexed, &mut bytes);

        assert_eq!(&bytes[24..28], &[0, 0, 0, 0]);
        let decoded = decode_frame(ProtocolVariant::ToneIndexed, &bytes).expect("valid frame");
        assert_eq!(decoded.tone_index, Some(0));
        assert!(!decoded.has_tone());
    }

    #[test]
    fn field_names_follow_the_firmware() {
        assert_eq!(FrameField::SampleCount.to_string(), "N");
        assert_eq!(FrameField::SamplingRate.to_string(), "fs");
        assert_eq!(ProtocolVariant::Basic.to_string(), "basic");
    }
}
