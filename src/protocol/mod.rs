//! Wire protocol of the tone-detection firmware.
//!
//! Each frame is a packed little-endian record bounded by two ASCII
//! sentinels:
//!
//! ```text
//! "head" | id:u32 | N:u16 | fs:u16 | maxIndex:u32 | maxValueRaw:i32 | matchedTone:f32
//!        | [toneIndex:u32] | "tail"
//! ```
//!
//! Two firmware builds exist. The spectrum/visualizer build omits
//! `toneIndex` ([`ProtocolVariant::Basic`]); the player build carries it
//! ([`ProtocolVariant::ToneIndexed`]). The variant is a configuration choice
//! and is never inferred from the stream.
//!
//! There is no checksum. Sentinel matching is the only integrity check, so
//! a payload that happens to contain `"tail"` at the tail offset decodes as a
//! valid frame.

pub mod calibration;
mod format;

pub use calibration::calibrate_max_value;
pub use format::{
    DEFAULT_BAUD_RATE, DEFAULT_SAMPLE_COUNT, DEFAULT_SAMPLING_RATE_HZ, FrameField, HEADER,
    MAX_PAYLOAD_LEN, ProtocolVariant, SENTINEL_LEN, TAIL, decode_frame, decode_payload,
    decode_payload_buffer, encode_frame,
};
