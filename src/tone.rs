//! Tone tracking for audio-trigger consumers
//!
//! The device reports a tone-table index per frame, but weak frames
//! (negative calibrated power) are unreliable and should not switch what is
//! playing. [`ToneTracker`] holds the last trustworthy index and reports a
//! [`ToneChange`] only when a new non-zero tone should start.

use crate::types::Frame;

/// A switch from one tone to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToneChange {
    /// Tone to stop, if one was playing
    pub previous: Option<u32>,
    /// Tone to start
    pub current: u32,
}

#[derive(Debug, Clone, Default)]
pub struct ToneTracker {
    held: u32,
    playing: u32,
}

impl ToneTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next frame.
    ///
    /// Frames without a tone index (the basic layout) are ignored.
    pub fn observe(&mut self, frame: &Frame) -> Option<ToneChange> {
        let index = frame.tone_index?;
        if frame.max_value >= 0.0 {
            self.held = index;
        }

        if self.held == 0 || self.held == self.playing {
            return None;
        }

        let change = ToneChange {
            previous: (self.playing != 0).then_some(self.playing),
            current: self.held,
        };
        self.playing = self.held;
        Some(change)
    }

    /// Index from the most recent frame with non-negative power.
    pub fn held_index(&self) -> u32 {
        self.held
    }

    /// Tone most recently started, if any.
    pub fn playing(&self) -> Option<u32> {
        (self.playing != 0).then_some(self.playing)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(tone_index: u32, max_value_raw: i32) -> Frame {
        Frame::new(0, 128, 8000, 0, max_value_raw, 0.0, Some(tone_index))
    }

    #[test]
    fn first_tone_starts_without_previous() {
        let mut tracker = ToneTracker::new();
        assert_eq!(
            tracker.observe(&frame(3, 100)),
            Some(ToneChange { previous: None, current: 3 })
        );
        assert_eq!(tracker.playing(), Some(3));
    }

    #[test]
    fn repeated_tone_is_not_a_change() {
        let mut tracker = ToneTracker::new();
        tracker.observe(&frame(3, 100));
        assert_eq!(tracker.observe(&frame(3, 200)), None);
    }

    #[test]
    fn weak_frames_hold_the_previous_index() {
        let mut tracker = ToneTracker::new();
        tracker.observe(&frame(3, 100));
        assert_eq!(tracker.observe(&frame(9, -1)), None);
        assert_eq!(tracker.held_index(), 3);

        assert_eq!(
            tracker.observe(&frame(9, 0)),
            Some(ToneChange { previous: Some(3), current: 9 })
        );
    }

    #[test]
    fn silence_keeps_the_last_tone_playing() {
        let mut tracker = ToneTracker::new();
        tracker.observe(&frame(4, 100));
        assert_eq!(tracker.observe(&frame(0, 100)), None);
        assert_eq!(tracker.held_index(), 0);
        assert_eq!(tracker.playing(), Some(4));

        assert_eq!(
            tracker.observe(&frame(4, 100)),
            None,
            "returning to the playing tone is not a change"
        );
    }

    #[test]
    fn basic_frames_are_ignored() {
        let mut tracker = ToneTracker::new();
        let basic = Frame::new(0, 128, 8000, 0, 100, 440.0, None);
        assert_eq!(tracker.observe(&basic), None);
        assert_eq!(tracker.playing(), None);
    }

    #[test]
    fn reset_forgets_everything() {
        let mut tracker = ToneTracker::new();
        tracker.observe(&frame(2, 1));
        tracker.reset();
        assert_eq!(tracker.playing(), None);
        assert_eq!(tracker.held_index(), 0);
    }
}
