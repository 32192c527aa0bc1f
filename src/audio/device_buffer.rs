//! The frame-buffer collaborator the data-path threads exchange PCM with.

/// Delays reported alongside each recorded period, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DelayReport {
    pub playout_ms: u32,
    pub recording_ms: u32,
}

/// A trait for the consumer/producer of interleaved S16 PCM periods.
///
/// The device calls these methods while holding its monitor lock, once per hardware
/// period, from the record or playout thread. Implementations must not block.
pub trait AudioDeviceBuffer: Send {
    fn set_recording_format(&mut self, sample_rate: u32, channels: u8);

    fn set_playout_format(&mut self, sample_rate: u32, channels: u8);

    /// One captured period: `frames` interleaved frames in `samples`.
    fn deliver_recorded_data(&mut self, samples: &[i16], frames: usize, delays: DelayReport);

    /// Fill up to `frames` interleaved frames into `samples`; returns the frames written.
    /// The device plays silence for the remainder.
    fn request_playout_data(&mut self, samples: &mut [i16], frames: usize) -> usize;

    /// Keyboard activity seen during the last recorded period.
    fn set_typing_status(&mut self, _typing: bool) {}
}

/// Milliseconds covered by `frames` at `sample_rate`, saturating.
pub fn frames_to_ms(frames: i64, sample_rate: u32) -> u32 {
    if frames <= 0 || sample_rate == 0 {
        return 0;
    }
    let ms = frames as u64 * 1000 / u64::from(sample_rate);
    u32::try_from(ms).unwrap_or(u32::MAX)
}
