//! [`AudioDeviceBuffer`] backed by tokio channels, for async consumers.
//!
//! The device calls into the buffer under its monitor, so nothing here may block:
//! recorded periods go out with `try_send` (dropped when the consumer lags) and
//! playout data comes in with `try_recv` (silence when the producer lags).

use tokio::sync::mpsc;

use super::device_buffer::{AudioDeviceBuffer, DelayReport};

/// One captured period as delivered by the record thread.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedFrame {
    /// Interleaved S16 samples, `frames * channels` long
    pub samples: Vec<i16>,
    pub frames: usize,
    pub sample_rate: u32,
    pub channels: u8,
    pub delays: DelayReport,
    pub typing: bool,
}

/// The application's ends of a [`ChannelAudioBuffer`].
pub struct ChannelAudioHandle {
    /// Captured periods
    pub recorded: mpsc::Receiver<RecordedFrame>,
    /// Interleaved samples to play, any chunk size
    pub playout: mpsc::Sender<Vec<i16>>,
}

pub struct ChannelAudioBuffer {
    recorded_tx: mpsc::Sender<RecordedFrame>,
    playout_rx: mpsc::Receiver<Vec<i16>>,
    /// Samples received but not yet played
    pending: Vec<i16>,
    recording_rate: u32,
    recording_channels: u8,
    playout_channels: u8,
    typing: bool,
    dropped: u64,
}

impl ChannelAudioBuffer {
    /// Creates the buffer and its handle; `capacity` is in periods/chunks per direction.
    pub fn new(capacity: usize) -> (Self, ChannelAudioHandle) {
        let (recorded_tx, recorded) = mpsc::channel(capacity);
        let (playout, playout_rx) = mpsc::channel(capacity);
        let buffer = Self {
            recorded_tx,
            playout_rx,
            pending: Vec::new(),
            recording_rate: 0,
            recording_channels: 0,
            playout_channels: 0,
            typing: false,
            dropped: 0,
        };
        (buffer, ChannelAudioHandle { recorded, playout })
    }
}

impl AudioDeviceBuffer for ChannelAudioBuffer {
    fn set_recording_format(&mut self, sample_rate: u32, channels: u8) {
        self.recording_rate = sample_rate;
        self.recording_channels = channels;
    }

    fn set_playout_format(&mut self, _sample_rate: u32, channels: u8) {
        if channels != self.playout_channels {
            // Queued samples were interleaved for the old layout
            self.pending.clear();
        }
        self.playout_channels = channels;
    }

    fn deliver_recorded_data(&mut self, samples: &[i16], frames: usize, delays: DelayReport) {
        let frame = RecordedFrame {
            samples: samples.to_vec(),
            frames,
            sample_rate: self.recording_rate,
            channels: self.recording_channels,
            delays,
            typing: self.typing,
        };
        if let Err(e) = self.recorded_tx.try_send(frame) {
            self.dropped += 1;
            if self.dropped == 1 || self.dropped % 100 == 0 {
                log::warn!("Recorded frame dropped ({} total): {}", self.dropped, e);
            }
        }
    }

    fn request_playout_data(&mut self, samples: &mut [i16], frames: usize) -> usize {
        let channels = usize::from(self.playout_channels.max(1));
        let wanted = (frames * channels).min(samples.len());

        while self.pending.len() < wanted {
            match self.playout_rx.try_recv() {
                Ok(chunk) => self.pending.extend_from_slice(&chunk),
                Err(_) => break,
            }
        }

        let take = self.pending.len().min(wanted);
        let take = take - take % channels;
        samples[..take].copy_from_slice(&self.pending[..take]);
        self.pending.drain(..take);
        take / channels
    }

    fn set_typing_status(&mut self, typing: bool) {
        self.typing = typing;
    }
}
