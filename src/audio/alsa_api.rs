//! The native operations the ALSA device is built on.
//!
//! [`AlsaApi`] is a thin, safe view of the libasound calls the device needs. Every
//! fallible call returns the negative errno ALSA reported, untouched, so the device
//! and the recovery procedure can classify it. The production implementation is
//! [`LateBoundAlsa`](super::alsa_symbols::LateBoundAlsa); tests substitute their own.

/// Result of a native call: the value, or ALSA's negative errno.
pub type NativeResult<T> = Result<T, i32>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamDirection {
    Playback,
    Capture,
}

impl StreamDirection {
    /// `snd_pcm_stream_t` value.
    pub fn as_raw(self) -> i32 {
        match self {
            StreamDirection::Playback => 0,
            StreamDirection::Capture => 1,
        }
    }

    /// IOID hint value ALSA uses for devices of this direction only.
    pub fn ioid(self) -> &'static str {
        match self {
            StreamDirection::Playback => "Output",
            StreamDirection::Capture => "Input",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            StreamDirection::Playback => "playout",
            StreamDirection::Capture => "recording",
        }
    }
}

/// `snd_pcm_state_t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcmState {
    Open,
    Setup,
    Prepared,
    Running,
    Xrun,
    Draining,
    Paused,
    Suspended,
    Disconnected,
    Unknown(i32),
}

impl PcmState {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => PcmState::Open,
            1 => PcmState::Setup,
            2 => PcmState::Prepared,
            3 => PcmState::Running,
            4 => PcmState::Xrun,
            5 => PcmState::Draining,
            6 => PcmState::Paused,
            7 => PcmState::Suspended,
            8 => PcmState::Disconnected,
            other => PcmState::Unknown(other),
        }
    }

    /// Whether reads/writes can proceed without re-preparing the stream.
    pub fn is_runnable(self) -> bool {
        matches!(
            self,
            PcmState::Prepared | PcmState::Running | PcmState::Draining
        )
    }
}

/// One entry from `snd_device_name_hint`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceHint {
    /// `NAME`: the string `snd_pcm_open` accepts
    pub name: Option<String>,
    /// `DESC`: human readable, may span two lines
    pub desc: Option<String>,
    /// `IOID`: `Input`, `Output`, or absent for both
    pub ioid: Option<String>,
}

/// Arguments to `snd_pcm_set_params`. Format is always S16_LE, access RW-interleaved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmConfig {
    pub channels: u32,
    pub rate: u32,
    pub soft_resample: bool,
    pub latency_us: u32,
}

/// Sizes reported by `snd_pcm_get_params`, in frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PcmGeometry {
    pub buffer_frames: usize,
    pub period_frames: usize,
}

pub trait AlsaApi: Send + Sync + 'static {
    /// An open `snd_pcm_t`.
    type Pcm: Send + Sync + 'static;

    /// PCM name hints of every sound card, in card order.
    fn device_hints(&self) -> NativeResult<Vec<DeviceHint>>;

    fn open(&self, device: &str, direction: StreamDirection) -> NativeResult<Self::Pcm>;

    /// Closes the handle. Later calls on it fail with `-EBADFD`.
    fn close(&self, pcm: &Self::Pcm) -> NativeResult<()>;

    fn set_params(&self, pcm: &Self::Pcm, config: &PcmConfig) -> NativeResult<()>;

    fn get_params(&self, pcm: &Self::Pcm) -> NativeResult<PcmGeometry>;

    fn prepare(&self, pcm: &Self::Pcm) -> NativeResult<()>;

    fn start(&self, pcm: &Self::Pcm) -> NativeResult<()>;

    /// Stops the stream, discarding pending frames.
    fn drop_frames(&self, pcm: &Self::Pcm) -> NativeResult<()>;

    fn resume(&self, pcm: &Self::Pcm) -> NativeResult<()>;

    /// Blocks until the device is ready for I/O. `Ok(false)` on timeout.
    fn wait(&self, pcm: &Self::Pcm, timeout_ms: u32) -> NativeResult<bool>;

    fn avail_update(&self, pcm: &Self::Pcm) -> NativeResult<usize>;

    /// Reads up to `frames` interleaved frames into `buf`.
    fn readi(&self, pcm: &Self::Pcm, buf: &mut [i16], frames: usize) -> NativeResult<usize>;

    /// Writes up to `frames` interleaved frames from `buf`.
    fn writei(&self, pcm: &Self::Pcm, buf: &[i16], frames: usize) -> NativeResult<usize>;

    /// Current hardware delay in frames.
    fn delay(&self, pcm: &Self::Pcm) -> NativeResult<i64>;

    fn state(&self, pcm: &Self::Pcm) -> PcmState;

    fn strerror(&self, code: i32) -> String;
}
