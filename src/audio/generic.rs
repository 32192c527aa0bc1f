//! The capability interface every audio device backend implements.

use serde::Serialize;

use super::device_buffer::AudioDeviceBuffer;
use super::error::Result;

/// Native audio layer behind a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AudioLayer {
    PlatformDefault,
    LinuxAlsa,
    LinuxPulse,
    Dummy,
}

/// A device as shown to the user, plus the identifier used to open it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceName {
    pub name: String,
    pub guid: String,
}

/// Lifecycle, enumeration, stream control, mixer pass-through and delay queries.
///
/// All methods take `&self`: implementations are monitors, so a device can be shared
/// between the thread that configures it and the one that stops it.
pub trait AudioDeviceGeneric: Send + Sync {
    fn active_audio_layer(&self) -> AudioLayer;

    // Main initialization and termination
    fn init(&self) -> Result<()>;
    fn terminate(&self) -> Result<()>;
    fn initialized(&self) -> bool;

    // Device enumeration
    fn playout_devices(&self) -> Result<u16>;
    fn recording_devices(&self) -> Result<u16>;
    fn playout_device_name(&self, index: u16) -> Result<DeviceName>;
    fn recording_device_name(&self, index: u16) -> Result<DeviceName>;

    // Device selection
    fn set_playout_device(&self, index: u16) -> Result<()>;
    fn set_recording_device(&self, index: u16) -> Result<()>;

    // Audio transport initialization
    fn playout_is_available(&self) -> Result<bool>;
    fn init_playout(&self) -> Result<()>;
    fn playout_is_initialized(&self) -> bool;
    fn recording_is_available(&self) -> Result<bool>;
    fn init_recording(&self) -> Result<()>;
    fn recording_is_initialized(&self) -> bool;

    // Audio transport control
    fn start_playout(&self) -> Result<()>;
    fn stop_playout(&self) -> Result<()>;
    fn playing(&self) -> bool;
    fn start_recording(&self) -> Result<()>;
    fn stop_recording(&self) -> Result<()>;
    fn recording(&self) -> bool;

    // Audio mixer initialization
    fn init_speaker(&self) -> Result<()>;
    fn speaker_is_initialized(&self) -> bool;
    fn init_microphone(&self) -> Result<()>;
    fn microphone_is_initialized(&self) -> bool;

    // Speaker volume controls
    fn speaker_volume_is_available(&self) -> Result<bool>;
    fn set_speaker_volume(&self, volume: u32) -> Result<()>;
    fn speaker_volume(&self) -> Result<u32>;
    fn max_speaker_volume(&self) -> Result<u32>;
    fn min_speaker_volume(&self) -> Result<u32>;

    // Microphone volume controls
    fn microphone_volume_is_available(&self) -> Result<bool>;
    fn set_microphone_volume(&self, volume: u32) -> Result<()>;
    fn microphone_volume(&self) -> Result<u32>;
    fn max_microphone_volume(&self) -> Result<u32>;
    fn min_microphone_volume(&self) -> Result<u32>;

    // Speaker mute control
    fn speaker_mute_is_available(&self) -> Result<bool>;
    fn set_speaker_mute(&self, enable: bool) -> Result<()>;
    fn speaker_mute(&self) -> Result<bool>;

    // Microphone mute control
    fn microphone_mute_is_available(&self) -> Result<bool>;
    fn set_microphone_mute(&self, enable: bool) -> Result<()>;
    fn microphone_mute(&self) -> Result<bool>;

    // Stereo support
    fn stereo_playout_is_available(&self) -> Result<bool>;
    fn set_stereo_playout(&self, enable: bool) -> Result<()>;
    fn stereo_playout(&self) -> bool;
    fn stereo_recording_is_available(&self) -> Result<bool>;
    fn set_stereo_recording(&self, enable: bool) -> Result<()>;
    fn stereo_recording(&self) -> bool;

    // Delay information, in milliseconds
    fn playout_delay(&self) -> Result<u16>;
    fn recording_delay(&self) -> Result<u16>;

    /// Replaces the frame-buffer collaborator the data-path threads exchange PCM with.
    fn attach_audio_buffer(&self, buffer: Box<dyn AudioDeviceBuffer>);
}
