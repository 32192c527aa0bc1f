//! audio - Linux ALSA capture and playback device
//!
//! libasound is bound at runtime through the late-binding symbol table, so a system
//! without ALSA still runs; the device simply reports itself unavailable. Capture and
//! playout each run on a dedicated OS thread (not a tokio task) that exchanges
//! periods with an [`AudioDeviceBuffer`].

pub mod alsa_api;
pub mod alsa_device;
pub mod alsa_symbols;
pub mod channel_buffer;
pub mod device_buffer;
pub mod devices;
pub mod error;
pub mod generic;
pub mod key_state;
pub mod mixer;
mod play;
mod record;
pub mod recovery;

pub use alsa_api::{AlsaApi, DeviceHint, PcmConfig, PcmGeometry, PcmState, StreamDirection};
pub use alsa_device::{AudioDeviceLinuxAlsa, StreamState, default_mixer};
pub use alsa_symbols::{AlsaPcm, AlsaSymbolTable, AlsaSymbols, LateBoundAlsa};
pub use channel_buffer::{ChannelAudioBuffer, ChannelAudioHandle, RecordedFrame};
pub use device_buffer::{AudioDeviceBuffer, DelayReport};
pub use error::{AudioDeviceError, MixerError, Result};
pub use generic::{AudioDeviceGeneric, AudioLayer, DeviceName};
pub use key_state::{KeyStateProbe, KeymapDiff};
pub use mixer::{MixerManager, NoMixer};
