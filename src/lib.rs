//! Linux ALSA audio device backend with a late-bound libasound.

pub mod audio;
pub mod config;
pub mod late_binding;

pub use audio::{AudioDeviceError, AudioDeviceGeneric, AudioDeviceLinuxAlsa};
pub use config::AudioDeviceConfig;
pub use late_binding::LateBindingSymbolTable;
