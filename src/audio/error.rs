//! Status vocabulary shared by every audio device backend.

use thiserror::Error;

/// Error returned by control-path methods of an audio device.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AudioDeviceError {
    /// Bad device index, or a method called in the wrong lifecycle state
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Underrun/overrun, suspend or interrupted call; normally absorbed by recovery
    #[error("Transient device error ({code}): {message}")]
    TransientDevice { code: i32, message: String },

    /// Unrecoverable native failure
    #[error("Fatal device error ({code}): {message}")]
    FatalDevice { code: i32, message: String },

    /// Native library missing or incompatible; the backend stays unavailable
    #[error("Symbol resolution failed for {library}: {reason}")]
    SymbolResolution { library: String, reason: String },

    /// A data-path thread could not be spawned or panicked
    #[error("Thread error: {0}")]
    Thread(String),
}

impl AudioDeviceError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Classify a negative errno returned by the native library.
    pub fn from_native(code: i32, message: impl Into<String>) -> Self {
        let message = message.into();
        if is_transient_code(code) {
            Self::TransientDevice { code, message }
        } else {
            Self::FatalDevice { code, message }
        }
    }

    /// Promote any native error to fatal, keeping its code.
    pub fn into_fatal(self) -> Self {
        match self {
            Self::TransientDevice { code, message } => Self::FatalDevice { code, message },
            other => other,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::FatalDevice { .. })
    }
}

/// `-EPIPE` (xrun), `-ESTRPIPE` (suspend), `-EAGAIN` and `-EINTR`.
pub fn is_transient_code(code: i32) -> bool {
    [libc::EPIPE, libc::ESTRPIPE, libc::EAGAIN, libc::EINTR].contains(&-code)
}

/// Error reported by a [`MixerManager`](super::mixer::MixerManager).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MixerError {
    #[error("mixer element is not open")]
    NotOpen,

    #[error("mixer does not support {0}")]
    Unsupported(&'static str),

    #[error("mixer backend error: {0}")]
    Backend(String),
}

impl From<MixerError> for AudioDeviceError {
    fn from(e: MixerError) -> Self {
        match e {
            MixerError::NotOpen | MixerError::Unsupported(_) => {
                AudioDeviceError::Configuration(e.to_string())
            }
            MixerError::Backend(message) => AudioDeviceError::FatalDevice {
                code: -libc::EIO,
                message,
            },
        }
    }
}

/// Convenient Result type alias
pub type Result<T> = std::result::Result<T, AudioDeviceError>;
