//! Hardware volume/mute control collaborator.
//!
//! The device validates lifecycle preconditions and forwards here; it keeps no mixer
//! state of its own.

use super::error::MixerError;

pub type MixerResult<T> = std::result::Result<T, MixerError>;

pub trait MixerManager: Send {
    /// Opens the playback control of the card behind PCM `device_id`.
    fn open_speaker(&mut self, device_id: &str) -> MixerResult<()>;
    fn open_microphone(&mut self, device_id: &str) -> MixerResult<()>;
    fn close_speaker(&mut self) -> MixerResult<()>;
    fn close_microphone(&mut self) -> MixerResult<()>;

    fn close(&mut self) -> MixerResult<()> {
        let speaker = self.close_speaker();
        let microphone = self.close_microphone();
        speaker.and(microphone)
    }

    fn speaker_is_initialized(&self) -> bool;
    fn microphone_is_initialized(&self) -> bool;

    fn speaker_volume_is_available(&mut self) -> MixerResult<bool>;
    fn set_speaker_volume(&mut self, volume: u32) -> MixerResult<()>;
    fn speaker_volume(&self) -> MixerResult<u32>;
    fn max_speaker_volume(&self) -> MixerResult<u32>;
    fn min_speaker_volume(&self) -> MixerResult<u32>;

    fn microphone_volume_is_available(&mut self) -> MixerResult<bool>;
    fn set_microphone_volume(&mut self, volume: u32) -> MixerResult<()>;
    fn microphone_volume(&self) -> MixerResult<u32>;
    fn max_microphone_volume(&self) -> MixerResult<u32>;
    fn min_microphone_volume(&self) -> MixerResult<u32>;

    fn speaker_mute_is_available(&mut self) -> MixerResult<bool>;
    fn set_speaker_mute(&mut self, enable: bool) -> MixerResult<()>;
    fn speaker_mute(&self) -> MixerResult<bool>;

    fn microphone_mute_is_available(&mut self) -> MixerResult<bool>;
    fn set_microphone_mute(&mut self, enable: bool) -> MixerResult<()>;
    fn microphone_mute(&self) -> MixerResult<bool>;
}

/// Mixer control name (`hw:<card>`) for a PCM device id such as `hw:CARD=PCH,DEV=0`.
///
/// Ids without a card reference map to the `default` control.
pub fn mixer_control_name(device_id: &str) -> String {
    if let Some(rest) = device_id.split_once("CARD=").map(|(_, rest)| rest) {
        let card = rest.split(',').next().unwrap_or(rest);
        if !card.is_empty() {
            return format!("hw:{}", card);
        }
    }
    if let Some(rest) = device_id.strip_prefix("hw:").or_else(|| device_id.strip_prefix("plughw:")) {
        let card = rest.split(',').next().unwrap_or(rest);
        if !card.is_empty() {
            return format!("hw:{}", card);
        }
    }
    "default".to_string()
}

/// Mixer for systems without hardware controls: opens succeed, controls are unsupported.
#[derive(Debug, Default)]
pub struct NoMixer {
    speaker_open: bool,
    microphone_open: bool,
}

impl MixerManager for NoMixer {
    fn open_speaker(&mut self, _device_id: &str) -> MixerResult<()> {
        self.speaker_open = true;
        Ok(())
    }

    fn open_microphone(&mut self, _device_id: &str) -> MixerResult<()> {
        self.microphone_open = true;
        Ok(())
    }

    fn close_speaker(&mut self) -> MixerResult<()> {
        self.speaker_open = false;
        Ok(())
    }

    fn close_microphone(&mut self) -> MixerResult<()> {
        self.microphone_open = false;
        Ok(())
    }

    fn speaker_is_initialized(&self) -> bool {
        self.speaker_open
    }

    fn microphone_is_initialized(&self) -> bool {
        self.microphone_open
    }

    fn speaker_volume_is_available(&mut self) -> MixerResult<bool> {
        Ok(false)
    }

    fn set_speaker_volume(&mut self, _volume: u32) -> MixerResult<()> {
        Err(MixerError::Unsupported("speaker volume"))
    }

    fn speaker_volume(&self) -> MixerResult<u32> {
        Err(MixerError::Unsupported("speaker volume"))
    }

    fn max_speaker_volume(&self) -> MixerResult<u32> {
        Err(MixerError::Unsupported("speaker volume"))
    }

    fn min_speaker_volume(&self) -> MixerResult<u32> {
        Err(MixerError::Unsupported("speaker volume"))
    }

    fn microphone_volume_is_available(&mut self) -> MixerResult<bool> {
        Ok(false)
    }

    fn set_microphone_volume(&mut self, _volume: u32) -> MixerResult<()> {
        Err(MixerError::Unsupported("microphone volume"))
    }

    fn microphone_volume(&self) -> MixerResult<u32> {
        Err(MixerError::Unsupported("microphone volume"))
    }

    fn max_microphone_volume(&self) -> MixerResult<u32> {
        Err(MixerError::Unsupported("microphone volume"))
    }

    fn min_microphone_volume(&self) -> MixerResult<u32> {
        Err(MixerError::Unsupported("microphone volume"))
    }

    fn speaker_mute_is_available(&mut self) -> MixerResult<bool> {
        Ok(false)
    }

    fn set_speaker_mute(&mut self, _enable: bool) -> MixerResult<()> {
        Err(MixerError::Unsupported("speaker mute"))
    }

    fn speaker_mute(&self) -> MixerResult<bool> {
        Err(MixerError::Unsupported("speaker mute"))
    }

    fn microphone_mute_is_available(&mut self) -> MixerResult<bool> {
        Ok(false)
    }

    fn set_microphone_mute(&mut self, _enable: bool) -> MixerResult<()> {
        Err(MixerError::Unsupported("microphone mute"))
    }

    fn microphone_mute(&self) -> MixerResult<bool> {
        Err(MixerError::Unsupported("microphone mute"))
    }
}

#[cfg(feature = "alsa-mixer")]
pub use alsa_mixer::AlsaMixerManager;

#[cfg(feature = "alsa-mixer")]
mod alsa_mixer {
    use alsa::mixer::{Mixer, Selem, SelemChannelId, SelemId};

    use super::{MixerError, MixerManager, MixerResult, mixer_control_name};

    const SPEAKER_ELEMENTS: &[&str] = &["Master", "PCM", "Speaker", "Headphone"];
    const MICROPHONE_ELEMENTS: &[&str] = &["Capture", "Mic", "Internal Mic"];

    /// An opened mixer plus the simple element chosen for one direction.
    struct Control {
        mixer: Mixer,
        element: String,
    }

    // The mixer handle is only touched through `&mut AlsaMixerManager`, one thread at a time.
    unsafe impl Send for Control {}

    impl Control {
        fn open(device_id: &str, playback: bool) -> MixerResult<Self> {
            let card = mixer_control_name(device_id);
            let mixer = Mixer::new(&card, false)
                .map_err(|e| MixerError::Backend(format!("open mixer {}: {}", card, e)))?;
            let element = Self::pick_element(&mixer, playback).ok_or_else(|| {
                MixerError::Backend(format!("no usable element on {}", card))
            })?;
            log::info!(
                "ALSA mixer opened: card={}, element={} ({})",
                card,
                element,
                if playback { "speaker" } else { "microphone" }
            );
            Ok(Self { mixer, element })
        }

        fn pick_element(mixer: &Mixer, playback: bool) -> Option<String> {
            let preferred = if playback { SPEAKER_ELEMENTS } else { MICROPHONE_ELEMENTS };
            let mut candidates = Vec::new();
            for elem in mixer.iter() {
                let Some(selem) = Selem::new(elem) else {
                    continue;
                };
                let usable = if playback {
                    selem.has_playback_volume()
                } else {
                    selem.has_capture_volume()
                };
                if !usable {
                    continue;
                }
                if let Ok(name) = selem.get_id().get_name() {
                    candidates.push(name.to_string());
                }
            }
            preferred
                .iter()
                .find_map(|p| candidates.iter().find(|c| c.as_str() == *p).cloned())
                .or_else(|| candidates.into_iter().next())
        }

        fn with_selem<T>(&self, f: impl FnOnce(&Selem<'_>) -> MixerResult<T>) -> MixerResult<T> {
            let selem = self
                .mixer
                .find_selem(&SelemId::new(&self.element, 0))
                .ok_or_else(|| MixerError::Backend(format!("element {} vanished", self.element)))?;
            f(&selem)
        }
    }

    fn backend(e: alsa::Error) -> MixerError {
        MixerError::Backend(e.to_string())
    }

    fn clamp(value: i64) -> u32 {
        value.clamp(0, i64::from(u32::MAX)) as u32
    }

    /// [`MixerManager`] over the `alsa` crate's simple mixer interface.
    #[derive(Default)]
    pub struct AlsaMixerManager {
        speaker: Option<Control>,
        microphone: Option<Control>,
    }

    impl AlsaMixerManager {
        pub fn new() -> Self {
            Self::default()
        }

        fn speaker(&self) -> MixerResult<&Control> {
            self.speaker.as_ref().ok_or(MixerError::NotOpen)
        }

        fn microphone(&self) -> MixerResult<&Control> {
            self.microphone.as_ref().ok_or(MixerError::NotOpen)
        }
    }

    impl MixerManager for AlsaMixerManager {
        fn open_speaker(&mut self, device_id: &str) -> MixerResult<()> {
            self.speaker = Some(Control::open(device_id, true)?);
            Ok(())
        }

        fn open_microphone(&mut self, device_id: &str) -> MixerResult<()> {
            self.microphone = Some(Control::open(device_id, false)?);
            Ok(())
        }

        fn close_speaker(&mut self) -> MixerResult<()> {
            self.speaker = None;
            Ok(())
        }

        fn close_microphone(&mut self) -> MixerResult<()> {
            self.microphone = None;
            Ok(())
        }

        fn speaker_is_initialized(&self) -> bool {
            self.speaker.is_some()
        }

        fn microphone_is_initialized(&self) -> bool {
            self.microphone.is_some()
        }

        fn speaker_volume_is_available(&mut self) -> MixerResult<bool> {
            self.speaker()?.with_selem(|s| Ok(s.has_playback_volume()))
        }

        fn set_speaker_volume(&mut self, volume: u32) -> MixerResult<()> {
            self.speaker()?
                .with_selem(|s| s.set_playback_volume_all(i64::from(volume)).map_err(backend))
        }

        fn speaker_volume(&self) -> MixerResult<u32> {
            self.speaker()?.with_selem(|s| {
                s.get_playback_volume(SelemChannelId::FrontLeft)
                    .map(clamp)
                    .map_err(backend)
            })
        }

        fn max_speaker_volume(&self) -> MixerResult<u32> {
            self.speaker()?
                .with_selem(|s| Ok(clamp(s.get_playback_volume_range().1)))
        }

        fn min_speaker_volume(&self) -> MixerResult<u32> {
            self.speaker()?
                .with_selem(|s| Ok(clamp(s.get_playback_volume_range().0)))
        }

        fn microphone_volume_is_available(&mut self) -> MixerResult<bool> {
            self.microphone()?.with_selem(|s| Ok(s.has_capture_volume()))
        }

        fn set_microphone_volume(&mut self, volume: u32) -> MixerResult<()> {
            self.microphone()?
                .with_selem(|s| s.set_capture_volume_all(i64::from(volume)).map_err(backend))
        }

        fn microphone_volume(&self) -> MixerResult<u32> {
            self.microphone()?.with_selem(|s| {
                s.get_capture_volume(SelemChannelId::FrontLeft)
                    .map(clamp)
                    .map_err(backend)
            })
        }

        fn max_microphone_volume(&self) -> MixerResult<u32> {
            self.microphone()?
                .with_selem(|s| Ok(clamp(s.get_capture_volume_range().1)))
        }

        fn min_microphone_volume(&self) -> MixerResult<u32> {
            self.microphone()?
                .with_selem(|s| Ok(clamp(s.get_capture_volume_range().0)))
        }

        fn speaker_mute_is_available(&mut self) -> MixerResult<bool> {
            self.speaker()?.with_selem(|s| Ok(s.has_playback_switch()))
        }

        fn set_speaker_mute(&mut self, enable: bool) -> MixerResult<()> {
            // switch 为 1 表示声音打开, 与静音相反
            self.speaker()?
                .with_selem(|s| s.set_playback_switch_all(i32::from(!enable)).map_err(backend))
        }

        fn speaker_mute(&self) -> MixerResult<bool> {
            self.speaker()?.with_selem(|s| {
                s.get_playback_switch(SelemChannelId::FrontLeft)
                    .map(|on| on == 0)
                    .map_err(backend)
            })
        }

        fn microphone_mute_is_available(&mut self) -> MixerResult<bool> {
            self.microphone()?.with_selem(|s| Ok(s.has_capture_switch()))
        }

        fn set_microphone_mute(&mut self, enable: bool) -> MixerResult<()> {
            self.microphone()?
                .with_selem(|s| s.set_capture_switch_all(i32::from(!enable)).map_err(backend))
        }

        fn microphone_mute(&self) -> MixerResult<bool> {
            self.microphone()?.with_selem(|s| {
                s.get_capture_switch(SelemChannelId::FrontLeft)
                    .map(|on| on == 0)
                    .map_err(backend)
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixer_control_name_from_card_id() {
        assert_eq!(mixer_control_name("hw:CARD=PCH,DEV=0"), "hw:PCH");
        assert_eq!(mixer_control_name("sysdefault:CARD=Device"), "hw:Device");
        assert_eq!(mixer_control_name("plughw:1,0"), "hw:1");
        assert_eq!(mixer_control_name("default"), "default");
    }

    #[test]
    fn test_no_mixer_tracks_open_state_only() {
        let mut mixer = NoMixer::default();
        assert!(!mixer.speaker_is_initialized());
        mixer.open_speaker("default").unwrap();
        assert!(mixer.speaker_is_initialized());
        assert_eq!(mixer.speaker_volume_is_available(), Ok(false));
        assert_eq!(
            mixer.set_speaker_volume(10),
            Err(MixerError::Unsupported("speaker volume"))
        );
        mixer.close().unwrap();
        assert!(!mixer.speaker_is_initialized());
    }
}
