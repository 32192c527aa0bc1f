//! The ALSA audio device: lifecycle, enumeration and the control path.
//!
//! All state sits behind one monitor lock in [`Shared`]. Control calls hold it for
//! their whole critical section; the record and playout threads take it only to check
//! for a stop request and to hand a period to or from the [`AudioDeviceBuffer`]. Native
//! I/O never runs under it.

use std::fmt::Display;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use super::alsa_api::{AlsaApi, PcmConfig, PcmGeometry, StreamDirection};
use super::alsa_symbols::{AlsaSymbolTable, LateBoundAlsa};
use super::device_buffer::{AudioDeviceBuffer, frames_to_ms};
use super::devices::{DEFAULT_DEVICE, filter_hints};
use super::error::{AudioDeviceError, Result};
use super::generic::{AudioDeviceGeneric, AudioLayer, DeviceName};
use super::key_state::KeyStateProbe;
use super::mixer::MixerManager;
use super::{play, record};
use crate::config::{AudioDeviceConfig, StreamConfig};

/// Lifecycle of one stream direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Uninitialized,
    /// PCM open and configured, no thread
    Initialized,
    /// Loop thread running
    Started,
    /// Stop requested or loop ended fatally; PCM not yet released
    Stopped,
}

#[derive(Debug, Clone)]
struct SelectedDevice {
    index: u16,
    guid: String,
}

/// One direction's PCM, frame buffer and loop thread.
pub(crate) struct Stream<P> {
    pub(crate) state: StreamState,
    pcm: Option<Arc<P>>,
    geometry: PcmGeometry,
    /// Present while Initialized; lives in the loop thread while Started.
    buffer: Option<Vec<i16>>,
    buffer_samples: usize,
    /// Last hardware delay measured by the loop thread, in frames
    pub(crate) delay_frames: i64,
    thread: Option<JoinHandle<Vec<i16>>>,
    /// Set by a loop that could not recover; reported by the next control call.
    pub(crate) fatal: Option<AudioDeviceError>,
}

impl<P> Stream<P> {
    fn new() -> Self {
        Self {
            state: StreamState::Uninitialized,
            pcm: None,
            geometry: PcmGeometry::default(),
            buffer: None,
            buffer_samples: 0,
            delay_frames: 0,
            thread: None,
            fatal: None,
        }
    }

    fn is_initialized(&self) -> bool {
        matches!(self.state, StreamState::Initialized | StreamState::Started)
    }
}

pub(crate) struct DeviceState<P> {
    initialized: bool,
    pub(crate) audio_buffer: Option<Box<dyn AudioDeviceBuffer>>,
    mixer: Box<dyn MixerManager>,
    pub(crate) key_probe: Option<Box<dyn KeyStateProbe>>,
    input_device: Option<SelectedDevice>,
    output_device: Option<SelectedDevice>,
    pub(crate) record: Stream<P>,
    pub(crate) playout: Stream<P>,
    rec_channels: u8,
    play_channels: u8,
}

impl<P> DeviceState<P> {
    fn stream_mut(&mut self, direction: StreamDirection) -> &mut Stream<P> {
        match direction {
            StreamDirection::Capture => &mut self.record,
            StreamDirection::Playback => &mut self.playout,
        }
    }
}

/// State shared between the device handle and its loop threads.
pub(crate) struct Shared<A: AlsaApi> {
    pub(crate) api: A,
    pub(crate) config: AudioDeviceConfig,
    state: Mutex<DeviceState<A::Pcm>>,
    /// Signalled whenever a stream is released back to Uninitialized.
    released: Condvar,
}

impl<A: AlsaApi> Shared<A> {
    /// Takes the monitor. A panicked loop thread must not wedge the control path.
    pub(crate) fn lock(&self) -> MutexGuard<'_, DeviceState<A::Pcm>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks until the stream of `direction` has left Stopped.
    fn wait_released(&self, direction: StreamDirection) {
        let guard = self.lock();
        let _guard = self
            .released
            .wait_while(guard, |state| {
                state.stream_mut(direction).state == StreamState::Stopped
            })
            .unwrap_or_else(PoisonError::into_inner);
    }
}

/// Linux ALSA implementation of [`AudioDeviceGeneric`].
pub struct AudioDeviceLinuxAlsa<A: AlsaApi = LateBoundAlsa> {
    shared: Arc<Shared<A>>,
}

/// Mixer used when the caller does not supply one.
pub fn default_mixer() -> Box<dyn MixerManager> {
    #[cfg(feature = "alsa-mixer")]
    {
        Box::new(super::mixer::AlsaMixerManager::new())
    }
    #[cfg(not(feature = "alsa-mixer"))]
    {
        Box::new(super::mixer::NoMixer::default())
    }
}

impl AudioDeviceLinuxAlsa<LateBoundAlsa> {
    /// Device over a loaded libasound symbol table.
    pub fn from_table(table: Arc<AlsaSymbolTable>, config: AudioDeviceConfig) -> Result<Self> {
        Ok(Self::new(LateBoundAlsa::new(table)?, config, default_mixer()))
    }
}

impl<A: AlsaApi> AudioDeviceLinuxAlsa<A> {
    pub fn new(api: A, config: AudioDeviceConfig, mixer: Box<dyn MixerManager>) -> Self {
        let state = DeviceState {
            initialized: false,
            audio_buffer: None,
            mixer,
            key_probe: None,
            input_device: None,
            output_device: None,
            record: Stream::new(),
            playout: Stream::new(),
            rec_channels: config.recording.channels,
            play_channels: config.playout.channels,
        };
        Self {
            shared: Arc::new(Shared {
                api,
                config,
                state: Mutex::new(state),
                released: Condvar::new(),
            }),
        }
    }

    /// Installs the probe whose result is reported as typing status with each recorded period.
    pub fn with_key_probe(self, probe: Box<dyn KeyStateProbe>) -> Self {
        self.shared.lock().key_probe = Some(probe);
        self
    }

    pub fn config(&self) -> &AudioDeviceConfig {
        &self.shared.config
    }

    pub fn recording_state(&self) -> StreamState {
        self.shared.lock().record.state
    }

    pub fn playout_state(&self) -> StreamState {
        self.shared.lock().playout.state
    }

    /// Frames per hardware period of the recording stream, 0 when not initialized.
    pub fn recording_period_frames(&self) -> usize {
        self.shared.lock().record.geometry.period_frames
    }

    pub fn playout_period_frames(&self) -> usize {
        self.shared.lock().playout.geometry.period_frames
    }

    /// Interleaved samples in the recording frame buffer.
    pub fn recording_buffer_len(&self) -> usize {
        self.shared.lock().record.buffer_samples
    }

    pub fn playout_buffer_len(&self) -> usize {
        self.shared.lock().playout.buffer_samples
    }

    fn stream_config(&self, direction: StreamDirection) -> StreamConfig {
        match direction {
            StreamDirection::Capture => self.shared.config.recording,
            StreamDirection::Playback => self.shared.config.playout,
        }
    }

    /// Control-path failure. Recovery only runs inside the loops, so nothing here is transient.
    fn native_error(&self, code: i32, context: impl Display) -> AudioDeviceError {
        AudioDeviceError::from_native(
            code,
            format!("{}: {}", context, self.shared.api.strerror(code)),
        )
        .into_fatal()
    }

    fn enumerate(&self, direction: StreamDirection) -> Result<Vec<DeviceName>> {
        let hints = self
            .shared
            .api
            .device_hints()
            .map_err(|e| self.native_error(e, "snd_device_name_hint"))?;
        Ok(filter_hints(&hints, direction))
    }

    fn device_name(&self, direction: StreamDirection, index: u16) -> Result<DeviceName> {
        let devices = self.enumerate(direction)?;
        let count = devices.len();
        devices.into_iter().nth(usize::from(index)).ok_or_else(|| {
            AudioDeviceError::configuration(format!(
                "{} device index {} out of range ({} devices)",
                direction.name(),
                index,
                count
            ))
        })
    }

    fn set_device(&self, direction: StreamDirection, index: u16) -> Result<()> {
        let device = self.device_name(direction, index)?;
        let mut state = self.shared.lock();
        if state.stream_mut(direction).state != StreamState::Uninitialized {
            return Err(AudioDeviceError::configuration(format!(
                "cannot change {} device while the stream is initialized",
                direction.name()
            )));
        }
        log::info!(
            "Selected {} device {}: {} ({})",
            direction.name(),
            index,
            device.name,
            device.guid
        );
        let selected = Some(SelectedDevice {
            index,
            guid: device.guid,
        });
        match direction {
            StreamDirection::Capture => state.input_device = selected,
            StreamDirection::Playback => state.output_device = selected,
        }
        Ok(())
    }

    /// Opens and configures a PCM, optionally falling back to the other mono/stereo count.
    /// Returns the channel count ALSA accepted.
    fn open_pcm(
        &self,
        guid: &str,
        direction: StreamDirection,
        channels: u8,
        allow_fallback: bool,
    ) -> Result<(A::Pcm, PcmGeometry, u8)> {
        let api = &self.shared.api;
        let stream = self.stream_config(direction);
        let pcm = api
            .open(guid, direction)
            .map_err(|e| self.native_error(e, format!("open {} device '{}'", direction.name(), guid)))?;

        let mut params = PcmConfig {
            channels: u32::from(channels),
            rate: stream.sample_rate,
            soft_resample: true,
            latency_us: stream.latency_us,
        };
        let mut accepted = channels;
        if let Err(code) = api.set_params(&pcm, &params) {
            let fallback = if channels == 2 { 1 } else { 2 };
            if !allow_fallback {
                let _ = api.close(&pcm);
                return Err(self.native_error(code, "snd_pcm_set_params"));
            }
            log::warn!(
                "{} device '{}' rejected {} channel(s), trying {}",
                direction.name(),
                guid,
                channels,
                fallback
            );
            params.channels = u32::from(fallback);
            if let Err(code) = api.set_params(&pcm, &params) {
                let _ = api.close(&pcm);
                return Err(self.native_error(code, "snd_pcm_set_params"));
            }
            accepted = fallback;
        }

        let geometry = match api.get_params(&pcm) {
            Ok(geometry) if geometry.period_frames > 0 => geometry,
            Ok(_) => {
                let _ = api.close(&pcm);
                return Err(AudioDeviceError::FatalDevice {
                    code: -libc::EINVAL,
                    message: format!("{} device '{}' reported a zero period", direction.name(), guid),
                });
            }
            Err(code) => {
                let _ = api.close(&pcm);
                return Err(self.native_error(code, "snd_pcm_get_params"));
            }
        };

        log::info!(
            "ALSA {} device '{}' opened: rate={}, channels={}, period={} frames, buffer={} frames",
            direction.name(),
            guid,
            stream.sample_rate,
            accepted,
            geometry.period_frames,
            geometry.buffer_frames
        );
        Ok((pcm, geometry, accepted))
    }

    /// Drops pending frames, closes the PCM and returns the stream to Uninitialized.
    fn release_stream(&self, stream: &mut Stream<A::Pcm>, direction: StreamDirection) {
        if let Some(pcm) = stream.pcm.take() {
            let api = &self.shared.api;
            if let Err(e) = api.drop_frames(&pcm) {
                log::debug!("snd_pcm_drop on {} stream: {}", direction.name(), api.strerror(e));
            }
            if let Err(e) = api.close(&pcm) {
                log::warn!("Failed to close {} PCM: {}", direction.name(), api.strerror(e));
            }
        }
        stream.state = StreamState::Uninitialized;
        stream.geometry = PcmGeometry::default();
        stream.buffer = None;
        stream.buffer_samples = 0;
        stream.delay_frames = 0;
        stream.thread = None;
        stream.fatal = None;
        self.shared.released.notify_all();
    }

    /// Cleans up after a loop that ended fatally and reports its error, once.
    ///
    /// The loop's last act is storing the error, so joining here cannot wait on the monitor.
    /// A stream whose thread was already taken belongs to the stopper joining it.
    fn reap_fatal(
        &self,
        state: &mut DeviceState<A::Pcm>,
        direction: StreamDirection,
    ) -> Result<()> {
        let stream = state.stream_mut(direction);
        if stream.state == StreamState::Stopped && stream.thread.is_none() {
            return Ok(());
        }
        let Some(err) = stream.fatal.take() else {
            return Ok(());
        };
        if let Some(handle) = stream.thread.take() {
            if handle.join().is_err() {
                log::error!("{} thread panicked", direction.name());
            }
        }
        self.release_stream(stream, direction);
        log::error!("{} stream stopped after fatal error: {}", direction.name(), err);
        Err(err)
    }

    fn init_stream(&self, direction: StreamDirection) -> Result<()> {
        let mut guard = self.shared.lock();
        let state = &mut *guard;
        self.reap_fatal(state, direction)?;

        match state.stream_mut(direction).state {
            StreamState::Initialized => return Ok(()),
            StreamState::Started => {
                return Err(AudioDeviceError::configuration(format!(
                    "{} already started",
                    direction.name()
                )));
            }
            StreamState::Stopped => {
                return Err(AudioDeviceError::configuration(format!(
                    "{} stop in progress",
                    direction.name()
                )));
            }
            StreamState::Uninitialized => {}
        }

        let selected = match direction {
            StreamDirection::Capture => state.input_device.clone(),
            StreamDirection::Playback => state.output_device.clone(),
        };
        let Some(device) = selected else {
            return Err(AudioDeviceError::configuration(format!(
                "no {} device selected",
                direction.name()
            )));
        };

        // Mixer trouble must not keep the stream from opening.
        let mixer_result = match direction {
            StreamDirection::Capture if !state.mixer.microphone_is_initialized() => {
                state.mixer.open_microphone(&device.guid)
            }
            StreamDirection::Playback if !state.mixer.speaker_is_initialized() => {
                state.mixer.open_speaker(&device.guid)
            }
            _ => Ok(()),
        };
        if let Err(e) = mixer_result {
            log::warn!("Failed to open {} mixer for '{}': {}", direction.name(), device.guid, e);
        }

        let requested = match direction {
            StreamDirection::Capture => state.rec_channels,
            StreamDirection::Playback => state.play_channels,
        };
        let (pcm, geometry, channels) = self.open_pcm(&device.guid, direction, requested, true)?;
        let rate = self.stream_config(direction).sample_rate;
        let samples = geometry.period_frames * usize::from(channels);

        match direction {
            StreamDirection::Capture => {
                state.rec_channels = channels;
                if let Some(buffer) = state.audio_buffer.as_mut() {
                    buffer.set_recording_format(rate, channels);
                }
            }
            StreamDirection::Playback => {
                state.play_channels = channels;
                if let Some(buffer) = state.audio_buffer.as_mut() {
                    buffer.set_playout_format(rate, channels);
                }
            }
        }

        let stream = state.stream_mut(direction);
        stream.pcm = Some(Arc::new(pcm));
        stream.geometry = geometry;
        stream.buffer = Some(vec![0; samples]);
        stream.buffer_samples = samples;
        stream.delay_frames = 0;
        stream.state = StreamState::Initialized;
        log::info!(
            "{} initialized on device {} ({} samples per period)",
            direction.name(),
            device.index,
            samples
        );
        Ok(())
    }

    fn start_stream(&self, direction: StreamDirection) -> Result<()> {
        let mut guard = self.shared.lock();
        let state = &mut *guard;
        self.reap_fatal(state, direction)?;

        match state.stream_mut(direction).state {
            StreamState::Started => return Ok(()),
            StreamState::Uninitialized => {
                return Err(AudioDeviceError::configuration(format!(
                    "{} not initialized",
                    direction.name()
                )));
            }
            StreamState::Stopped => {
                return Err(AudioDeviceError::configuration(format!(
                    "{} stop in progress",
                    direction.name()
                )));
            }
            StreamState::Initialized => {}
        }
        if state.audio_buffer.is_none() {
            return Err(AudioDeviceError::configuration(
                "no audio buffer attached",
            ));
        }

        let channels = usize::from(match direction {
            StreamDirection::Capture => state.rec_channels,
            StreamDirection::Playback => state.play_channels,
        });
        let stream = state.stream_mut(direction);
        let Some(pcm) = stream.pcm.clone() else {
            return Err(AudioDeviceError::configuration(format!(
                "{} has no open PCM",
                direction.name()
            )));
        };

        let api = &self.shared.api;
        api.prepare(&pcm)
            .map_err(|e| self.native_error(e, "snd_pcm_prepare"))?;
        if direction == StreamDirection::Capture {
            api.start(&pcm)
                .map_err(|e| self.native_error(e, "snd_pcm_start"))?;
        }

        let period_frames = stream.geometry.period_frames;
        let buffer = stream
            .buffer
            .take()
            .unwrap_or_else(|| vec![0; stream.buffer_samples]);
        let shared = Arc::clone(&self.shared);

        // The loop's first stop check blocks until this call releases the monitor.
        stream.state = StreamState::Started;
        let spawned = match direction {
            StreamDirection::Capture => thread::Builder::new()
                .name("adm-record".to_string())
                .spawn(move || record::run(shared, pcm, buffer, period_frames, channels)),
            StreamDirection::Playback => thread::Builder::new()
                .name("adm-playout".to_string())
                .spawn(move || play::run(shared, pcm, buffer, period_frames, channels)),
        };

        match spawned {
            Ok(handle) => {
                stream.thread = Some(handle);
                log::info!("{} started", direction.name());
                Ok(())
            }
            Err(e) => {
                stream.state = StreamState::Initialized;
                stream.buffer = Some(vec![0; stream.buffer_samples]);
                log::error!("Failed to spawn {} thread: {}", direction.name(), e);
                Err(AudioDeviceError::Thread(e.to_string()))
            }
        }
    }

    fn stop_stream(&self, direction: StreamDirection) -> Result<()> {
        let handle = {
            let mut guard = self.shared.lock();
            let state = &mut *guard;
            self.reap_fatal(state, direction)?;

            let stream = state.stream_mut(direction);
            match stream.state {
                StreamState::Uninitialized => return Ok(()),
                StreamState::Initialized => {
                    self.release_stream(stream, direction);
                    log::info!("{} released", direction.name());
                    return Ok(());
                }
                StreamState::Started | StreamState::Stopped => {
                    stream.state = StreamState::Stopped;
                    stream.thread.take()
                }
            }
        };

        let Some(handle) = handle else {
            // Another caller is joining; return once it has released the stream.
            self.shared.wait_released(direction);
            return Ok(());
        };

        let joined = handle.join();

        let mut guard = self.shared.lock();
        let stream = guard.stream_mut(direction);
        let fatal = stream.fatal.take();
        self.release_stream(stream, direction);
        log::info!("{} stopped", direction.name());

        if joined.is_err() {
            log::error!("{} thread panicked", direction.name());
            return Err(AudioDeviceError::Thread(format!(
                "{} thread panicked",
                direction.name()
            )));
        }
        match fatal {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn is_available(&self, direction: StreamDirection, channels: Option<u8>) -> Result<bool> {
        let (guid, requested) = {
            let mut guard = self.shared.lock();
            let state = &mut *guard;
            let (initialized, current, selected) = match direction {
                StreamDirection::Capture => (
                    state.record.is_initialized(),
                    state.rec_channels,
                    state.input_device.as_ref(),
                ),
                StreamDirection::Playback => (
                    state.playout.is_initialized(),
                    state.play_channels,
                    state.output_device.as_ref(),
                ),
            };
            if initialized {
                return Ok(channels.is_none_or(|c| c == current));
            }
            let guid = selected.map_or_else(|| DEFAULT_DEVICE.to_string(), |d| d.guid.clone());
            (guid, channels.unwrap_or(current))
        };

        match self.open_pcm(&guid, direction, requested, channels.is_none()) {
            Ok((pcm, _, _)) => {
                let _ = self.shared.api.close(&pcm);
                Ok(true)
            }
            Err(e) => {
                log::debug!("{} probe on '{}' failed: {}", direction.name(), guid, e);
                Ok(false)
            }
        }
    }

    fn set_stereo(&self, direction: StreamDirection, enable: bool) -> Result<()> {
        let mut state = self.shared.lock();
        if state.stream_mut(direction).state != StreamState::Uninitialized {
            return Err(AudioDeviceError::configuration(format!(
                "cannot change {} channels while the stream is initialized",
                direction.name()
            )));
        }
        let channels = if enable { 2 } else { 1 };
        match direction {
            StreamDirection::Capture => state.rec_channels = channels,
            StreamDirection::Playback => state.play_channels = channels,
        }
        Ok(())
    }

    fn delay_ms(&self, direction: StreamDirection) -> u16 {
        let frames = self.shared.lock().stream_mut(direction).delay_frames;
        let ms = frames_to_ms(frames, self.stream_config(direction).sample_rate);
        u16::try_from(ms).unwrap_or(u16::MAX)
    }

    fn mixer_guid(selected: Option<&SelectedDevice>) -> String {
        selected.map_or_else(|| DEFAULT_DEVICE.to_string(), |d| d.guid.clone())
    }

    /// Runs `f` against the speaker control, opening it just for the call if needed.
    fn probe_speaker<T>(
        &self,
        f: impl FnOnce(&mut dyn MixerManager) -> std::result::Result<T, super::error::MixerError>,
    ) -> Result<T> {
        let mut guard = self.shared.lock();
        let state = &mut *guard;
        if state.mixer.speaker_is_initialized() {
            return Ok(f(state.mixer.as_mut())?);
        }
        let guid = Self::mixer_guid(state.output_device.as_ref());
        state.mixer.open_speaker(&guid)?;
        let result = f(state.mixer.as_mut());
        let _ = state.mixer.close_speaker();
        Ok(result?)
    }

    fn probe_microphone<T>(
        &self,
        f: impl FnOnce(&mut dyn MixerManager) -> std::result::Result<T, super::error::MixerError>,
    ) -> Result<T> {
        let mut guard = self.shared.lock();
        let state = &mut *guard;
        if state.mixer.microphone_is_initialized() {
            return Ok(f(state.mixer.as_mut())?);
        }
        let guid = Self::mixer_guid(state.input_device.as_ref());
        state.mixer.open_microphone(&guid)?;
        let result = f(state.mixer.as_mut());
        let _ = state.mixer.close_microphone();
        Ok(result?)
    }

    /// Runs `f` against an open speaker control.
    fn with_speaker<T>(
        &self,
        f: impl FnOnce(&mut dyn MixerManager) -> std::result::Result<T, super::error::MixerError>,
    ) -> Result<T> {
        let mut state = self.shared.lock();
        if !state.mixer.speaker_is_initialized() {
            return Err(AudioDeviceError::configuration("speaker not initialized"));
        }
        Ok(f(state.mixer.as_mut())?)
    }

    fn with_microphone<T>(
        &self,
        f: impl FnOnce(&mut dyn MixerManager) -> std::result::Result<T, super::error::MixerError>,
    ) -> Result<T> {
        let mut state = self.shared.lock();
        if !state.mixer.microphone_is_initialized() {
            return Err(AudioDeviceError::configuration("microphone not initialized"));
        }
        Ok(f(state.mixer.as_mut())?)
    }
}

impl<A: AlsaApi> AudioDeviceGeneric for AudioDeviceLinuxAlsa<A> {
    fn active_audio_layer(&self) -> AudioLayer {
        AudioLayer::LinuxAlsa
    }

    fn init(&self) -> Result<()> {
        let mut state = self.shared.lock();
        if !state.initialized {
            state.initialized = true;
            log::info!("ALSA audio device initialized ({})", self.shared.config.alsa_library);
        }
        Ok(())
    }

    fn terminate(&self) -> Result<()> {
        if let Err(e) = self.stop_recording() {
            log::warn!("Stopping recording during terminate: {}", e);
        }
        if let Err(e) = self.stop_playout() {
            log::warn!("Stopping playout during terminate: {}", e);
        }

        let mut state = self.shared.lock();
        if let Err(e) = state.mixer.close() {
            log::warn!("Failed to close mixer: {}", e);
        }
        if state.initialized {
            state.initialized = false;
            log::info!("ALSA audio device terminated");
        }
        Ok(())
    }

    fn initialized(&self) -> bool {
        self.shared.lock().initialized
    }

    fn playout_devices(&self) -> Result<u16> {
        let devices = self.enumerate(StreamDirection::Playback)?;
        Ok(u16::try_from(devices.len()).unwrap_or(u16::MAX))
    }

    fn recording_devices(&self) -> Result<u16> {
        let devices = self.enumerate(StreamDirection::Capture)?;
        Ok(u16::try_from(devices.len()).unwrap_or(u16::MAX))
    }

    fn playout_device_name(&self, index: u16) -> Result<DeviceName> {
        self.device_name(StreamDirection::Playback, index)
    }

    fn recording_device_name(&self, index: u16) -> Result<DeviceName> {
        self.device_name(StreamDirection::Capture, index)
    }

    fn set_playout_device(&self, index: u16) -> Result<()> {
        self.set_device(StreamDirection::Playback, index)
    }

    fn set_recording_device(&self, index: u16) -> Result<()> {
        self.set_device(StreamDirection::Capture, index)
    }

    fn playout_is_available(&self) -> Result<bool> {
        self.is_available(StreamDirection::Playback, None)
    }

    fn init_playout(&self) -> Result<()> {
        self.init_stream(StreamDirection::Playback)
    }

    fn playout_is_initialized(&self) -> bool {
        self.shared.lock().playout.is_initialized()
    }

    fn recording_is_available(&self) -> Result<bool> {
        self.is_available(StreamDirection::Capture, None)
    }

    fn init_recording(&self) -> Result<()> {
        self.init_stream(StreamDirection::Capture)
    }

    fn recording_is_initialized(&self) -> bool {
        self.shared.lock().record.is_initialized()
    }

    fn start_playout(&self) -> Result<()> {
        self.start_stream(StreamDirection::Playback)
    }

    fn stop_playout(&self) -> Result<()> {
        self.stop_stream(StreamDirection::Playback)
    }

    fn playing(&self) -> bool {
        self.shared.lock().playout.state == StreamState::Started
    }

    fn start_recording(&self) -> Result<()> {
        self.start_stream(StreamDirection::Capture)
    }

    fn stop_recording(&self) -> Result<()> {
        self.stop_stream(StreamDirection::Capture)
    }

    fn recording(&self) -> bool {
        self.shared.lock().record.state == StreamState::Started
    }

    fn init_speaker(&self) -> Result<()> {
        let mut guard = self.shared.lock();
        let state = &mut *guard;
        if state.playout.state == StreamState::Started {
            return Err(AudioDeviceError::configuration(
                "cannot init speaker while playing",
            ));
        }
        let Some(device) = state.output_device.as_ref() else {
            return Err(AudioDeviceError::configuration("no playout device selected"));
        };
        state.mixer.open_speaker(&device.guid)?;
        Ok(())
    }

    fn speaker_is_initialized(&self) -> bool {
        self.shared.lock().mixer.speaker_is_initialized()
    }

    fn init_microphone(&self) -> Result<()> {
        let mut guard = self.shared.lock();
        let state = &mut *guard;
        if state.record.state == StreamState::Started {
            return Err(AudioDeviceError::configuration(
                "cannot init microphone while recording",
            ));
        }
        let Some(device) = state.input_device.as_ref() else {
            return Err(AudioDeviceError::configuration("no recording device selected"));
        };
        state.mixer.open_microphone(&device.guid)?;
        Ok(())
    }

    fn microphone_is_initialized(&self) -> bool {
        self.shared.lock().mixer.microphone_is_initialized()
    }

    fn speaker_volume_is_available(&self) -> Result<bool> {
        self.probe_speaker(|m| m.speaker_volume_is_available())
    }

    fn set_speaker_volume(&self, volume: u32) -> Result<()> {
        self.with_speaker(|m| m.set_speaker_volume(volume))
    }

    fn speaker_volume(&self) -> Result<u32> {
        self.with_speaker(|m| m.speaker_volume())
    }

    fn max_speaker_volume(&self) -> Result<u32> {
        self.with_speaker(|m| m.max_speaker_volume())
    }

    fn min_speaker_volume(&self) -> Result<u32> {
        self.with_speaker(|m| m.min_speaker_volume())
    }

    fn microphone_volume_is_available(&self) -> Result<bool> {
        self.probe_microphone(|m| m.microphone_volume_is_available())
    }

    fn set_microphone_volume(&self, volume: u32) -> Result<()> {
        self.with_microphone(|m| m.set_microphone_volume(volume))
    }

    fn microphone_volume(&self) -> Result<u32> {
        self.with_microphone(|m| m.microphone_volume())
    }

    fn max_microphone_volume(&self) -> Result<u32> {
        self.with_microphone(|m| m.max_microphone_volume())
    }

    fn min_microphone_volume(&self) -> Result<u32> {
        self.with_microphone(|m| m.min_microphone_volume())
    }

    fn speaker_mute_is_available(&self) -> Result<bool> {
        self.probe_speaker(|m| m.speaker_mute_is_available())
    }

    fn set_speaker_mute(&self, enable: bool) -> Result<()> {
        self.with_speaker(|m| m.set_speaker_mute(enable))
    }

    fn speaker_mute(&self) -> Result<bool> {
        self.with_speaker(|m| m.speaker_mute())
    }

    fn microphone_mute_is_available(&self) -> Result<bool> {
        self.probe_microphone(|m| m.microphone_mute_is_available())
    }

    fn set_microphone_mute(&self, enable: bool) -> Result<()> {
        self.with_microphone(|m| m.set_microphone_mute(enable))
    }

    fn microphone_mute(&self) -> Result<bool> {
        self.with_microphone(|m| m.microphone_mute())
    }

    fn stereo_playout_is_available(&self) -> Result<bool> {
        self.is_available(StreamDirection::Playback, Some(2))
    }

    fn set_stereo_playout(&self, enable: bool) -> Result<()> {
        self.set_stereo(StreamDirection::Playback, enable)
    }

    fn stereo_playout(&self) -> bool {
        self.shared.lock().play_channels == 2
    }

    fn stereo_recording_is_available(&self) -> Result<bool> {
        self.is_available(StreamDirection::Capture, Some(2))
    }

    fn set_stereo_recording(&self, enable: bool) -> Result<()> {
        self.set_stereo(StreamDirection::Capture, enable)
    }

    fn stereo_recording(&self) -> bool {
        self.shared.lock().rec_channels == 2
    }

    fn playout_delay(&self) -> Result<u16> {
        Ok(self.delay_ms(StreamDirection::Playback))
    }

    fn recording_delay(&self) -> Result<u16> {
        Ok(self.delay_ms(StreamDirection::Capture))
    }

    fn attach_audio_buffer(&self, mut buffer: Box<dyn AudioDeviceBuffer>) {
        let mut state = self.shared.lock();
        buffer.set_recording_format(self.shared.config.recording.sample_rate, state.rec_channels);
        buffer.set_playout_format(self.shared.config.playout.sample_rate, state.play_channels);
        state.audio_buffer = Some(buffer);
    }
}

impl<A: AlsaApi> Drop for AudioDeviceLinuxAlsa<A> {
    fn drop(&mut self) {
        if let Err(e) = self.terminate() {
            log::warn!("Terminate on drop failed: {}", e);
        }
    }
}
