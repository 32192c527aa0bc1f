#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use alsa_adm::audio::{
    AlsaApi, AudioDeviceBuffer, AudioDeviceLinuxAlsa, DelayReport, DeviceHint, MixerError,
    MixerManager, PcmConfig, PcmGeometry, PcmState, StreamDirection,
};
use alsa_adm::audio::alsa_api::NativeResult;
use alsa_adm::config::{AudioDeviceConfig, StreamConfig};

pub const EBADFD: i32 = libc::EBADFD;

/// Scriptable stand-in for libasound.
#[derive(Clone, Default)]
pub struct FakeAlsa {
    pub inner: Arc<FakeInner>,
}

pub struct FakeInner {
    pub hints: Mutex<Vec<DeviceHint>>,
    pub hint_error: Mutex<Option<i32>>,
    pub period_frames: AtomicUsize,
    pub delay_frames: AtomicI64,
    /// `set_params` fails with -EINVAL for this channel count
    pub rejected_channels: AtomicU32,
    pub open_error: Mutex<Option<i32>>,

    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    pub prepares: AtomicUsize,
    pub starts: AtomicUsize,
    pub resumes: AtomicUsize,
    pub drops: AtomicUsize,
    pub reads: AtomicUsize,
    pub writes: AtomicUsize,
    pub reads_in_flight: AtomicUsize,

    pub read_errors: Mutex<VecDeque<i32>>,
    pub write_errors: Mutex<VecDeque<i32>>,
    pub pcm_state: Mutex<PcmState>,
    pub resume_error: Mutex<Option<i32>>,
    pub prepare_error: Mutex<Option<i32>>,
    pub start_error: Mutex<Option<i32>>,
    pub last_params: Mutex<Option<PcmConfig>>,

    /// While false, `readi` parks the caller.
    gate_open: Mutex<bool>,
    gate: Condvar,

    pub played: Mutex<Vec<i16>>,
}

impl Default for FakeInner {
    fn default() -> Self {
        Self {
            hints: Mutex::new(default_hints()),
            hint_error: Mutex::new(None),
            period_frames: AtomicUsize::new(480),
            delay_frames: AtomicI64::new(960),
            rejected_channels: AtomicU32::new(0),
            open_error: Mutex::new(None),
            opens: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            prepares: AtomicUsize::new(0),
            starts: AtomicUsize::new(0),
            resumes: AtomicUsize::new(0),
            drops: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            reads_in_flight: AtomicUsize::new(0),
            read_errors: Mutex::new(VecDeque::new()),
            write_errors: Mutex::new(VecDeque::new()),
            pcm_state: Mutex::new(PcmState::Running),
            resume_error: Mutex::new(None),
            prepare_error: Mutex::new(None),
            start_error: Mutex::new(None),
            last_params: Mutex::new(None),
            gate_open: Mutex::new(true),
            gate: Condvar::new(),
            played: Mutex::new(Vec::new()),
        }
    }
}

pub fn default_hints() -> Vec<DeviceHint> {
    vec![
        hint("null", Some("Discard all samples"), None),
        hint("default", Some("Default ALSA Output"), None),
        hint("hw:CARD=PCH,DEV=0", Some("HDA Intel PCH\nALC892 Analog"), None),
        hint("dmix:CARD=PCH,DEV=0", Some("HDA Intel PCH\nDirect sample mixing"), Some("Output")),
        hint("dsnoop:CARD=PCH,DEV=0", Some("HDA Intel PCH\nDirect sample snooping"), Some("Input")),
        hint("hw:CARD=USB,DEV=0", Some("USB Mic"), Some("Input")),
    ]
}

pub fn hint(name: &str, desc: Option<&str>, ioid: Option<&str>) -> DeviceHint {
    DeviceHint {
        name: Some(name.to_string()),
        desc: desc.map(str::to_string),
        ioid: ioid.map(str::to_string),
    }
}

impl FakeAlsa {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    /// Parks every `readi` until the returned guard is dropped or opened.
    pub fn close_gate(&self) -> Gate {
        *self.inner.gate_open.lock().unwrap() = false;
        Gate { alsa: self.clone() }
    }

    fn open_gate(&self) {
        *self.inner.gate_open.lock().unwrap() = true;
        self.inner.gate.notify_all();
    }

    pub fn push_read_error(&self, code: i32) {
        self.inner.read_errors.lock().unwrap().push_back(code);
    }

    pub fn push_write_error(&self, code: i32) {
        self.inner.write_errors.lock().unwrap().push_back(code);
    }

    pub fn set_state(&self, state: PcmState) {
        *self.inner.pcm_state.lock().unwrap() = state;
    }
}

pub struct FakePcm {
    pub device: String,
    pub direction: StreamDirection,
    channels: AtomicU32,
    closed: AtomicBool,
}

impl FakePcm {
    fn check(&self) -> NativeResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(-EBADFD)
        } else {
            Ok(())
        }
    }
}

impl AlsaApi for FakeAlsa {
    type Pcm = FakePcm;

    fn device_hints(&self) -> NativeResult<Vec<DeviceHint>> {
        if let Some(code) = *self.inner.hint_error.lock().unwrap() {
            return Err(code);
        }
        Ok(self.inner.hints.lock().unwrap().clone())
    }

    fn open(&self, device: &str, direction: StreamDirection) -> NativeResult<FakePcm> {
        if let Some(code) = *self.inner.open_error.lock().unwrap() {
            return Err(code);
        }
        self.inner.opens.fetch_add(1, Ordering::SeqCst);
        Ok(FakePcm {
            device: device.to_string(),
            direction,
            channels: AtomicU32::new(0),
            closed: AtomicBool::new(false),
        })
    }

    fn close(&self, pcm: &FakePcm) -> NativeResult<()> {
        if pcm.closed.swap(true, Ordering::SeqCst) {
            return Err(-EBADFD);
        }
        self.inner.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn set_params(&self, pcm: &FakePcm, config: &PcmConfig) -> NativeResult<()> {
        pcm.check()?;
        if config.channels == self.inner.rejected_channels.load(Ordering::SeqCst) {
            return Err(-libc::EINVAL);
        }
        pcm.channels.store(config.channels, Ordering::SeqCst);
        *self.inner.last_params.lock().unwrap() = Some(*config);
        Ok(())
    }

    fn get_params(&self, pcm: &FakePcm) -> NativeResult<PcmGeometry> {
        pcm.check()?;
        let period = self.inner.period_frames.load(Ordering::SeqCst);
        Ok(PcmGeometry {
            buffer_frames: period * 4,
            period_frames: period,
        })
    }

    fn prepare(&self, pcm: &FakePcm) -> NativeResult<()> {
        pcm.check()?;
        self.inner.prepares.fetch_add(1, Ordering::SeqCst);
        match *self.inner.prepare_error.lock().unwrap() {
            Some(code) => Err(code),
            None => Ok(()),
        }
    }

    fn start(&self, pcm: &FakePcm) -> NativeResult<()> {
        pcm.check()?;
        self.inner.starts.fetch_add(1, Ordering::SeqCst);
        match *self.inner.start_error.lock().unwrap() {
            Some(code) => Err(code),
            None => Ok(()),
        }
    }

    fn drop_frames(&self, pcm: &FakePcm) -> NativeResult<()> {
        pcm.check()?;
        self.inner.drops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn resume(&self, pcm: &FakePcm) -> NativeResult<()> {
        pcm.check()?;
        self.inner.resumes.fetch_add(1, Ordering::SeqCst);
        match *self.inner.resume_error.lock().unwrap() {
            Some(code) => Err(code),
            None => Ok(()),
        }
    }

    fn wait(&self, pcm: &FakePcm, _timeout_ms: u32) -> NativeResult<bool> {
        pcm.check()?;
        // Paces the loops so tests don't spin a core.
        thread::sleep(Duration::from_millis(1));
        Ok(true)
    }

    fn avail_update(&self, pcm: &FakePcm) -> NativeResult<usize> {
        pcm.check()?;
        Ok(self.inner.period_frames.load(Ordering::SeqCst))
    }

    fn readi(&self, pcm: &FakePcm, buf: &mut [i16], frames: usize) -> NativeResult<usize> {
        pcm.check()?;
        self.inner.reads_in_flight.fetch_add(1, Ordering::SeqCst);
        {
            let mut open = self.inner.gate_open.lock().unwrap();
            while !*open {
                open = self.inner.gate.wait(open).unwrap();
            }
        }
        self.inner.reads_in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(code) = self.inner.read_errors.lock().unwrap().pop_front() {
            return Err(code);
        }
        let channels = pcm.channels.load(Ordering::SeqCst) as usize;
        let n = self.inner.reads.fetch_add(1, Ordering::SeqCst) as i16;
        buf[..frames * channels].fill(n);
        Ok(frames)
    }

    fn writei(&self, pcm: &FakePcm, buf: &[i16], frames: usize) -> NativeResult<usize> {
        pcm.check()?;
        if let Some(code) = self.inner.write_errors.lock().unwrap().pop_front() {
            return Err(code);
        }
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        let channels = pcm.channels.load(Ordering::SeqCst) as usize;
        let mut played = self.inner.played.lock().unwrap();
        if played.len() < 48_000 {
            played.extend_from_slice(&buf[..frames * channels]);
        }
        Ok(frames)
    }

    fn delay(&self, pcm: &FakePcm) -> NativeResult<i64> {
        pcm.check()?;
        Ok(self.inner.delay_frames.load(Ordering::SeqCst))
    }

    fn state(&self, pcm: &FakePcm) -> PcmState {
        if pcm.closed.load(Ordering::SeqCst) {
            return PcmState::Disconnected;
        }
        *self.inner.pcm_state.lock().unwrap()
    }

    fn strerror(&self, code: i32) -> String {
        format!("fake error {}", code)
    }
}

/// Closed read gate. Dropping it reopens the gate, so a failed assertion cannot leave a
/// loop thread parked while the device is torn down.
#[must_use]
pub struct Gate {
    alsa: FakeAlsa,
}

impl Gate {
    pub fn open(self) {}
}

impl Drop for Gate {
    fn drop(&mut self) {
        self.alsa.open_gate();
    }
}

/// What the device handed to a [`TestBuffer`].
#[derive(Default)]
pub struct BufferLog {
    pub recording_format: Mutex<Option<(u32, u8)>>,
    pub playout_format: Mutex<Option<(u32, u8)>>,
    pub delivered: AtomicUsize,
    pub last_frames: AtomicUsize,
    pub last_samples: Mutex<Vec<i16>>,
    pub last_delays: Mutex<DelayReport>,
    pub typing_seen: AtomicBool,
    pub requests: AtomicUsize,
    /// Frames `request_playout_data` provides per call
    pub playout_frames: AtomicUsize,
}

pub struct TestBuffer {
    pub log: Arc<BufferLog>,
}

impl TestBuffer {
    pub fn new() -> (Box<Self>, Arc<BufferLog>) {
        let log = Arc::new(BufferLog::default());
        (Box::new(Self { log: log.clone() }), log)
    }
}

impl AudioDeviceBuffer for TestBuffer {
    fn set_recording_format(&mut self, sample_rate: u32, channels: u8) {
        *self.log.recording_format.lock().unwrap() = Some((sample_rate, channels));
    }

    fn set_playout_format(&mut self, sample_rate: u32, channels: u8) {
        *self.log.playout_format.lock().unwrap() = Some((sample_rate, channels));
    }

    fn deliver_recorded_data(&mut self, samples: &[i16], frames: usize, delays: DelayReport) {
        self.log.delivered.fetch_add(1, Ordering::SeqCst);
        self.log.last_frames.store(frames, Ordering::SeqCst);
        *self.log.last_samples.lock().unwrap() = samples.to_vec();
        *self.log.last_delays.lock().unwrap() = delays;
    }

    fn request_playout_data(&mut self, samples: &mut [i16], frames: usize) -> usize {
        self.log.requests.fetch_add(1, Ordering::SeqCst);
        let provide = self.log.playout_frames.load(Ordering::SeqCst).min(frames);
        let channels = samples.len() / frames.max(1);
        samples[..provide * channels].fill(1000);
        provide
    }

    fn set_typing_status(&mut self, typing: bool) {
        if typing {
            self.log.typing_seen.store(true, Ordering::SeqCst);
        }
    }
}

/// Mixer that records what it was asked to do.
#[derive(Default)]
pub struct MixerLog {
    pub speaker_opens: AtomicUsize,
    pub microphone_opens: AtomicUsize,
    pub closes: AtomicUsize,
    pub last_device: Mutex<Option<String>>,
}

pub struct FakeMixer {
    pub log: Arc<MixerLog>,
    speaker: bool,
    microphone: bool,
    speaker_volume: u32,
    microphone_volume: u32,
    speaker_mute: bool,
    microphone_mute: bool,
}

impl FakeMixer {
    pub fn new() -> (Box<Self>, Arc<MixerLog>) {
        let log = Arc::new(MixerLog::default());
        let mixer = Self {
            log: log.clone(),
            speaker: false,
            microphone: false,
            speaker_volume: 100,
            microphone_volume: 50,
            speaker_mute: false,
            microphone_mute: false,
        };
        (Box::new(mixer), log)
    }

    fn speaker(&self) -> Result<(), MixerError> {
        if self.speaker { Ok(()) } else { Err(MixerError::NotOpen) }
    }

    fn microphone(&self) -> Result<(), MixerError> {
        if self.microphone { Ok(()) } else { Err(MixerError::NotOpen) }
    }
}

impl MixerManager for FakeMixer {
    fn open_speaker(&mut self, device_id: &str) -> Result<(), MixerError> {
        self.log.speaker_opens.fetch_add(1, Ordering::SeqCst);
        *self.log.last_device.lock().unwrap() = Some(device_id.to_string());
        self.speaker = true;
        Ok(())
    }

    fn open_microphone(&mut self, device_id: &str) -> Result<(), MixerError> {
        self.log.microphone_opens.fetch_add(1, Ordering::SeqCst);
        *self.log.last_device.lock().unwrap() = Some(device_id.to_string());
        self.microphone = true;
        Ok(())
    }

    fn close_speaker(&mut self) -> Result<(), MixerError> {
        if self.speaker {
            self.log.closes.fetch_add(1, Ordering::SeqCst);
        }
        self.speaker = false;
        Ok(())
    }

    fn close_microphone(&mut self) -> Result<(), MixerError> {
        if self.microphone {
            self.log.closes.fetch_add(1, Ordering::SeqCst);
        }
        self.microphone = false;
        Ok(())
    }

    fn speaker_is_initialized(&self) -> bool {
        self.speaker
    }

    fn microphone_is_initialized(&self) -> bool {
        self.microphone
    }

    fn speaker_volume_is_available(&mut self) -> Result<bool, MixerError> {
        self.speaker().map(|_| true)
    }

    fn set_speaker_volume(&mut self, volume: u32) -> Result<(), MixerError> {
        self.speaker()?;
        self.speaker_volume = volume;
        Ok(())
    }

    fn speaker_volume(&self) -> Result<u32, MixerError> {
        self.speaker().map(|_| self.speaker_volume)
    }

    fn max_speaker_volume(&self) -> Result<u32, MixerError> {
        self.speaker().map(|_| 255)
    }

    fn min_speaker_volume(&self) -> Result<u32, MixerError> {
        self.speaker().map(|_| 0)
    }

    fn microphone_volume_is_available(&mut self) -> Result<bool, MixerError> {
        self.microphone().map(|_| true)
    }

    fn set_microphone_volume(&mut self, volume: u32) -> Result<(), MixerError> {
        self.microphone()?;
        self.microphone_volume = volume;
        Ok(())
    }

    fn microphone_volume(&self) -> Result<u32, MixerError> {
        self.microphone().map(|_| self.microphone_volume)
    }

    fn max_microphone_volume(&self) -> Result<u32, MixerError> {
        self.microphone().map(|_| 100)
    }

    fn min_microphone_volume(&self) -> Result<u32, MixerError> {
        self.microphone().map(|_| 0)
    }

    fn speaker_mute_is_available(&mut self) -> Result<bool, MixerError> {
        self.speaker().map(|_| true)
    }

    fn set_speaker_mute(&mut self, enable: bool) -> Result<(), MixerError> {
        self.speaker()?;
        self.speaker_mute = enable;
        Ok(())
    }

    fn speaker_mute(&self) -> Result<bool, MixerError> {
        self.speaker().map(|_| self.speaker_mute)
    }

    fn microphone_mute_is_available(&mut self) -> Result<bool, MixerError> {
        Err(MixerError::Unsupported("microphone mute"))
    }

    fn set_microphone_mute(&mut self, enable: bool) -> Result<(), MixerError> {
        self.microphone()?;
        self.microphone_mute = enable;
        Ok(())
    }

    fn microphone_mute(&self) -> Result<bool, MixerError> {
        self.microphone().map(|_| self.microphone_mute)
    }
}

pub fn test_config() -> AudioDeviceConfig {
    let stream = StreamConfig {
        sample_rate: 48000,
        channels: 2,
        latency_us: 40_000,
    };
    AudioDeviceConfig {
        alsa_library: "libasound.so.2",
        wait_timeout_ms: 10,
        recording: stream,
        playout: stream,
    }
}

pub struct Fixture {
    pub alsa: FakeAlsa,
    pub mixer: Arc<MixerLog>,
    pub device: AudioDeviceLinuxAlsa<FakeAlsa>,
}

pub fn fixture() -> Fixture {
    let _ = env_logger::builder().is_test(true).try_init();
    let alsa = FakeAlsa::new();
    let (mixer, mixer_log) = FakeMixer::new();
    let device = AudioDeviceLinuxAlsa::new(alsa.clone(), test_config(), mixer);
    Fixture {
        alsa,
        mixer: mixer_log,
        device,
    }
}

/// Polls `cond` until it holds or two seconds pass.
pub fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    cond()
}
