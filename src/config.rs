use serde::Serialize;

/// Parameters for one stream direction.
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    /// Requested sample rate in Hz
    pub sample_rate: u32,
    /// Requested channel count (1 or 2)
    pub channels: u8,
    /// Requested hardware latency in microseconds, passed to `snd_pcm_set_params`
    pub latency_us: u32,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct AudioDeviceConfig {
    // ALSA 库配置
    pub alsa_library: &'static str,
    /// Upper bound for a single `snd_pcm_wait` call in the data-path loops
    pub wait_timeout_ms: u32,

    // 录音/播放流配置
    pub recording: StreamConfig,
    pub playout: StreamConfig,
}

impl AudioDeviceConfig {
    /// 从编译时设置的环境变量创建配置
    /// 所有参数都在编译时从 config.toml 中读取
    pub fn new() -> Result<Self, &'static str> {
        let config = Self {
            alsa_library: env!("ALSA_LIBRARY"),
            wait_timeout_ms: env!("ALSA_WAIT_TIMEOUT_MS").parse()
                .map_err(|_| "Failed to parse ALSA_WAIT_TIMEOUT_MS")?,

            recording: StreamConfig {
                sample_rate: env!("RECORDING_SAMPLE_RATE").parse()
                    .map_err(|_| "Failed to parse RECORDING_SAMPLE_RATE")?,
                channels: env!("RECORDING_CHANNELS").parse()
                    .map_err(|_| "Failed to parse RECORDING_CHANNELS")?,
                latency_us: env!("RECORDING_LATENCY_US").parse()
                    .map_err(|_| "Failed to parse RECORDING_LATENCY_US")?,
            },

            playout: StreamConfig {
                sample_rate: env!("PLAYOUT_SAMPLE_RATE").parse()
                    .map_err(|_| "Failed to parse PLAYOUT_SAMPLE_RATE")?,
                channels: env!("PLAYOUT_CHANNELS").parse()
                    .map_err(|_| "Failed to parse PLAYOUT_CHANNELS")?,
                latency_us: env!("PLAYOUT_LATENCY_US").parse()
                    .map_err(|_| "Failed to parse PLAYOUT_LATENCY_US")?,
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values ALSA would never accept before they reach the device.
    pub fn validate(&self) -> Result<(), &'static str> {
        for stream in [&self.recording, &self.playout] {
            if stream.sample_rate == 0 {
                return Err("sample_rate must be non-zero");
            }
            if !(1..=2).contains(&stream.channels) {
                return Err("channels must be 1 or 2");
            }
        }
        if self.wait_timeout_ms == 0 {
            return Err("wait_timeout_ms must be non-zero");
        }
        Ok(())
    }
}

impl Default for AudioDeviceConfig {
    fn default() -> Self {
        let stream = StreamConfig {
            sample_rate: 48000,
            channels: 2,
            latency_us: 40_000,
        };
        Self {
            alsa_library: "libasound.so.2",
            wait_timeout_ms: 100,
            recording: stream,
            playout: stream,
        }
    }
}
