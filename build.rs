use std::fs;
use std::path::Path;
use serde::Deserialize;

#[derive(Deserialize)]
struct Config {
    alsa: Alsa,
    recording: Stream,
    playout: Stream,
}

#[derive(Deserialize)]
struct Alsa {
    library: String,
    wait_timeout_ms: u32,
}

#[derive(Deserialize)]
struct Stream {
    sample_rate: u32,
    channels: u8,
    latency_us: u32,
}

// 在编译时读取 config.toml 并设置环境变量
fn main() {
    println!("cargo:rerun-if-changed=config.toml");

    let config_path = Path::new("config.toml");
    if !config_path.exists() {
        panic!("config.toml not found!");
    }

    let config_str = fs::read_to_string(config_path).expect("Failed to read config.toml");
    let config: Config = toml::from_str(&config_str).expect("Failed to parse config.toml");

    // ALSA 库配置
    println!("cargo:rustc-env=ALSA_LIBRARY={}", config.alsa.library);
    println!("cargo:rustc-env=ALSA_WAIT_TIMEOUT_MS={}", config.alsa.wait_timeout_ms);

    // 录音流配置
    println!("cargo:rustc-env=RECORDING_SAMPLE_RATE={}", config.recording.sample_rate);
    println!("cargo:rustc-env=RECORDING_CHANNELS={}", config.recording.channels);
    println!("cargo:rustc-env=RECORDING_LATENCY_US={}", config.recording.latency_us);

    // 播放流配置
    println!("cargo:rustc-env=PLAYOUT_SAMPLE_RATE={}", config.playout.sample_rate);
    println!("cargo:rustc-env=PLAYOUT_CHANNELS={}", config.playout.channels);
    println!("cargo:rustc-env=PLAYOUT_LATENCY_US={}", config.playout.latency_us);
}
