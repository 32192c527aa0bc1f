use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alsa_adm::audio::{
    AlsaSymbolTable, AudioDeviceGeneric, AudioDeviceLinuxAlsa, AudioLayer, ChannelAudioBuffer,
    DeviceName,
};
use alsa_adm::config::AudioDeviceConfig;
use anyhow::Context;
use clap::Parser;
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(
    name = "adm-probe",
    version,
    about = "List ALSA capture/playout devices and optionally run a loopback"
)]
struct Cli {
    /// Print the device list as JSON
    #[arg(long)]
    json: bool,

    /// Record from the selected device and play it back for SECS seconds
    #[arg(long, value_name = "SECS")]
    loopback: Option<u64>,

    /// Recording device index (0 = default)
    #[arg(long, default_value_t = 0)]
    recording_device: u16,

    /// Playout device index (0 = default)
    #[arg(long, default_value_t = 0)]
    playout_device: u16,

    /// Print the build-time configuration
    #[arg(long)]
    show_config: bool,
}

#[derive(Serialize)]
struct DeviceReport {
    layer: AudioLayer,
    playout: Vec<DeviceName>,
    recording: Vec<DeviceName>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    env_logger::init();

    let cli = Cli::parse();

    // 加载配置
    let config = AudioDeviceConfig::new().unwrap_or_default();
    if cli.show_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
    }

    // libasound 不存在时不是错误, 只是没有可用设备
    let mut table = AlsaSymbolTable::new();
    if !table.load() {
        log::warn!(
            "{} is not available, no ALSA devices to report",
            config.alsa_library
        );
        return Ok(());
    }

    let device = Arc::new(AudioDeviceLinuxAlsa::from_table(Arc::new(table), config)?);
    device.init()?;

    let report = DeviceReport {
        layer: device.active_audio_layer(),
        playout: (0..device.playout_devices()?)
            .map(|i| device.playout_device_name(i))
            .collect::<Result<_, _>>()?,
        recording: (0..device.recording_devices()?)
            .map(|i| device.recording_device_name(i))
            .collect::<Result<_, _>>()?,
    };
    print_report(&report, cli.json)?;

    if let Some(secs) = cli.loopback {
        run_loopback(Arc::clone(&device), &cli, secs).await?;
    }

    device.terminate()?;
    Ok(())
}

fn print_report(report: &DeviceReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    println!("Playout devices:");
    for (i, d) in report.playout.iter().enumerate() {
        println!("  [{}] {} ({})", i, d.name, d.guid);
    }
    println!("Recording devices:");
    for (i, d) in report.recording.iter().enumerate() {
        println!("  [{}] {} ({})", i, d.name, d.guid);
    }
    Ok(())
}

async fn run_loopback(
    device: Arc<AudioDeviceLinuxAlsa>,
    cli: &Cli,
    secs: u64,
) -> anyhow::Result<()> {
    let (buffer, mut handle) = ChannelAudioBuffer::new(32);
    device.attach_audio_buffer(Box::new(buffer));

    device
        .set_recording_device(cli.recording_device)
        .context("Failed to select recording device")?;
    device
        .set_playout_device(cli.playout_device)
        .context("Failed to select playout device")?;
    device.init_recording().context("Failed to init recording")?;
    device.init_playout().context("Failed to init playout")?;

    let playout_channels: u8 = if device.stereo_playout() { 2 } else { 1 };
    device.start_playout()?;
    device.start_recording()?;
    log::info!("Loopback running for {}s", secs);

    let periods = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&periods);
    let forward = tokio::spawn(async move {
        while let Some(frame) = handle.recorded.recv().await {
            counter.fetch_add(1, Ordering::Relaxed);
            let samples = remix(&frame.samples, frame.channels, playout_channels);
            if handle.playout.send(samples).await.is_err() {
                break;
            }
        }
    });

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
        _ = tokio::signal::ctrl_c() => {
            log::info!("Interrupted, stopping loopback");
        }
    }

    println!(
        "Delay: playout {} ms, recording {} ms",
        device.playout_delay()?,
        device.recording_delay()?
    );

    // stop 会 join 音频线程, 不能在 async 上下文里阻塞
    let stopper = Arc::clone(&device);
    tokio::task::spawn_blocking(move || {
        let recording = stopper.stop_recording();
        let playout = stopper.stop_playout();
        recording.and(playout)
    })
    .await??;
    forward.abort();

    println!(
        "Loopback finished: {} periods forwarded",
        periods.load(Ordering::Relaxed)
    );
    Ok(())
}

/// Converts interleaved samples between mono and stereo.
fn remix(samples: &[i16], from: u8, to: u8) -> Vec<i16> {
    match (from, to) {
        (1, 2) => samples.iter().flat_map(|&s| [s, s]).collect(),
        (2, 1) => samples
            .chunks_exact(2)
            .map(|lr| ((i32::from(lr[0]) + i32::from(lr[1])) / 2) as i16)
            .collect(),
        _ => samples.to_vec(),
    }
}
