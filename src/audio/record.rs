//! Record thread: ALSA capture -> `AudioDeviceBuffer::deliver_recorded_data`.

use std::sync::Arc;

use super::alsa_api::{AlsaApi, NativeResult, StreamDirection};
use super::alsa_device::{Shared, StreamState};
use super::device_buffer::{DelayReport, frames_to_ms};
use super::recovery::recover;

/// Runs until the stream leaves `Started` or fails fatally; hands the frame buffer back.
pub(crate) fn run<A: AlsaApi>(
    shared: Arc<Shared<A>>,
    pcm: Arc<A::Pcm>,
    mut buffer: Vec<i16>,
    period_frames: usize,
    channels: usize,
) -> Vec<i16> {
    let api = &shared.api;
    let timeout_ms = shared.config.wait_timeout_ms;
    let record_rate = shared.config.recording.sample_rate;
    let playout_rate = shared.config.playout.sample_rate;
    let mut filled = 0;

    log::info!(
        "Record thread started: period={} frames, channels={}",
        period_frames,
        channels
    );

    loop {
        if shared.lock().record.state != StreamState::Started {
            break;
        }

        match read_step(
            api,
            &pcm,
            &mut buffer,
            &mut filled,
            period_frames,
            channels,
            timeout_ms,
        ) {
            Ok(None) => {}
            Ok(Some(delay_frames)) => {
                let mut guard = shared.lock();
                let state = &mut *guard;
                if state.record.state != StreamState::Started {
                    break;
                }
                state.record.delay_frames = delay_frames;

                let typing = state
                    .key_probe
                    .as_mut()
                    .is_some_and(|probe| probe.key_pressed());
                let delays = DelayReport {
                    playout_ms: frames_to_ms(state.playout.delay_frames, playout_rate),
                    recording_ms: frames_to_ms(delay_frames, record_rate),
                };
                if let Some(sink) = state.audio_buffer.as_mut() {
                    sink.set_typing_status(typing);
                    sink.deliver_recorded_data(&buffer, period_frames, delays);
                }
            }
            Err(code) => {
                if let Err(err) = recover(api, &*pcm, code, StreamDirection::Capture) {
                    log::error!("Record thread giving up: {}", err);
                    let mut state = shared.lock();
                    state.record.fatal = Some(err);
                    state.record.state = StreamState::Stopped;
                    break;
                }
            }
        }
    }

    log::info!("Record thread exiting");
    buffer
}

/// One wait/read pass. Returns the hardware delay once a full period has been read.
fn read_step<A: AlsaApi>(
    api: &A,
    pcm: &A::Pcm,
    buffer: &mut [i16],
    filled: &mut usize,
    period_frames: usize,
    channels: usize,
    timeout_ms: u32,
) -> NativeResult<Option<i64>> {
    if !api.wait(pcm, timeout_ms)? {
        return Ok(None);
    }
    let avail = api.avail_update(pcm)?;
    if avail == 0 {
        return Ok(None);
    }

    let frames = (period_frames - *filled).min(avail);
    let read = api.readi(pcm, &mut buffer[*filled * channels..], frames)?;
    *filled += read;
    if *filled < period_frames {
        return Ok(None);
    }

    *filled = 0;
    api.delay(pcm).map(Some)
}
