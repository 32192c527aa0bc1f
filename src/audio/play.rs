//! Playout thread: `AudioDeviceBuffer::request_playout_data` -> ALSA playback.

use std::sync::Arc;

use super::alsa_api::{AlsaApi, NativeResult, StreamDirection};
use super::alsa_device::{Shared, StreamState};
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
    // Start "fully written" so the first pass pulls a period.
    let mut written = period_frames;
    let mut delay_frames = 0;

    log::info!(
        "Playout thread started: period={} frames, channels={}",
        period_frames,
        channels
    );

    loop {
        {
            let mut guard = shared.lock();
            let state = &mut *guard;
            if state.playout.state != StreamState::Started {
                break;
            }
            state.playout.delay_frames = delay_frames;

            if written >= period_frames {
                let got = state
                    .audio_buffer
                    .as_mut()
                    .map_or(0, |source| source.request_playout_data(&mut buffer, period_frames))
                    .min(period_frames);
                if got < period_frames {
                    log::debug!("Playout underflow: {} of {} frames", got, period_frames);
                }
                // Silence for whatever the source could not provide
                buffer[got * channels..].fill(0);
                written = 0;
            }
        }

        match write_step(
            api,
            &pcm,
            &buffer,
            &mut written,
            period_frames,
            channels,
            timeout_ms,
        ) {
            Ok(Some(delay)) => delay_frames = delay,
            Ok(None) => {}
            Err(code) => {
                if let Err(err) = recover(api, &*pcm, code, StreamDirection::Playback) {
                    log::error!("Playout thread giving up: {}", err);
                    let mut state = shared.lock();
                    state.playout.fatal = Some(err);
                    state.playout.state = StreamState::Stopped;
                    break;
                }
            }
        }
    }

    log::info!("Playout thread exiting");
    buffer
}

/// One wait/write pass. Returns the hardware delay after a write.
fn write_step<A: AlsaApi>(
    api: &A,
    pcm: &A::Pcm,
    buffer: &[i16],
    written: &mut usize,
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

    let frames = (period_frames - *written).min(avail);
    let n = api.writei(pcm, &buffer[*written * channels..], frames)?;
    *written += n;
    api.delay(pcm).map(Some)
}
