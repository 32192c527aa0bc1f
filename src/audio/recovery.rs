//! Xrun and suspend recovery for a PCM whose read or write just failed.

use super::alsa_api::{AlsaApi, PcmState, StreamDirection};
use super::error::{AudioDeviceError, Result};

/// Brings `pcm` back to a runnable state after the native error `code`.
///
/// One attempt only: on success the loop simply continues, on failure the returned
/// error is fatal and the stream must stop.
pub fn recover<A: AlsaApi>(
    api: &A,
    pcm: &A::Pcm,
    code: i32,
    direction: StreamDirection,
) -> Result<()> {
    let state = api.state(pcm);
    log::warn!(
        "ALSA {} error: {} ({}), state {:?}, recovering...",
        direction.name(),
        api.strerror(code),
        code,
        state
    );

    if state == PcmState::Disconnected {
        return Err(fatal(api, code, "device disconnected"));
    }

    if state == PcmState::Suspended || code == -libc::ESTRPIPE {
        return api
            .resume(pcm)
            .map_err(|e| fatal(api, e, "resume after suspend failed"));
    }

    if !state.is_runnable() {
        return restart(api, pcm, direction);
    }

    match -code {
        libc::EAGAIN | libc::EINTR => Ok(()),
        libc::EPIPE => restart(api, pcm, direction),
        _ => Err(fatal(api, code, "unrecoverable error")),
    }
}

fn restart<A: AlsaApi>(api: &A, pcm: &A::Pcm, direction: StreamDirection) -> Result<()> {
    api.prepare(pcm)
        .map_err(|e| fatal(api, e, "prepare failed"))?;
    // capture does not start on its own after prepare
    if direction == StreamDirection::Capture {
        api.start(pcm).map_err(|e| fatal(api, e, "start failed"))?;
    }
    Ok(())
}

fn fatal<A: AlsaApi>(api: &A, code: i32, context: &str) -> AudioDeviceError {
    AudioDeviceError::FatalDevice {
        code,
        message: format!("{}: {}", context, api.strerror(code)),
    }
}
