mod common;

use std::sync::atomic::Ordering;

use alsa_adm::audio::recovery::recover;
use alsa_adm::audio::{AlsaApi, AudioDeviceError, AudioDeviceGeneric, PcmState, StreamDirection, StreamState};
use common::{FakeAlsa, TestBuffer, fixture, wait_until};

fn open(alsa: &FakeAlsa, direction: StreamDirection) -> common::FakePcm {
    alsa.open("default", direction).unwrap()
}

#[test]
fn test_capture_xrun_prepares_and_restarts() {
    let alsa = FakeAlsa::new();
    let pcm = open(&alsa, StreamDirection::Capture);
    alsa.set_state(PcmState::Xrun);

    recover(&alsa, &pcm, -libc::EPIPE, StreamDirection::Capture).unwrap();
    assert_eq!(FakeAlsa::count(&alsa.inner.prepares), 1);
    assert_eq!(FakeAlsa::count(&alsa.inner.starts), 1);
}

#[test]
fn test_playback_xrun_prepares_only() {
    let alsa = FakeAlsa::new();
    let pcm = open(&alsa, StreamDirection::Playback);
    alsa.set_state(PcmState::Running);

    recover(&alsa, &pcm, -libc::EPIPE, StreamDirection::Playback).unwrap();
    assert_eq!(FakeAlsa::count(&alsa.inner.prepares), 1);
    assert_eq!(FakeAlsa::count(&alsa.inner.starts), 0);
}

#[test]
fn test_interrupted_call_is_retried_without_action() {
    let alsa = FakeAlsa::new();
    let pcm = open(&alsa, StreamDirection::Capture);

    recover(&alsa, &pcm, -libc::EAGAIN, StreamDirection::Capture).unwrap();
    recover(&alsa, &pcm, -libc::EINTR, StreamDirection::Capture).unwrap();
    assert_eq!(FakeAlsa::count(&alsa.inner.prepares), 0);
    assert_eq!(FakeAlsa::count(&alsa.inner.resumes), 0);
}

#[test]
fn test_suspend_resumes_once() {
    let alsa = FakeAlsa::new();
    let pcm = open(&alsa, StreamDirection::Playback);
    alsa.set_state(PcmState::Suspended);

    recover(&alsa, &pcm, -libc::ESTRPIPE, StreamDirection::Playback).unwrap();
    assert_eq!(FakeAlsa::count(&alsa.inner.resumes), 1);

    // the code alone identifies a suspend as well
    alsa.set_state(PcmState::Running);
    recover(&alsa, &pcm, -libc::ESTRPIPE, StreamDirection::Playback).unwrap();
    assert_eq!(FakeAlsa::count(&alsa.inner.resumes), 2);
}

#[test]
fn test_failed_resume_is_fatal() {
    let alsa = FakeAlsa::new();
    let pcm = open(&alsa, StreamDirection::Capture);
    alsa.set_state(PcmState::Suspended);
    *alsa.inner.resume_error.lock().unwrap() = Some(-libc::EAGAIN);

    let err = recover(&alsa, &pcm, -libc::ESTRPIPE, StreamDirection::Capture).unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(FakeAlsa::count(&alsa.inner.resumes), 1);
    assert_eq!(FakeAlsa::count(&alsa.inner.prepares), 0);
}

#[test]
fn test_disconnected_is_fatal() {
    let alsa = FakeAlsa::new();
    let pcm = open(&alsa, StreamDirection::Capture);
    alsa.set_state(PcmState::Disconnected);

    let err = recover(&alsa, &pcm, -libc::ENODEV, StreamDirection::Capture).unwrap_err();
    assert!(matches!(err, AudioDeviceError::FatalDevice { code, .. } if code == -libc::ENODEV));
    assert_eq!(FakeAlsa::count(&alsa.inner.prepares), 0);
}

#[test]
fn test_unknown_error_in_running_state_is_fatal() {
    let alsa = FakeAlsa::new();
    let pcm = open(&alsa, StreamDirection::Playback);

    assert!(recover(&alsa, &pcm, -libc::EIO, StreamDirection::Playback).unwrap_err().is_fatal());
}

#[test]
fn test_failed_prepare_is_fatal() {
    let alsa = FakeAlsa::new();
    let pcm = open(&alsa, StreamDirection::Capture);
    alsa.set_state(PcmState::Setup);
    *alsa.inner.prepare_error.lock().unwrap() = Some(-libc::EBUSY);

    let err = recover(&alsa, &pcm, -libc::EPIPE, StreamDirection::Capture).unwrap_err();
    assert!(matches!(err, AudioDeviceError::FatalDevice { code, .. } if code == -libc::EBUSY));
    assert_eq!(FakeAlsa::count(&alsa.inner.starts), 0);
}

#[test]
fn test_xrun_during_recording_is_absorbed() {
    let f = fixture();
    let (buffer, log) = TestBuffer::new();
    f.device.attach_audio_buffer(buffer);
    f.device.set_recording_device(0).unwrap();
    f.device.init_recording().unwrap();
    f.device.start_recording().unwrap();

    f.alsa.push_read_error(-libc::EPIPE);
    assert!(wait_until(|| FakeAlsa::count(&f.alsa.inner.prepares) == 2));
    let delivered = log.delivered.load(Ordering::SeqCst);
    assert!(wait_until(|| log.delivered.load(Ordering::SeqCst) > delivered));
    assert!(f.device.recording());

    f.device.stop_recording().unwrap();
}

#[test]
fn test_fatal_recording_error_reported_once() {
    let f = fixture();
    let (buffer, _log) = TestBuffer::new();
    f.device.attach_audio_buffer(buffer);
    f.device.set_recording_device(0).unwrap();
    f.device.init_recording().unwrap();
    f.device.start_recording().unwrap();

    f.alsa.set_state(PcmState::Disconnected);
    f.alsa.push_read_error(-libc::ENODEV);
    assert!(wait_until(|| !f.device.recording()));
    assert_eq!(f.device.recording_state(), StreamState::Stopped);

    let err = f.device.stop_recording().unwrap_err();
    assert!(matches!(err, AudioDeviceError::FatalDevice { code, .. } if code == -libc::ENODEV));
    assert_eq!(f.device.recording_state(), StreamState::Uninitialized);
    assert_eq!(FakeAlsa::count(&f.alsa.inner.closes), 1);

    // reported once; the device is usable again
    f.device.stop_recording().unwrap();
    f.alsa.set_state(PcmState::Running);
    f.device.init_recording().unwrap();
    f.device.start_recording().unwrap();
    assert!(f.device.recording());
    f.device.stop_recording().unwrap();
}

#[test]
fn test_fatal_playout_error_reported_by_next_control_call() {
    let f = fixture();
    let (buffer, _log) = TestBuffer::new();
    f.device.attach_audio_buffer(buffer);
    f.device.set_playout_device(0).unwrap();
    f.device.init_playout().unwrap();
    f.device.start_playout().unwrap();

    f.alsa.push_write_error(-libc::EIO);
    assert!(wait_until(|| !f.device.playing()));

    assert!(f.device.start_playout().unwrap_err().is_fatal());
    assert!(!f.device.playout_is_initialized());
    // the stream was released, so starting again needs a fresh init
    assert!(f.device.start_playout().unwrap_err().is_configuration());
    f.device.init_playout().unwrap();
    assert!(f.device.playout_is_initialized());
}
