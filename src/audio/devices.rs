//! Turns ALSA name hints into the indexed device list the device exposes.

use super::alsa_api::{DeviceHint, StreamDirection};
use super::generic::DeviceName;

/// PCM name of the system default device, always index 0.
pub const DEFAULT_DEVICE: &str = "default";

const IGNORED_NAMES: &[&str] = &["default", "null", "pulse"];

/// Devices usable for `direction`, `default` first.
///
/// Hints restricted to the other direction are dropped, as are the virtual devices
/// that only make sense for the other direction (`dsnoop:` cannot play, `dmix:` cannot
/// record).
pub fn filter_hints(hints: &[DeviceHint], direction: StreamDirection) -> Vec<DeviceName> {
    let excluded_prefix = match direction {
        StreamDirection::Playback => "dsnoop:",
        StreamDirection::Capture => "dmix:",
    };

    let mut devices = vec![DeviceName {
        name: DEFAULT_DEVICE.to_string(),
        guid: DEFAULT_DEVICE.to_string(),
    }];

    for hint in hints {
        if let Some(ioid) = hint.ioid.as_deref() {
            if ioid != direction.ioid() {
                continue;
            }
        }
        let Some(name) = hint.name.as_deref() else {
            continue;
        };
        if IGNORED_NAMES.contains(&name) || name.starts_with(excluded_prefix) {
            continue;
        }

        let display = match hint.desc.as_deref() {
            Some(desc) if !desc.is_empty() => desc.replacen('\n', "-", 1),
            _ => name.to_string(),
        };
        devices.push(DeviceName {
            name: display,
            guid: name.to_string(),
        });
    }

    devices
}
