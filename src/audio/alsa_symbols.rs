//! libasound bound at runtime through a [`LateBindingSymbolTable`].

use std::ffi::{CStr, CString, c_char, c_int, c_long, c_uint, c_ulong, c_void};
use std::fmt;
use std::ptr::{self, NonNull};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::late_binding::{LateBindingSymbolTable, SymbolSet};

use super::alsa_api::{
    AlsaApi, DeviceHint, NativeResult, PcmConfig, PcmGeometry, PcmState, StreamDirection,
};
use super::error::{AudioDeviceError, Result};

crate::late_binding_symbol_set! {
    /// Every libasound entry point the device uses.
    pub enum AlsaSymbols from env!("ALSA_LIBRARY") => {
        snd_card_next,
        snd_device_name_hint,
        snd_device_name_get_hint,
        snd_device_name_free_hint,
        snd_pcm_open,
        snd_pcm_close,
        snd_pcm_set_params,
        snd_pcm_get_params,
        snd_pcm_prepare,
        snd_pcm_start,
        snd_pcm_drop,
        snd_pcm_resume,
        snd_pcm_wait,
        snd_pcm_avail_update,
        snd_pcm_readi,
        snd_pcm_writei,
        snd_pcm_delay,
        snd_pcm_state,
        snd_strerror,
    }
}

pub type AlsaSymbolTable = LateBindingSymbolTable<AlsaSymbols>;

const SND_PCM_FORMAT_S16_LE: c_int = 2;
const SND_PCM_ACCESS_RW_INTERLEAVED: c_int = 3;

type CardNextFn = unsafe extern "C" fn(card: *mut c_int) -> c_int;
type DeviceNameHintFn =
    unsafe extern "C" fn(card: c_int, iface: *const c_char, hints: *mut *mut *mut c_void) -> c_int;
type DeviceNameGetHintFn = unsafe extern "C" fn(hint: *const c_void, id: *const c_char) -> *mut c_char;
type DeviceNameFreeHintFn = unsafe extern "C" fn(hints: *mut *mut c_void) -> c_int;
type PcmOpenFn = unsafe extern "C" fn(
    pcm: *mut *mut c_void,
    name: *const c_char,
    stream: c_int,
    mode: c_int,
) -> c_int;
type PcmFn = unsafe extern "C" fn(pcm: *mut c_void) -> c_int;
type PcmSetParamsFn = unsafe extern "C" fn(
    pcm: *mut c_void,
    format: c_int,
    access: c_int,
    channels: c_uint,
    rate: c_uint,
    soft_resample: c_int,
    latency: c_uint,
) -> c_int;
type PcmGetParamsFn =
    unsafe extern "C" fn(pcm: *mut c_void, buffer_size: *mut c_ulong, period_size: *mut c_ulong) -> c_int;
type PcmWaitFn = unsafe extern "C" fn(pcm: *mut c_void, timeout: c_int) -> c_int;
type PcmAvailUpdateFn = unsafe extern "C" fn(pcm: *mut c_void) -> c_long;
type PcmReadiFn = unsafe extern "C" fn(pcm: *mut c_void, buffer: *mut c_void, size: c_ulong) -> c_long;
type PcmWriteiFn =
    unsafe extern "C" fn(pcm: *mut c_void, buffer: *const c_void, size: c_ulong) -> c_long;
type PcmDelayFn = unsafe extern "C" fn(pcm: *mut c_void, delay: *mut c_long) -> c_int;
type StrerrorFn = unsafe extern "C" fn(errnum: c_int) -> *const c_char;

/// Typed entry points copied out of the symbol table.
#[derive(Clone, Copy)]
struct AlsaFns {
    card_next: CardNextFn,
    device_name_hint: DeviceNameHintFn,
    device_name_get_hint: DeviceNameGetHintFn,
    device_name_free_hint: DeviceNameFreeHintFn,
    pcm_open: PcmOpenFn,
    pcm_close: PcmFn,
    pcm_set_params: PcmSetParamsFn,
    pcm_get_params: PcmGetParamsFn,
    pcm_prepare: PcmFn,
    pcm_start: PcmFn,
    pcm_drop: PcmFn,
    pcm_resume: PcmFn,
    pcm_wait: PcmWaitFn,
    pcm_avail_update: PcmAvailUpdateFn,
    pcm_readi: PcmReadiFn,
    pcm_writei: PcmWriteiFn,
    pcm_delay: PcmDelayFn,
    pcm_state: PcmFn,
    strerror: StrerrorFn,
}

impl AlsaFns {
    fn resolve(table: &AlsaSymbolTable) -> Result<Self> {
        fn get<F: Copy>(table: &AlsaSymbolTable, symbol: AlsaSymbols) -> Result<F> {
            // SAFETY: each call site below names the type matching asoundlib.h.
            unsafe { table.function::<F>(symbol) }.ok_or_else(|| {
                AudioDeviceError::SymbolResolution {
                    library: AlsaSymbols::DLL_NAME.to_string(),
                    reason: format!("{:?} is not resolved", symbol),
                }
            })
        }

        Ok(Self {
            card_next: get(table, AlsaSymbols::snd_card_next)?,
            device_name_hint: get(table, AlsaSymbols::snd_device_name_hint)?,
            device_name_get_hint: get(table, AlsaSymbols::snd_device_name_get_hint)?,
            device_name_free_hint: get(table, AlsaSymbols::snd_device_name_free_hint)?,
            pcm_open: get(table, AlsaSymbols::snd_pcm_open)?,
            pcm_close: get(table, AlsaSymbols::snd_pcm_close)?,
            pcm_set_params: get(table, AlsaSymbols::snd_pcm_set_params)?,
            pcm_get_params: get(table, AlsaSymbols::snd_pcm_get_params)?,
            pcm_prepare: get(table, AlsaSymbols::snd_pcm_prepare)?,
            pcm_start: get(table, AlsaSymbols::snd_pcm_start)?,
            pcm_drop: get(table, AlsaSymbols::snd_pcm_drop)?,
            pcm_resume: get(table, AlsaSymbols::snd_pcm_resume)?,
            pcm_wait: get(table, AlsaSymbols::snd_pcm_wait)?,
            pcm_avail_update: get(table, AlsaSymbols::snd_pcm_avail_update)?,
            pcm_readi: get(table, AlsaSymbols::snd_pcm_readi)?,
            pcm_writei: get(table, AlsaSymbols::snd_pcm_writei)?,
            pcm_delay: get(table, AlsaSymbols::snd_pcm_delay)?,
            pcm_state: get(table, AlsaSymbols::snd_pcm_state)?,
            strerror: get(table, AlsaSymbols::snd_strerror)?,
        })
    }
}

/// An open `snd_pcm_t*`.
pub struct AlsaPcm {
    raw: NonNull<c_void>,
    channels: AtomicU32,
    closed: AtomicBool,
}

// ALSA PCM handles may be used from any thread; the device never drives one from two
// threads at the same time.
unsafe impl Send for AlsaPcm {}
unsafe impl Sync for AlsaPcm {}

impl AlsaPcm {
    /// Channel count applied by the last successful `set_params`; 0 before that.
    pub fn channels(&self) -> u32 {
        self.channels.load(Ordering::Acquire)
    }

    fn raw(&self) -> NativeResult<*mut c_void> {
        if self.closed.load(Ordering::Acquire) {
            Err(-libc::EBADFD)
        } else {
            Ok(self.raw.as_ptr())
        }
    }

    /// Number of samples `frames` interleaved frames occupy, if `len` can hold them.
    fn samples_for(&self, frames: usize, len: usize) -> NativeResult<usize> {
        let channels = self.channels() as usize;
        match frames.checked_mul(channels) {
            Some(samples) if channels > 0 && samples <= len => Ok(samples),
            _ => Err(-libc::EINVAL),
        }
    }
}

impl fmt::Debug for AlsaPcm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlsaPcm")
            .field("raw", &self.raw)
            .field("channels", &self.channels())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

/// [`AlsaApi`] calling into a loaded [`AlsaSymbolTable`].
///
/// Holds the table alive: the library stays mapped until the last `LateBoundAlsa`
/// (and every other owner of the `Arc`) is dropped.
#[derive(Clone)]
pub struct LateBoundAlsa {
    fns: AlsaFns,
    _table: Arc<AlsaSymbolTable>,
}

impl LateBoundAlsa {
    /// Binds to an already loaded table.
    pub fn new(table: Arc<AlsaSymbolTable>) -> Result<Self> {
        if !table.is_loaded() {
            return Err(AudioDeviceError::SymbolResolution {
                library: AlsaSymbols::DLL_NAME.to_string(),
                reason: if table.has_undefined_symbols() {
                    "required symbols are missing".to_string()
                } else {
                    "library is not loaded".to_string()
                },
            });
        }
        let fns = AlsaFns::resolve(&table)?;
        Ok(Self { fns, _table: table })
    }

    /// Reads one hint field, releasing ALSA's copy of the string.
    unsafe fn hint_value(&self, hint: *const c_void, id: &CStr) -> Option<String> {
        let value = unsafe { (self.fns.device_name_get_hint)(hint, id.as_ptr()) };
        if value.is_null() {
            return None;
        }
        let owned = unsafe { CStr::from_ptr(value) }.to_string_lossy().into_owned();
        unsafe { libc::free(value.cast()) };
        Some(owned)
    }

    fn check(code: c_int) -> NativeResult<()> {
        if code < 0 { Err(code) } else { Ok(()) }
    }

    fn frames(count: c_long) -> NativeResult<usize> {
        if count < 0 { Err(count as i32) } else { Ok(count as usize) }
    }
}

impl fmt::Debug for LateBoundAlsa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LateBoundAlsa")
            .field("library", &AlsaSymbols::DLL_NAME)
            .finish()
    }
}

impl AlsaApi for LateBoundAlsa {
    type Pcm = AlsaPcm;

    fn device_hints(&self) -> NativeResult<Vec<DeviceHint>> {
        let mut result = Vec::new();
        let mut card: c_int = -1;

        // 逐个声卡获取提示, 避免 snd_device_name_hint(-1, ...) 在部分 libasound 版本上的崩溃
        loop {
            Self::check(unsafe { (self.fns.card_next)(&mut card) })?;
            if card < 0 {
                break;
            }

            let mut hints: *mut *mut c_void = ptr::null_mut();
            Self::check(unsafe { (self.fns.device_name_hint)(card, c"pcm".as_ptr(), &mut hints) })?;
            if hints.is_null() {
                continue;
            }

            unsafe {
                let mut cursor = hints;
                while !(*cursor).is_null() {
                    let hint = (*cursor).cast_const();
                    result.push(DeviceHint {
                        name: self.hint_value(hint, c"NAME"),
                        desc: self.hint_value(hint, c"DESC"),
                        ioid: self.hint_value(hint, c"IOID"),
                    });
                    cursor = cursor.add(1);
                }
                (self.fns.device_name_free_hint)(hints);
            }
        }

        Ok(result)
    }

    fn open(&self, device: &str, direction: StreamDirection) -> NativeResult<AlsaPcm> {
        let name = CString::new(device).map_err(|_| -libc::EINVAL)?;
        let mut raw: *mut c_void = ptr::null_mut();
        // 阻塞模式打开, 数据线程通过 snd_pcm_wait 控制等待时长
        Self::check(unsafe { (self.fns.pcm_open)(&mut raw, name.as_ptr(), direction.as_raw(), 0) })?;
        let raw = NonNull::new(raw).ok_or(-libc::ENODEV)?;

        log::info!("ALSA {} opened: device={}", direction.name(), device);
        Ok(AlsaPcm {
            raw,
            channels: AtomicU32::new(0),
            closed: AtomicBool::new(false),
        })
    }

    fn close(&self, pcm: &AlsaPcm) -> NativeResult<()> {
        let raw = pcm.raw()?;
        pcm.closed.store(true, Ordering::Release);
        Self::check(unsafe { (self.fns.pcm_close)(raw) })
    }

    fn set_params(&self, pcm: &AlsaPcm, config: &PcmConfig) -> NativeResult<()> {
        let raw = pcm.raw()?;
        Self::check(unsafe {
            (self.fns.pcm_set_params)(
                raw,
                SND_PCM_FORMAT_S16_LE,
                SND_PCM_ACCESS_RW_INTERLEAVED,
                config.channels,
                config.rate,
                c_int::from(config.soft_resample),
                config.latency_us,
            )
        })?;
        pcm.channels.store(config.channels, Ordering::Release);
        Ok(())
    }

    fn get_params(&self, pcm: &AlsaPcm) -> NativeResult<PcmGeometry> {
        let raw = pcm.raw()?;
        let mut buffer_size: c_ulong = 0;
        let mut period_size: c_ulong = 0;
        Self::check(unsafe { (self.fns.pcm_get_params)(raw, &mut buffer_size, &mut period_size) })?;
        Ok(PcmGeometry {
            buffer_frames: buffer_size as usize,
            period_frames: period_size as usize,
        })
    }

    fn prepare(&self, pcm: &AlsaPcm) -> NativeResult<()> {
        Self::check(unsafe { (self.fns.pcm_prepare)(pcm.raw()?) })
    }

    fn start(&self, pcm: &AlsaPcm) -> NativeResult<()> {
        Self::check(unsafe { (self.fns.pcm_start)(pcm.raw()?) })
    }

    fn drop_frames(&self, pcm: &AlsaPcm) -> NativeResult<()> {
        Self::check(unsafe { (self.fns.pcm_drop)(pcm.raw()?) })
    }

    fn resume(&self, pcm: &AlsaPcm) -> NativeResult<()> {
        Self::check(unsafe { (self.fns.pcm_resume)(pcm.raw()?) })
    }

    fn wait(&self, pcm: &AlsaPcm, timeout_ms: u32) -> NativeResult<bool> {
        let timeout = c_int::try_from(timeout_ms).unwrap_or(c_int::MAX);
        let ready = unsafe { (self.fns.pcm_wait)(pcm.raw()?, timeout) };
        Self::check(ready)?;
        Ok(ready > 0)
    }

    fn avail_update(&self, pcm: &AlsaPcm) -> NativeResult<usize> {
        Self::frames(unsafe { (self.fns.pcm_avail_update)(pcm.raw()?) })
    }

    fn readi(&self, pcm: &AlsaPcm, buf: &mut [i16], frames: usize) -> NativeResult<usize> {
        pcm.samples_for(frames, buf.len())?;
        let raw = pcm.raw()?;
        Self::frames(unsafe { (self.fns.pcm_readi)(raw, buf.as_mut_ptr().cast(), frames as c_ulong) })
    }

    fn writei(&self, pcm: &AlsaPcm, buf: &[i16], frames: usize) -> NativeResult<usize> {
        pcm.samples_for(frames, buf.len())?;
        let raw = pcm.raw()?;
        Self::frames(unsafe { (self.fns.pcm_writei)(raw, buf.as_ptr().cast(), frames as c_ulong) })
    }

    fn delay(&self, pcm: &AlsaPcm) -> NativeResult<i64> {
        let mut delay: c_long = 0;
        Self::check(unsafe { (self.fns.pcm_delay)(pcm.raw()?, &mut delay) })?;
        Ok(delay as i64)
    }

    fn state(&self, pcm: &AlsaPcm) -> PcmState {
        match pcm.raw() {
            Ok(raw) => PcmState::from_raw(unsafe { (self.fns.pcm_state)(raw) }),
            Err(_) => PcmState::Disconnected,
        }
    }

    fn strerror(&self, code: i32) -> String {
        let message = unsafe { (self.fns.strerror)(code) };
        if message.is_null() {
            format!("ALSA error {}", code)
        } else {
            unsafe { CStr::from_ptr(message) }.to_string_lossy().into_owned()
        }
    }
}
