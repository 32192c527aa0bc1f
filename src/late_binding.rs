//! Runtime binding of an optional native library.
//!
//! A [`LateBindingSymbolTable`] opens a shared library by name and resolves a fixed,
//! ordered list of C symbols from it. Resolution is all-or-nothing: if any symbol is
//! missing the table is marked permanently failed, the library is released and every
//! later [`load`](LateBindingSymbolTable::load) returns `false` without touching the
//! loader again. Library absence or an ABI mismatch does not change while the process
//! runs, and repeated `dlopen` attempts are expensive.
//!
//! The table has no internal synchronization. Load it once on a single thread, then
//! share it read-only (e.g. behind an `Arc`).
//!
//! ```ignore
//! late_binding_symbol_set! {
//!     pub enum PulseSymbols from "libpulse.so.0" => {
//!         pa_mainloop_new,
//!         pa_mainloop_free,
//!     }
//! }
//!
//! let mut table = LateBindingSymbolTable::<PulseSymbols>::new();
//! if table.load() {
//!     let new_fn: Option<unsafe extern "C" fn() -> *mut c_void> =
//!         unsafe { table.function(PulseSymbols::pa_mainloop_new) };
//! }
//! ```

use std::ffi::c_void;
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ptr::NonNull;

use libloading::Library;

/// A native library name plus the ordered symbols required from it.
///
/// Usually declared through [`late_binding_symbol_set!`](crate::late_binding_symbol_set).
pub trait SymbolSet {
    /// Index type; `Into<usize>` yields the slot in [`Self::SYMBOL_NAMES`].
    type Symbol: Copy + Into<usize>;

    /// File name passed to the dynamic loader, e.g. `libasound.so.2`.
    const DLL_NAME: &'static str;

    /// Every symbol that must resolve for the table to count as loaded.
    const SYMBOL_NAMES: &'static [&'static str];
}

/// Opens libraries and looks up symbols on behalf of a symbol table.
pub trait DllLoader {
    type Handle;

    fn load(&mut self, dll_name: &str) -> Option<Self::Handle>;

    fn symbol(&self, handle: &Self::Handle, name: &str) -> Option<NonNull<c_void>>;

    fn unload(&mut self, handle: Self::Handle);
}

/// [`DllLoader`] backed by the platform dynamic loader via `libloading`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLoader;

impl DllLoader for SystemLoader {
    type Handle = Library;

    fn load(&mut self, dll_name: &str) -> Option<Library> {
        // SAFETY: initializers of the libraries we bind (ALSA etc.) have no
        // preconditions beyond being loaded once per process.
        match unsafe { Library::new(dll_name) } {
            Ok(library) => Some(library),
            Err(e) => {
                log::warn!("Can't load {}: {}", dll_name, e);
                None
            }
        }
    }

    fn symbol(&self, handle: &Library, name: &str) -> Option<NonNull<c_void>> {
        // SAFETY: the symbol is only read as an address here; the typed view is
        // created by `LateBindingSymbolTable::function`.
        match unsafe { handle.get::<*mut c_void>(name.as_bytes()) } {
            Ok(symbol) => NonNull::new(*symbol),
            Err(e) => {
                log::warn!("Error loading symbol {}: {}", name, e);
                None
            }
        }
    }

    fn unload(&mut self, handle: Library) {
        if let Err(e) = handle.close() {
            log::warn!("Error unloading library: {}", e);
        }
    }
}

/// Resolved function pointers for one [`SymbolSet`], with load-once semantics.
pub struct LateBindingSymbolTable<S: SymbolSet, L: DllLoader = SystemLoader> {
    loader: L,
    handle: Option<L::Handle>,
    undefined_symbols: bool,
    symbols: Box<[Option<NonNull<c_void>>]>,
    _set: PhantomData<fn() -> S>,
}

impl<S: SymbolSet> LateBindingSymbolTable<S, SystemLoader> {
    pub fn new() -> Self {
        Self::with_loader(SystemLoader)
    }
}

impl<S: SymbolSet> Default for LateBindingSymbolTable<S, SystemLoader> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: SymbolSet, L: DllLoader> LateBindingSymbolTable<S, L> {
    pub fn with_loader(loader: L) -> Self {
        Self {
            loader,
            handle: None,
            undefined_symbols: false,
            symbols: vec![None; S::SYMBOL_NAMES.len()].into_boxed_slice(),
            _set: PhantomData,
        }
    }

    pub fn num_symbols() -> usize {
        S::SYMBOL_NAMES.len()
    }

    pub fn symbol_name(index: usize) -> Option<&'static str> {
        S::SYMBOL_NAMES.get(index).copied()
    }

    pub fn dll_name() -> &'static str {
        S::DLL_NAME
    }

    pub fn is_loaded(&self) -> bool {
        self.handle.is_some()
    }

    /// True once a load attempt found a missing symbol. Never resets.
    pub fn has_undefined_symbols(&self) -> bool {
        self.undefined_symbols
    }

    /// Loads the library and every symbol. Returns true iff both succeeded.
    pub fn load(&mut self) -> bool {
        if self.is_loaded() {
            return true;
        }
        if self.undefined_symbols {
            // Not retried: the library won't grow the missing symbols while we run.
            return false;
        }

        let Some(handle) = self.loader.load(S::DLL_NAME) else {
            return false;
        };

        let mut resolved = Vec::with_capacity(S::SYMBOL_NAMES.len());
        for name in S::SYMBOL_NAMES {
            match self.loader.symbol(&handle, name) {
                Some(ptr) => resolved.push(Some(ptr)),
                None => {
                    log::warn!(
                        "{} is missing symbol {}; disabling late-bound table",
                        S::DLL_NAME,
                        name
                    );
                    self.undefined_symbols = true;
                    self.loader.unload(handle);
                    return false;
                }
            }
        }

        self.symbols = resolved.into_boxed_slice();
        log::info!(
            "Loaded {} ({} symbols)",
            S::DLL_NAME,
            S::SYMBOL_NAMES.len()
        );
        self.handle = Some(handle);
        true
    }

    pub fn unload(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.loader.unload(handle);
            self.symbols.fill(None);
        }
    }

    /// Raw address of `symbol`. `None` unless the table is loaded.
    pub fn symbol(&self, symbol: S::Symbol) -> Option<NonNull<c_void>> {
        debug_assert!(self.is_loaded(), "symbol lookup on unloaded table");
        let index: usize = symbol.into();
        self.symbols.get(index).copied().flatten()
    }

    /// Typed view of `symbol`.
    ///
    /// # Safety
    ///
    /// `F` must be the function pointer type matching the native declaration of the
    /// symbol, including the `extern "C"` ABI.
    pub unsafe fn function<F: Copy>(&self, symbol: S::Symbol) -> Option<F> {
        assert_eq!(
            mem::size_of::<F>(),
            mem::size_of::<*mut c_void>(),
            "late-bound symbols must be viewed through pointer-sized types"
        );
        self.symbol(symbol)
            .map(|ptr| unsafe { mem::transmute_copy::<*mut c_void, F>(&ptr.as_ptr()) })
    }
}

impl<S: SymbolSet, L: DllLoader> Drop for LateBindingSymbolTable<S, L> {
    fn drop(&mut self) {
        self.unload();
    }
}

impl<S: SymbolSet, L: DllLoader> fmt::Debug for LateBindingSymbolTable<S, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LateBindingSymbolTable")
            .field("dll", &S::DLL_NAME)
            .field("loaded", &self.is_loaded())
            .field("undefined_symbols", &self.undefined_symbols)
            .finish()
    }
}

// Resolved slots are code addresses; sharing them is as safe as sharing the loader handle.
unsafe impl<S, L> Send for LateBindingSymbolTable<S, L>
where
    S: SymbolSet,
    L: DllLoader + Send,
    L::Handle: Send,
{
}

unsafe impl<S, L> Sync for LateBindingSymbolTable<S, L>
where
    S: SymbolSet,
    L: DllLoader + Sync,
    L::Handle: Sync,
{
}

/// Declares a symbol index enum and its [`SymbolSet`] impl.
///
/// Variants are named after the C symbols, in resolution order.
#[macro_export]
macro_rules! late_binding_symbol_set {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident from $dll:expr => { $($sym:ident),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[allow(non_camel_case_types)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(usize)]
        $vis enum $name {
            $($sym),+
        }

        impl ::core::convert::From<$name> for usize {
            fn from(symbol: $name) -> usize {
                symbol as usize
            }
        }

        impl $crate::late_binding::SymbolSet for $name {
            type Symbol = $name;
            const DLL_NAME: &'static str = $dll;
            const SYMBOL_NAMES: &'static [&'static str] = &[$(stringify!($sym)),+];
        }
    };
}
