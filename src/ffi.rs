//! Native engine library surface.
//!
//! The engine ships a C library exposing a handful of entry points
//! (`engOpen`, `engEvalString`, `engPutVariable`, ...) with an opaque
//! status-code contract: 0 means success, nonzero means failure, and the
//! exact code semantics are unspecified. This module loads that library at
//! runtime and wraps its entry points behind the [`EngineApi`] trait.
//!
//! The trait exists so everything above this layer can run against an
//! alternative transport - in practice a mock engine in tests, the same way
//! the rest of the host process is tested without a live backend.
//!
//! # Library resolution
//!
//! The library path is resolved once per process, in order:
//!
//! 1. `MEXLINK_ENGINE_LIB` - explicit path to the shared library
//! 2. `MEXLINK_ENGINE_HOME` - engine install root; the platform's
//!    conventional `bin/<arch>` subdirectory is appended
//! 3. The bare platform soname, left to the system loader's search path

use std::env;
use std::ffi::CStr;
use std::os::raw::{c_char, c_int, c_void};
use std::path::{Path, PathBuf};
use std::ptr;
use std::sync::{Arc, OnceLock};

use libloading::Library;

use crate::error::EngineError;

/// Environment variable holding an explicit path to the engine library.
pub const ENGINE_LIB_ENV: &str = "MEXLINK_ENGINE_LIB";

/// Environment variable holding the engine installation root.
pub const ENGINE_HOME_ENV: &str = "MEXLINK_ENGINE_HOME";

#[cfg(target_os = "linux")]
const ENGINE_SONAME: &str = "libeng.so";
#[cfg(target_os = "macos")]
const ENGINE_SONAME: &str = "libeng.dylib";
#[cfg(windows)]
const ENGINE_SONAME: &str = "libeng.dll";
#[cfg(not(any(target_os = "linux", target_os = "macos", windows)))]
const ENGINE_SONAME: &str = "libeng.so";

#[cfg(target_os = "linux")]
const ENGINE_ARCH_DIR: &str = "glnxa64";
#[cfg(all(target_os = "macos", target_arch = "aarch64"))]
const ENGINE_ARCH_DIR: &str = "maca64";
#[cfg(all(target_os = "macos", not(target_arch = "aarch64")))]
const ENGINE_ARCH_DIR: &str = "maci64";
#[cfg(windows)]
const ENGINE_ARCH_DIR: &str = "win64";
#[cfg(not(any(target_os = "linux", target_os = "macos", windows)))]
const ENGINE_ARCH_DIR: &str = "glnxa64";

type EngOpenFn = unsafe extern "C" fn(*const c_char) -> *mut c_void;
type EngCloseFn = unsafe extern "C" fn(*mut c_void) -> c_int;
type EngOutputBufferFn = unsafe extern "C" fn(*mut c_void, *mut c_char, c_int) -> c_int;
type EngEvalStringFn = unsafe extern "C" fn(*mut c_void, *const c_char) -> c_int;
type EngPutVariableFn = unsafe extern "C" fn(*mut c_void, *const c_char, *const c_void) -> c_int;
type EngGetVariableFn = unsafe extern "C" fn(*mut c_void, *const c_char) -> *mut c_void;
type EngSetVisibleFn = unsafe extern "C" fn(*mut c_void, c_int) -> c_int;

/// The engine's foreign entry points, as consumed by the rest of the crate.
///
/// Handles are opaque tokens: the only valid handle arguments are non-null
/// values previously returned by [`EngineApi::open`] on the same
/// implementation and not yet passed to [`EngineApi::close`]. `Session`
/// maintains that invariant for every call it makes.
pub trait EngineApi: Send + Sync {
    /// Start an engine process, optionally with an explicit startup
    /// command. Returns a null handle when the process could not start.
    fn open(&self, start_command: Option<&CStr>) -> *mut c_void;

    /// Shut down the engine process behind `handle`.
    fn close(&self, handle: *mut c_void) -> c_int;

    /// Register `buffer` (of `capacity` bytes) to capture text the engine
    /// prints during statement execution. A null buffer with capacity 0
    /// disables capture.
    fn register_output_buffer(&self, handle: *mut c_void, buffer: *mut c_char, capacity: c_int)
        -> c_int;

    /// Execute one statement in the session's remote workspace.
    fn eval(&self, handle: *mut c_void, statement: &CStr) -> c_int;

    /// Write an array value into the remote workspace under `name`.
    fn put_variable(&self, handle: *mut c_void, name: &CStr, value: *const c_void) -> c_int;

    /// Read the array value bound to `name` in the remote workspace.
    /// Returns null when the name is undefined. Ownership of a non-null
    /// result transfers to the caller.
    fn get_variable(&self, handle: *mut c_void, name: &CStr) -> *mut c_void;

    /// Request the engine window shown or hidden. Only meaningful on
    /// platforms where the engine has a window; elsewhere a no-op.
    fn set_visible(&self, handle: *mut c_void, visible: bool) -> c_int;
}

/// [`EngineApi`] backed by the dynamically loaded native engine library.
pub struct NativeEngine {
    open: EngOpenFn,
    close: EngCloseFn,
    output_buffer: EngOutputBufferFn,
    eval: EngEvalStringFn,
    put_variable: EngPutVariableFn,
    get_variable: EngGetVariableFn,
    // Not exported by the engine library on every platform.
    set_visible: Option<EngSetVisibleFn>,
    // Keeps the loaded library (and with it every fn pointer above) alive.
    _library: Library,
}

impl NativeEngine {
    /// The process-wide native engine library, loaded on first use.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::EngineUnavailable`] when the library cannot
    /// be loaded or is missing a required entry point. The failure is
    /// cached: every later call reports the same error without retrying.
    pub fn global() -> Result<Arc<dyn EngineApi>, EngineError> {
        static NATIVE: OnceLock<Result<Arc<NativeEngine>, String>> = OnceLock::new();

        match NATIVE.get_or_init(|| NativeEngine::load().map(Arc::new)) {
            Ok(engine) => {
                let api: Arc<dyn EngineApi> = engine.clone();
                Ok(api)
            }
            Err(message) => Err(EngineError::EngineUnavailable(message.clone())),
        }
    }

    /// Load the engine library from the resolved path.
    fn load() -> Result<Self, String> {
        let path = locate_engine_library();
        Self::load_from(&path)
    }

    fn load_from(path: &Path) -> Result<Self, String> {
        // SAFETY: loading a shared library runs its initializers; the engine
        // library is a plain C library with no such side effects beyond
        // symbol registration.
        let library = unsafe { Library::new(path) }
            .map_err(|err| format!("{}: {err}", path.display()))?;

        // SAFETY: the symbol signatures below are the engine C API's
        // published prototypes; the fn pointers are kept alive by storing
        // the library alongside them.
        unsafe {
            let open = *library
                .get::<EngOpenFn>(b"engOpen\0")
                .map_err(|err| format!("{}: engOpen: {err}", path.display()))?;
            let close = *library
                .get::<EngCloseFn>(b"engClose\0")
                .map_err(|err| format!("{}: engClose: {err}", path.display()))?;
            let output_buffer = *library
                .get::<EngOutputBufferFn>(b"engOutputBuffer\0")
                .map_err(|err| format!("{}: engOutputBuffer: {err}", path.display()))?;
            let eval = *library
                .get::<EngEvalStringFn>(b"engEvalString\0")
                .map_err(|err| format!("{}: engEvalString: {err}", path.display()))?;
            let put_variable = *library
                .get::<EngPutVariableFn>(b"engPutVariable\0")
                .map_err(|err| format!("{}: engPutVariable: {err}", path.display()))?;
            let get_variable = *library
                .get::<EngGetVariableFn>(b"engGetVariable\0")
                .map_err(|err| format!("{}: engGetVariable: {err}", path.display()))?;
            let set_visible = library
                .get::<EngSetVisibleFn>(b"engSetVisible\0")
                .ok()
                .map(|symbol| *symbol);

            tracing::info!(path = %path.display(), "loaded engine library");

            Ok(Self {
                open,
                close,
                output_buffer,
                eval,
                put_variable,
                get_variable,
                set_visible,
                _library: library,
            })
        }
    }
}

impl EngineApi for NativeEngine {
    fn open(&self, start_command: Option<&CStr>) -> *mut c_void {
        let command = start_command.map_or(ptr::null(), CStr::as_ptr);
        unsafe { (self.open)(command) }
    }

    fn close(&self, handle: *mut c_void) -> c_int {
        unsafe { (self.close)(handle) }
    }

    fn register_output_buffer(
        &self,
        handle: *mut c_void,
        buffer: *mut c_char,
        capacity: c_int,
    ) -> c_int {
        unsafe { (self.output_buffer)(handle, buffer, capacity) }
    }

    fn eval(&self, handle: *mut c_void, statement: &CStr) -> c_int {
        unsafe { (self.eval)(handle, statement.as_ptr()) }
    }

    fn put_variable(&self, handle: *mut c_void, name: &CStr, value: *const c_void) -> c_int {
        unsafe { (self.put_variable)(handle, name.as_ptr(), value) }
    }

    fn get_variable(&self, handle: *mut c_void, name: &CStr) -> *mut c_void {
        unsafe { (self.get_variable)(handle, name.as_ptr()) }
    }

    fn set_visible(&self, handle: *mut c_void, visible: bool) -> c_int {
        match self.set_visible {
            Some(set_visible) => unsafe { set_visible(handle, c_int::from(visible)) },
            None => 0,
        }
    }
}

/// Resolve the path of the engine shared library.
///
/// Resolution order:
///
/// 1. `MEXLINK_ENGINE_LIB` environment variable (explicit library path)
/// 2. `MEXLINK_ENGINE_HOME/bin/<arch>/<soname>`
/// 3. The bare soname, resolved by the system loader
fn locate_engine_library() -> PathBuf {
    if let Ok(path) = env::var(ENGINE_LIB_ENV) {
        tracing::info!("using engine library from {ENGINE_LIB_ENV}: {path}");
        return PathBuf::from(path);
    }

    if let Ok(home) = env::var(ENGINE_HOME_ENV) {
        let candidate = Path::new(&home)
            .join("bin")
            .join(ENGINE_ARCH_DIR)
            .join(ENGINE_SONAME);
        if candidate.exists() {
            tracing::info!(path = %candidate.display(), "using engine library from {ENGINE_HOME_ENV}");
        } else {
            tracing::warn!(
                path = %candidate.display(),
                "{ENGINE_HOME_ENV} is set but the library is not there; trying it anyway"
            );
        }
        return candidate;
    }

    tracing::debug!("resolving {ENGINE_SONAME} through the system loader search path");
    PathBuf::from(ENGINE_SONAME)
}
