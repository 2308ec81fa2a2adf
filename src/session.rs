//! Engine session lifecycle and statement evaluation.
//!
//! A [`Session`] owns one connection to the engine process: the native
//! handle, plus the output-capture buffer registered with the engine for
//! text printed during statement execution. Every operation is synchronous
//! and blocking; the caller suspends until the remote side completes and
//! any output has been forwarded.
//!
//! The connection is a serial resource. All calls go through `&mut self`,
//! so overlapping use of one session cannot be expressed without an
//! external lock - the default-session registry provides exactly that for
//! the shared session.
//!
//! Release follows an explicit-owner model: [`Session::close`] or `Drop`,
//! whichever runs first, shuts the connection down and leaves the terminal
//! closed state that the other path observes. The null handle doubles as
//! the "already released" flag, so the two paths never double-release.

use std::ffi::CString;
use std::io::{self, Write};
use std::os::raw::{c_char, c_int, c_void};
use std::ptr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::ffi::{EngineApi, NativeEngine};

/// Output-capture capacity used by the default session.
pub const DEFAULT_OUTPUT_CAPACITY: usize = 4096;

/// Configuration for opening a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Startup command handed to the engine's `open` entry point. `None`
    /// starts the engine with its built-in default command line.
    pub start_command: Option<String>,

    /// Capacity in bytes of the output-capture buffer. Zero disables
    /// capture entirely: no buffer is registered and `eval` never forwards
    /// any text.
    pub output_capacity: usize,

    /// Ask the engine to hide its window right after open. Only meaningful
    /// on platforms where the engine shows one; best-effort everywhere.
    pub hide_window: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            start_command: None,
            output_capacity: DEFAULT_OUTPUT_CAPACITY,
            hide_window: cfg!(windows),
        }
    }
}

/// One owned connection to the engine process.
///
/// Invariant: the handle is null if and only if the session is closed. The
/// capture buffer lives exactly as long as the handle, so the pointer
/// registered with the engine is never dangling while the connection can
/// still write to it.
pub struct Session {
    api: Arc<dyn EngineApi>,
    /// Native engine handle; null once closed.
    handle: *mut c_void,
    /// Owned capture buffer registered with the engine; one trailing byte
    /// beyond the registered capacity stays zero so a full buffer still
    /// terminates.
    output: Option<Box<[u8]>>,
}

// SAFETY: the handle and the registered buffer pointer are only used
// through `&mut self`, so moving a session to another thread cannot
// introduce overlapping engine calls. The session is still !Sync.
unsafe impl Send for Session {}

impl Session {
    /// Open a session with an output-capture buffer of `output_capacity`
    /// bytes (zero disables capture).
    ///
    /// # Errors
    ///
    /// - [`EngineError::EngineUnavailable`] when the native engine library
    ///   cannot be loaded
    /// - [`EngineError::EngineOpenFailed`] when the engine process could
    ///   not be started
    pub fn open(output_capacity: usize) -> Result<Self, EngineError> {
        Self::open_with(SessionConfig {
            output_capacity,
            ..SessionConfig::default()
        })
    }

    /// Open a session with an explicit [`SessionConfig`].
    pub fn open_with(config: SessionConfig) -> Result<Self, EngineError> {
        Self::open_on(NativeEngine::global()?, config)
    }

    /// Open a session on a caller-supplied [`EngineApi`] implementation.
    ///
    /// This is the seam for embedding an alternative engine transport (or
    /// a mock in tests); [`Session::open_with`] binds the native library.
    pub fn open_on(api: Arc<dyn EngineApi>, config: SessionConfig) -> Result<Self, EngineError> {
        let start_command = match &config.start_command {
            Some(command) => {
                Some(CString::new(command.as_str()).map_err(|_| EngineError::EngineOpenFailed)?)
            }
            None => None,
        };

        let handle = api.open(start_command.as_deref());
        if handle.is_null() {
            return Err(EngineError::EngineOpenFailed);
        }

        let mut session = Session {
            api,
            handle,
            output: None,
        };
        session.register_output_buffer(config.output_capacity);

        if config.hide_window {
            let status = session.api.set_visible(handle, false);
            if status != 0 {
                tracing::debug!(status, "engine ignored the hide-window request");
            }
        }

        Ok(session)
    }

    /// Register (or explicitly disable) the capture buffer. Runs before any
    /// statement executes, so every evaluation on this session captures.
    fn register_output_buffer(&mut self, capacity: usize) {
        if capacity == 0 {
            self.api.register_output_buffer(self.handle, ptr::null_mut(), 0);
            return;
        }

        let mut buffer = vec![0u8; capacity + 1].into_boxed_slice();
        let registered = c_int::try_from(capacity).unwrap_or(c_int::MAX);
        let status = self.api.register_output_buffer(
            self.handle,
            buffer.as_mut_ptr() as *mut c_char,
            registered,
        );
        if status != 0 {
            // The status contract gives this no defined failure semantics;
            // without a registered buffer the engine simply never writes,
            // so capture degrades to forwarding nothing.
            tracing::warn!(status, "engine rejected the output capture buffer");
        }
        self.output = Some(buffer);
    }

    /// Whether the session still holds a live engine connection.
    pub fn is_open(&self) -> bool {
        !self.handle.is_null()
    }

    /// Execute one statement in the session's remote workspace.
    ///
    /// Captured output, if any, is written once to standard output
    /// immediately after execution.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidSession`] when the session is closed
    /// - [`EngineError::Eval`] when the engine connection itself fails
    ///
    /// A syntax or runtime error *inside* the statement is not an error
    /// here: the engine reports those only as captured text, and this
    /// crate preserves that protocol limitation.
    pub fn eval(&mut self, statement: &str) -> Result<(), EngineError> {
        let handle = self.live_handle()?;
        let statement = CString::new(statement).map_err(|_| EngineError::Eval)?;

        // The buffer is overwrite-only: drop any capture left over from the
        // previous statement so it can never be forwarded twice.
        if let Some(buffer) = self.output.as_deref_mut() {
            buffer[0] = 0;
        }

        let status = self.api.eval(handle, &statement);
        if status != 0 {
            return Err(EngineError::Eval);
        }

        self.forward_captured_output();
        Ok(())
    }

    /// Request the engine window shown or hidden. Best-effort: a refusal is
    /// logged, not raised.
    pub fn set_visible(&mut self, visible: bool) -> Result<(), EngineError> {
        let handle = self.live_handle()?;
        let status = self.api.set_visible(handle, visible);
        if status != 0 {
            tracing::debug!(status, visible, "engine ignored the visibility request");
        }
        Ok(())
    }

    /// Shut down the engine connection.
    ///
    /// Idempotent: a second close (or a later drop) is a no-op. A nonzero
    /// native close status is logged, never raised.
    pub fn close(&mut self) {
        if self.handle.is_null() {
            return;
        }
        let status = self.api.close(self.handle);
        if status != 0 {
            tracing::warn!(status, "engine reported an error while closing the session");
        }
        self.handle = ptr::null_mut();
        // Safe to release only now: the engine can no longer write into it.
        self.output = None;
    }

    /// The live handle, or `InvalidSession` after close.
    pub(crate) fn live_handle(&self) -> Result<*mut c_void, EngineError> {
        if self.handle.is_null() {
            Err(EngineError::InvalidSession)
        } else {
            Ok(self.handle)
        }
    }

    pub(crate) fn api(&self) -> &dyn EngineApi {
        self.api.as_ref()
    }

    /// Forward the text captured by the last evaluation to standard output.
    fn forward_captured_output(&mut self) {
        let Some(buffer) = self.output.as_deref() else {
            return;
        };
        let len = buffer.iter().position(|&b| b == 0).unwrap_or(buffer.len());
        if len == 0 {
            return;
        }
        let text = String::from_utf8_lossy(&buffer[..len]);
        let mut stdout = io::stdout().lock();
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}
