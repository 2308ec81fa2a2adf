//! Process-wide default session.
//!
//! Hosts that only ever talk to one engine should not have to thread a
//! [`Session`] through every call site. A [`SessionRegistry`] holds at most
//! one live session behind a mutex, creating it lazily on first use; the
//! crate keeps a single static registry bound to the native library, with
//! convenience functions re-exported at the crate root.
//!
//! The mutex guards the whole read-check-create sequence, so concurrent
//! first use opens exactly one session - and doubles as the per-session
//! lock the engine connection needs, since every default-session operation
//! runs under it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::EngineError;
use crate::ffi::{EngineApi, NativeEngine};
use crate::session::{Session, SessionConfig};
use crate::variables::MxArray;

/// A mutex-guarded slot holding at most one live [`Session`].
pub struct SessionRegistry {
    /// Engine the slot's sessions are opened on; `None` binds the native
    /// library, loaded lazily on first use.
    engine: Option<Arc<dyn EngineApi>>,
    slot: Mutex<Option<Session>>,
}

impl SessionRegistry {
    /// A registry bound to the native engine library.
    pub const fn new() -> Self {
        Self {
            engine: None,
            slot: Mutex::new(None),
        }
    }

    /// A registry bound to a caller-supplied [`EngineApi`] implementation.
    pub fn with_engine(engine: Arc<dyn EngineApi>) -> Self {
        Self {
            engine: Some(engine),
            slot: Mutex::new(None),
        }
    }

    fn engine(&self) -> Result<Arc<dyn EngineApi>, EngineError> {
        match &self.engine {
            Some(api) => Ok(Arc::clone(api)),
            None => NativeEngine::global(),
        }
    }

    fn lock_slot(&self) -> MutexGuard<'_, Option<Session>> {
        // A poisoned lock only means another thread panicked mid-call; the
        // slot itself is still structurally sound.
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against the default session, opening one with
    /// [`SessionConfig::default`] if the slot is empty or holds a closed
    /// session.
    pub fn with_session<T>(
        &self,
        f: impl FnOnce(&mut Session) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let mut slot = self.lock_slot();
        if slot.as_ref().map_or(true, |session| !session.is_open()) {
            *slot = Some(Session::open_on(self.engine()?, SessionConfig::default())?);
        }
        match slot.as_mut() {
            Some(session) => f(session),
            // Unreachable: the slot was populated above.
            None => Err(EngineError::InvalidSession),
        }
    }

    /// Replace the default session: close the stored one if live, then
    /// open and store a fresh session capturing `output_capacity` bytes.
    ///
    /// On success exactly one live default session exists. If the open
    /// fails the slot is left empty and the error propagates.
    pub fn restart(&self, output_capacity: usize) -> Result<(), EngineError> {
        let engine = self.engine()?;
        let mut slot = self.lock_slot();
        if let Some(mut previous) = slot.take() {
            previous.close();
        }
        let config = SessionConfig {
            output_capacity,
            ..SessionConfig::default()
        };
        *slot = Some(Session::open_on(engine, config)?);
        Ok(())
    }

    /// Close the stored default session, if any, and clear the slot.
    /// Idempotent.
    pub fn close(&self) {
        if let Some(mut session) = self.lock_slot().take() {
            session.close();
        }
    }

    /// Whether the slot currently holds a live session.
    pub fn is_active(&self) -> bool {
        self.lock_slot().as_ref().is_some_and(Session::is_open)
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static DEFAULT_SESSION: SessionRegistry = SessionRegistry::new();

/// The process-wide default-session registry, bound to the native engine
/// library.
pub fn default_registry() -> &'static SessionRegistry {
    &DEFAULT_SESSION
}

/// [`Session::eval`] on the default session.
pub fn eval(statement: &str) -> Result<(), EngineError> {
    DEFAULT_SESSION.with_session(|session| session.eval(statement))
}

/// [`Session::put_variable`] on the default session.
pub fn put_variable(name: &str, value: &MxArray) -> Result<(), EngineError> {
    DEFAULT_SESSION.with_session(|session| session.put_variable(name, value))
}

/// [`Session::get_variable`] on the default session.
pub fn get_variable(name: &str) -> Result<MxArray, EngineError> {
    DEFAULT_SESSION.with_session(|session| session.get_variable(name))
}

/// [`Session::mxcall`] on the default session.
pub fn mxcall(fun: &str, nout: usize, inputs: &[&MxArray]) -> Result<Vec<MxArray>, EngineError> {
    DEFAULT_SESSION.with_session(|session| session.mxcall(fun, nout, inputs))
}

/// [`SessionRegistry::restart`] on the default registry.
pub fn restart_default_session(output_capacity: usize) -> Result<(), EngineError> {
    DEFAULT_SESSION.restart(output_capacity)
}

/// [`SessionRegistry::close`] on the default registry.
pub fn close_default_session() {
    DEFAULT_SESSION.close();
}
