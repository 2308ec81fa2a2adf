//! Error types for engine sessions and remote calls.
//!
//! The native engine library reports failures through an opaque status-code
//! contract (0 = success, nonzero = failure) or null handles; this module
//! maps those into one error kind per operation. Remote-side statement
//! errors (an undefined function, a syntax error in the evaluated text) are
//! deliberately NOT represented here - the engine only surfaces them as
//! captured output text, and this crate preserves that protocol limitation.

use thiserror::Error;

use crate::ident::InvalidName;

/// Errors raised by session, variable, and remote-call operations.
///
/// Every variant is terminal to the operation that raised it and propagates
/// to the immediate caller; there is no automatic retry or reconnect.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The native engine library could not be loaded.
    #[error("engine library unavailable: {0}")]
    EngineUnavailable(String),

    /// The engine process could not be started.
    #[error("engine process could not be started")]
    EngineOpenFailed,

    /// The session has been closed and its handle is no longer valid.
    #[error("session is closed")]
    InvalidSession,

    /// The engine connection failed while evaluating a statement.
    ///
    /// This means the call itself failed at the session level (e.g. a dead
    /// connection) - not that the statement misbehaved remotely.
    #[error("engine connection failed while evaluating a statement")]
    Eval,

    /// The engine rejected a variable write into the remote workspace.
    #[error("engine rejected variable write: {name}")]
    PutVariable {
        /// The workspace name the write targeted.
        name: String,
    },

    /// The requested name is not defined in the remote workspace.
    #[error("variable is not defined in the remote workspace: {name}")]
    GetVariable {
        /// The workspace name that was looked up.
        name: String,
    },

    /// A caller-supplied symbol failed engine identifier validation.
    #[error(transparent)]
    InvalidName(#[from] InvalidName),
}
