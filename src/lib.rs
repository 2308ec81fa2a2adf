//! mexlink - host-side bridge to an external matrix-computation engine.
//!
//! The engine is a separate process exposing only two primitives: evaluate
//! a statement string, and exchange named array variables. This crate
//! manages that connection and layers function-call semantics on top:
//!
//! ```text
//! ┌──────────────┐   eval / put / get    ┌───────────────────────┐
//! │ Host process │ ◄────────────────────►│ engine process        │
//! │  (Session)   │   engine C library    │  (remote workspace)   │
//! └──────────────┘                       └───────────────────────┘
//! ```
//!
//! - `session` - connection lifecycle, statement evaluation, and
//!   output-capture forwarding
//! - `variables` - named-variable exchange with opaque array handles
//! - `call` - `mxcall`, simulating `result = f(args...)` over the two
//!   primitives
//! - `registry` - a process-wide default session for hosts that only ever
//!   talk to one engine
//! - `ffi` - the native engine library, loaded at runtime behind the
//!   [`EngineApi`] trait
//!
//! # Usage
//!
//! ```ignore
//! use mexlink::{Session, MxArray};
//!
//! let mut session = Session::open(4096)?;
//! session.eval("x = magic(4);")?;           // prints captured output
//! let x = session.get_variable("x")?;        // opaque array handle
//! let outputs = session.mxcall("sum", 1, &[&x])?;
//! session.close();
//! ```
//!
//! Or through the default session:
//!
//! ```ignore
//! mexlink::eval("disp('hello')")?;
//! mexlink::close_default_session();
//! ```

pub mod error;
pub mod ffi;
pub mod ident;
pub mod registry;
pub mod session;
pub mod variables;

mod call;

#[cfg(test)]
mod test_support;

pub use error::EngineError;
pub use ffi::{EngineApi, NativeEngine};
pub use ident::{InvalidName, VarName};
pub use registry::{
    close_default_session, default_registry, eval, get_variable, mxcall, put_variable,
    restart_default_session, SessionRegistry,
};
pub use session::{Session, SessionConfig, DEFAULT_OUTPUT_CAPACITY};
pub use variables::MxArray;
