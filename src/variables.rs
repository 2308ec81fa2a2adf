//! Named-variable exchange with the remote workspace.
//!
//! Values cross the boundary as opaque array handles ([`MxArray`]); the
//! conversion between native values and that representation belongs to the
//! host's array-marshaling layer, not to this crate. Names are used
//! verbatim - no escaping or validation happens here, callers must supply
//! valid engine identifiers (see [`crate::ident::VarName`] for a checked
//! type).

use std::ffi::CString;
use std::os::raw::c_void;
use std::ptr::NonNull;

use crate::error::EngineError;
use crate::session::Session;

/// An opaque handle to an engine-native array value.
///
/// A handle returned by [`Session::get_variable`] is owned by the caller,
/// who must release it through the array-marshaling layer; `MxArray`
/// itself never frees anything. Use [`MxArray::into_raw`] to hand the
/// pointer to that layer.
#[derive(Debug)]
pub struct MxArray {
    ptr: NonNull<c_void>,
}

impl MxArray {
    /// Wrap a raw array pointer produced by the engine or the marshaling
    /// layer. Returns `None` for a null pointer.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or point to a live engine array value.
    pub unsafe fn from_raw(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| Self { ptr })
    }

    /// The raw array pointer, still owned by this handle.
    pub fn as_ptr(&self) -> *mut c_void {
        self.ptr.as_ptr()
    }

    /// Unwrap into the raw array pointer, transferring ownership to the
    /// caller (normally on its way into the marshaling layer's release).
    pub fn into_raw(self) -> *mut c_void {
        self.ptr.as_ptr()
    }

    pub(crate) fn from_engine(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| Self { ptr })
    }
}

impl Session {
    /// Write `value` into the remote workspace under `name`.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidSession`] when the session is closed
    /// - [`EngineError::PutVariable`] when the engine rejects the write
    ///   (an invalid name, a dead connection)
    pub fn put_variable(&mut self, name: &str, value: &MxArray) -> Result<(), EngineError> {
        let handle = self.live_handle()?;
        let c_name = CString::new(name).map_err(|_| EngineError::PutVariable {
            name: name.to_string(),
        })?;
        let status = self.api().put_variable(handle, &c_name, value.as_ptr());
        if status != 0 {
            return Err(EngineError::PutVariable {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Fetch the value bound to `name` in the remote workspace.
    ///
    /// Ownership of the returned handle transfers to the caller; release
    /// goes through the array-marshaling layer.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidSession`] when the session is closed
    /// - [`EngineError::GetVariable`] when `name` is undefined remotely
    pub fn get_variable(&mut self, name: &str) -> Result<MxArray, EngineError> {
        let handle = self.live_handle()?;
        let c_name = CString::new(name).map_err(|_| EngineError::GetVariable {
            name: name.to_string(),
        })?;
        let ptr = self.api().get_variable(handle, &c_name);
        MxArray::from_engine(ptr).ok_or_else(|| EngineError::GetVariable {
            name: name.to_string(),
        })
    }

    /// Write an ordered list of `(name, value)` pairs, in slice order,
    /// stopping at the first rejected pair.
    pub fn put_variables(&mut self, variables: &[(&str, &MxArray)]) -> Result<(), EngineError> {
        for (name, value) in variables {
            self.put_variable(name, value)?;
        }
        Ok(())
    }

    /// Fetch an ordered list of names, in slice order, stopping at the
    /// first undefined one.
    pub fn get_variables(&mut self, names: &[&str]) -> Result<Vec<MxArray>, EngineError> {
        let mut values = Vec::with_capacity(names.len());
        for name in names {
            values.push(self.get_variable(name)?);
        }
        Ok(values)
    }
}
