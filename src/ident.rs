//! Validated engine identifiers.
//!
//! Workspace variable names and function symbols are interpolated verbatim
//! into statements sent to the engine, so anything that is not a valid
//! engine identifier would corrupt the statement. `VarName` checks the
//! engine's rules once, at construction. Note the engine reserves names
//! beginning with an underscore; those are rejected here rather than at
//! call time.

use std::fmt;

use thiserror::Error;

/// A name rejected by [`VarName::new`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid engine variable name {name:?}: {reason}")]
pub struct InvalidName {
    /// The rejected name, verbatim.
    pub name: String,
    /// Why it was rejected.
    pub reason: &'static str,
}

/// A validated engine identifier: a letter followed by letters, digits, or
/// underscores.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VarName(String);

impl VarName {
    /// Validate `name` against the engine's identifier rules.
    pub fn new(name: impl Into<String>) -> Result<Self, InvalidName> {
        let name = name.into();
        match validate(&name) {
            None => Ok(Self(name)),
            Some(reason) => Err(InvalidName { name, reason }),
        }
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wrap a name this crate generated itself.
    ///
    /// Generated temporaries are valid by construction (they start with a
    /// fixed alphabetic prefix and splice in an already-validated symbol),
    /// so this skips re-validation.
    pub(crate) fn from_generated(name: String) -> Self {
        debug_assert!(validate(&name).is_none(), "generated name {name:?} is invalid");
        Self(name)
    }
}

impl fmt::Display for VarName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn validate(name: &str) -> Option<&'static str> {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Some("name is empty");
    };
    if first == '_' {
        return Some("leading underscore is reserved by the engine");
    }
    if !first.is_ascii_alphabetic() {
        return Some("name must start with a letter");
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Some("name may contain only letters, digits, and underscores");
    }
    None
}
