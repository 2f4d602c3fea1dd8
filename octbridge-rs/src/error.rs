//! Bridge error taxonomy.
//!
//! Every fault that crosses the host/interpreter boundary is a
//! [`BridgeError`].  Callers that only care about the category can match on
//! [`BridgeError::kind`].

use crate::interp::{ParseError, RuntimeError};

/// A fault raised across the bridge.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BridgeError {
    /// The code handed to `eval` did not parse.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The interpreter raised an error while executing.
    #[error(transparent)]
    Octave(#[from] RuntimeError),

    /// An interpreter value has no host representation.
    #[error("{0}")]
    ValueConvert(String),

    /// A host value has no interpreter representation.
    #[error("{0}")]
    ObjectConvert(String),

    /// A variable name failed the identifier grammar.
    #[error("invalid variable name: '{0}'")]
    VarName(String),

    /// Lookup or removal of an unbound variable.
    #[error("key not found: '{0}'")]
    KeyNotFound(String),

    /// A workspace key of the wrong host type.
    #[error("wrong type: {0}")]
    Type(String),

    /// The process-wide interpreter has not been started.
    #[error("interpreter is not initialized")]
    NotInitialized,

    /// The process-wide interpreter is already in use on this thread.
    #[error("interpreter is busy: nested access must go through the callback's handle")]
    Busy,
}

/// Category of a [`BridgeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Parse,
    Octave,
    ValueConvert,
    ObjectConvert,
    VarName,
    KeyNotFound,
    Type,
    NotInitialized,
    Busy,
}

impl BridgeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::Parse(_) => ErrorKind::Parse,
            BridgeError::Octave(_) => ErrorKind::Octave,
            BridgeError::ValueConvert(_) => ErrorKind::ValueConvert,
            BridgeError::ObjectConvert(_) => ErrorKind::ObjectConvert,
            BridgeError::VarName(_) => ErrorKind::VarName,
            BridgeError::KeyNotFound(_) => ErrorKind::KeyNotFound,
            BridgeError::Type(_) => ErrorKind::Type,
            BridgeError::NotInitialized => ErrorKind::NotInitialized,
            BridgeError::Busy => ErrorKind::Busy,
        }
    }

    /// Message identifier of an interpreter fault, if it carried one.
    pub fn identifier(&self) -> Option<&str> {
        match self {
            BridgeError::Octave(e) => e.identifier.as_deref(),
            _ => None,
        }
    }
}

/// Convert a host-callback fault into an interpreter error so that
/// interpreter code can catch it.
impl From<BridgeError> for RuntimeError {
    fn from(e: BridgeError) -> Self {
        match e {
            BridgeError::Octave(inner) => inner,
            other => RuntimeError::with_id("octbridge:host-error", other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds() {
        assert_eq!(BridgeError::VarName("1x".into()).kind(), ErrorKind::VarName);
        assert_eq!(BridgeError::Busy.kind(), ErrorKind::Busy);
        let e: BridgeError = RuntimeError::with_id("a:b", "boom").into();
        assert_eq!(e.kind(), ErrorKind::Octave);
        assert_eq!(e.identifier(), Some("a:b"));
    }

    #[test]
    fn host_fault_becomes_runtime_error() {
        let r: RuntimeError = BridgeError::KeyNotFound("x".into()).into();
        assert_eq!(r.identifier.as_deref(), Some("octbridge:host-error"));
        assert_eq!(r.message, "key not found: 'x'");
        let inner = RuntimeError::new("kept");
        let back: RuntimeError = BridgeError::Octave(inner.clone()).into();
        assert_eq!(back, inner);
    }
}
