//! Variable frames.
//!
//! A [`Frame`] holds one scope's local variables.  Names declared `global`
//! in a frame are not stored locally; reads and writes go to the
//! interpreter's global table instead.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;

use super::ast::FunctionDef;
use crate::value::Value;

/// Functions private to one source file.
pub type Subfunctions = Arc<IndexMap<String, Arc<FunctionDef>>>;

#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub vars: IndexMap<String, Value>,
    /// Names linked to the global table in this frame.
    pub global_names: HashSet<String>,
    /// Set for user-function frames.
    pub call: Option<CallInfo>,
    /// Subfunctions visible from this frame's code.
    pub subfunctions: Option<Subfunctions>,
}

/// Call metadata for a user-function frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallInfo {
    pub function: String,
    pub nargin: usize,
    pub nargout: usize,
}

impl Frame {
    pub fn for_call(function: &str, nargin: usize, nargout: usize) -> Self {
        Frame {
            call: Some(CallInfo { function: function.to_owned(), nargin, nargout }),
            ..Frame::default()
        }
    }

    pub fn is_global(&self, name: &str) -> bool {
        self.global_names.contains(name)
    }

    /// Local variable names, in definition order.
    pub fn local_names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_frames_carry_metadata() {
        let f = Frame::for_call("fact", 1, 1);
        assert_eq!(f.call.as_ref().map(|c| c.function.as_str()), Some("fact"));
        assert!(Frame::default().call.is_none());
    }

    #[test]
    fn listing_keeps_order() {
        let mut f = Frame::default();
        f.vars.insert("b".into(), Value::double(1.0));
        f.vars.insert("a".into(), Value::double(2.0));
        assert_eq!(f.local_names().collect::<Vec<_>>(), vec!["b", "a"]);
    }
}
