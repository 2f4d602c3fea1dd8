//! Variable tables as host-side mappings.
//!
//! A [`Workspace`] borrows an interpreter and exposes one of its variable
//! tables: the active frame ([`Scope::Local`]) or the global table
//! ([`Scope::Global`]).  Values cross the boundary through the marshaller,
//! so reads and writes always copy.
//!
//! Two key protocols are offered.  The typed one (`get`, `set`, ...) takes
//! `&str`; the dynamic one (`get_item`, `set_item`, ...) takes a
//! [`HostValue`] key, for hosts whose mapping keys are untyped.  A key that
//! is not text fails with [`BridgeError::Type`] before its spelling is
//! looked at.

use crate::error::BridgeError;
use crate::host::HostValue;
use crate::interp::{is_identifier, Octave};
use crate::marshal;
use crate::value::Value;

/// Which variable table a [`Workspace`] addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// The active frame.  Names declared `global` in it follow their link.
    Local,
    /// The interpreter-wide global table.
    Global,
}

/// A mapping view over one variable table.
#[derive(Debug)]
pub struct Workspace<'a> {
    oct: &'a mut Octave,
    scope: Scope,
}

impl Octave {
    /// The variables of the active frame.
    pub fn locals(&mut self) -> Workspace<'_> {
        Workspace::new(self, Scope::Local)
    }

    /// The global variables.
    pub fn globals(&mut self) -> Workspace<'_> {
        Workspace::new(self, Scope::Global)
    }
}

impl<'a> Workspace<'a> {
    pub fn new(oct: &'a mut Octave, scope: Scope) -> Self {
        Workspace { oct, scope }
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    // ── Typed keys ────────────────────────────────────────────────────────────

    /// Read a variable, converted to a host value.
    pub fn get(&self, name: &str) -> Result<HostValue, BridgeError> {
        let value = self.get_value(name)?;
        marshal::to_host(&value)
    }

    /// Read a variable without conversion.
    pub fn get_value(&self, name: &str) -> Result<Value, BridgeError> {
        self.raw(name)
            .cloned()
            .ok_or_else(|| BridgeError::KeyNotFound(name.to_owned()))
    }

    /// Bind (or rebind) a variable to a converted host value.
    pub fn set(&mut self, name: &str, value: impl Into<HostValue>) -> Result<(), BridgeError> {
        check_name(name)?;
        let value = marshal::to_interp(&value.into())?;
        self.store(name, value);
        Ok(())
    }

    /// Bind a variable to an interpreter value as-is.
    pub fn set_value(&mut self, name: &str, value: Value) -> Result<(), BridgeError> {
        check_name(name)?;
        self.store(name, value);
        Ok(())
    }

    /// Unbind a variable.
    pub fn delete(&mut self, name: &str) -> Result<(), BridgeError> {
        let removed = match self.scope {
            Scope::Local => self.oct.is_variable(name) && self.oct.clear_variable(name),
            Scope::Global => self.oct.globals.shift_remove(name).is_some(),
        };
        if removed {
            tracing::trace!(scope = ?self.scope, name, "variable deleted");
            Ok(())
        } else {
            Err(BridgeError::KeyNotFound(name.to_owned()))
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.raw(name).is_some()
    }

    /// Bound names, in definition order.
    pub fn names(&self) -> Vec<String> {
        match self.scope {
            Scope::Local => self
                .oct
                .visible_names()
                .into_iter()
                .filter(|n| self.oct.is_variable(n))
                .collect(),
            Scope::Global => self.oct.globals.keys().cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.names().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ── Dynamic keys ──────────────────────────────────────────────────────────

    pub fn get_item(&self, key: &HostValue) -> Result<HostValue, BridgeError> {
        self.get(key_text(key)?)
    }

    pub fn set_item(&mut self, key: &HostValue, value: impl Into<HostValue>) -> Result<(), BridgeError> {
        let name = key_text(key)?;
        self.set(name, value)
    }

    pub fn del_item(&mut self, key: &HostValue) -> Result<(), BridgeError> {
        self.delete(key_text(key)?)
    }

    /// Membership test for an untyped key.  A non-text key is a fault
    /// rather than `false`.
    pub fn contains_item(&self, key: &HostValue) -> Result<bool, BridgeError> {
        Ok(self.contains(key_text(key)?))
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn raw(&self, name: &str) -> Option<&Value> {
        match self.scope {
            Scope::Local => self.oct.lookup(name),
            Scope::Global => self.oct.globals.get(name),
        }
    }

    fn store(&mut self, name: &str, value: Value) {
        tracing::trace!(scope = ?self.scope, name, class = value.class_name(), "variable set");
        match self.scope {
            Scope::Local => self.oct.assign(name, value),
            Scope::Global => {
                self.oct.globals.insert(name.to_owned(), value);
            }
        }
    }
}

fn check_name(name: &str) -> Result<(), BridgeError> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(BridgeError::VarName(name.to_owned()))
    }
}

fn key_text(key: &HostValue) -> Result<&str, BridgeError> {
    key.as_text().ok_or_else(|| {
        BridgeError::Type(format!("variable names must be str, not {}", key.type_name()))
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
