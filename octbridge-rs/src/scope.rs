//! Local frames for host code.
//!
//! Host code that calls into the interpreter normally shares the active
//! frame with whatever called it.  [`Octave::local_scope`] pushes a fresh,
//! empty frame instead and hands back a [`LocalScope`] guard; the frame
//! stack is cut back to its previous depth when the guard drops, whether
//! the block finished, returned early through `?`, or unwound from a panic.
//!
//! [`local_scope`] and [`local_callback`] wrap a whole host function so that
//! every call of it gets its own frame.  Recursive calls therefore see
//! separate locals while the global table stays shared.

use std::ops::{Deref, DerefMut};

use crate::error::BridgeError;
use crate::host::HostValue;
use crate::interp::{Frame, Octave};

/// Guard for a pushed frame.  Derefs to the interpreter.
#[derive(Debug)]
pub struct LocalScope<'a> {
    oct: &'a mut Octave,
    /// Stack depth to restore.
    depth: usize,
}

impl Octave {
    /// Push an empty frame for the lifetime of the returned guard.
    pub fn local_scope(&mut self) -> LocalScope<'_> {
        let depth = self.frame_depth();
        self.push_frame(Frame::default());
        tracing::debug!(depth = depth + 1, "local scope entered");
        LocalScope { oct: self, depth }
    }

    /// Run `f` inside a fresh frame.
    pub fn with_local_scope<R>(&mut self, f: impl FnOnce(&mut Octave) -> R) -> R {
        let mut scope = self.local_scope();
        f(&mut *scope)
    }
}

impl Deref for LocalScope<'_> {
    type Target = Octave;

    fn deref(&self) -> &Octave {
        &*self.oct
    }
}

impl DerefMut for LocalScope<'_> {
    fn deref_mut(&mut self) -> &mut Octave {
        &mut *self.oct
    }
}

impl Drop for LocalScope<'_> {
    fn drop(&mut self) {
        self.oct.truncate_frames(self.depth);
        if std::thread::panicking() {
            tracing::debug!(depth = self.depth, "local scope unwound");
        } else {
            tracing::debug!(depth = self.depth, "local scope left");
        }
    }
}

/// Wrap `f` so that each call runs in a fresh frame.
pub fn local_scope<A, R, F>(f: F) -> impl Fn(&mut Octave, A) -> R
where
    F: Fn(&mut Octave, A) -> R,
{
    move |oct: &mut Octave, arg: A| oct.with_local_scope(|oct| f(oct, arg))
}

/// [`local_scope`] for host callbacks, whose argument slice borrows from
/// the caller.  The result can be passed to [`Octave::register_function`].
pub fn local_callback<F>(
    f: F,
) -> impl Fn(&mut Octave, &[HostValue]) -> Result<Vec<HostValue>, BridgeError> + Send + Sync + 'static
where
    F: Fn(&mut Octave, &[HostValue]) -> Result<Vec<HostValue>, BridgeError> + Send + Sync + 'static,
{
    move |oct: &mut Octave, args: &[HostValue]| oct.with_local_scope(|oct| f(oct, args))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    #[test]
    fn frame_is_fresh_and_popped() {
        let mut oct = Octave::new();
        oct.locals().set("x", 1).unwrap();
        {
            let mut scope = oct.local_scope();
            assert_eq!(scope.frame_depth(), 2);
            assert!(!scope.locals().contains("x"));
            scope.locals().set("x", 2).unwrap();
        }
        assert_eq!(oct.frame_depth(), 1);
        assert_eq!(oct.locals().get_value("x").unwrap(), Value::double(1.0));
    }

    #[test]
    fn early_return_pops() {
        fn fails(oct: &mut Octave) -> Result<(), BridgeError> {
            let mut scope = oct.local_scope();
            scope.locals().set("bad name", 1)?;
            Ok(())
        }
        let mut oct = Octave::new();
        assert!(fails(&mut oct).is_err());
        assert_eq!(oct.frame_depth(), 1);
    }

    #[test]
    fn panic_pops() {
        let mut oct = Octave::new();
        let result = catch_unwind(AssertUnwindSafe(|| {
            oct.with_local_scope(|_| panic!("boom"));
        }));
        assert!(result.is_err());
        assert_eq!(oct.frame_depth(), 1);
    }

    #[test]
    fn globals_are_shared() {
        let mut oct = Octave::new();
        oct.with_local_scope(|oct| oct.globals().set("g", 7)).unwrap();
        assert_eq!(oct.globals().get_value("g").unwrap(), Value::double(7.0));
    }

    #[test]
    fn wrapped_function_gets_own_frame() {
        let depth_of = local_scope(|oct: &mut Octave, extra: usize| oct.frame_depth() + extra);
        let mut oct = Octave::new();
        assert_eq!(depth_of(&mut oct, 10), 12);
        assert_eq!(oct.frame_depth(), 1);
    }
}
