//! The process-wide interpreter.
//!
//! Hosts that cannot thread an [`Octave`] value through their own code (a
//! scripting-language extension module, for instance) use the single
//! instance kept here.  It is created by [`init`], reached through
//! [`with_octave`] and dropped by [`shutdown`].
//!
//! Access is serialised by a reentrant lock: another thread blocks until
//! the current call finishes, while a nested [`with_octave`] on the same
//! thread fails with [`BridgeError::Busy`].  Code running inside a call
//! already holds `&mut Octave` and must use that instead.

use std::cell::RefCell;

use parking_lot::{const_reentrant_mutex, ReentrantMutex};

use crate::error::BridgeError;
use crate::interp::Octave;

static INSTANCE: ReentrantMutex<RefCell<Option<Octave>>> = const_reentrant_mutex(RefCell::new(None));

/// Start the shared interpreter with default settings.  Does nothing if
/// one is already running.
pub fn init() -> Result<(), BridgeError> {
    let guard = INSTANCE.lock();
    let mut slot = guard.try_borrow_mut().map_err(|_| BridgeError::Busy)?;
    if slot.is_none() {
        *slot = Some(Octave::new());
        tracing::debug!("shared interpreter started");
    }
    Ok(())
}

/// Install `oct` as the shared interpreter, returning the one it replaces.
pub fn init_with(oct: Octave) -> Result<Option<Octave>, BridgeError> {
    let guard = INSTANCE.lock();
    let mut slot = guard.try_borrow_mut().map_err(|_| BridgeError::Busy)?;
    tracing::debug!(replaced = slot.is_some(), "shared interpreter installed");
    Ok(slot.replace(oct))
}

/// Run `f` with exclusive access to the shared interpreter.
pub fn with_octave<R>(f: impl FnOnce(&mut Octave) -> R) -> Result<R, BridgeError> {
    let guard = INSTANCE.lock();
    let mut slot = guard.try_borrow_mut().map_err(|_| {
        tracing::debug!("nested access to the shared interpreter refused");
        BridgeError::Busy
    })?;
    let oct = slot.as_mut().ok_or(BridgeError::NotInitialized)?;
    Ok(f(oct))
}

/// Drop the shared interpreter.  Returns whether one was running.
pub fn shutdown() -> Result<bool, BridgeError> {
    let guard = INSTANCE.lock();
    let mut slot = guard.try_borrow_mut().map_err(|_| BridgeError::Busy)?;
    let was_running = slot.take().is_some();
    if was_running {
        tracing::debug!("shared interpreter stopped");
    }
    Ok(was_running)
}

pub fn is_initialized() -> bool {
    let guard = INSTANCE.lock();
    // Borrowed means a call is in flight on this thread, so it exists.
    guard.try_borrow().map_or(true, |slot| slot.is_some())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::host::HostValue;

    /// Serialises tests that touch the shared instance.
    pub(crate) static TEST_MX: parking_lot::Mutex<()> = parking_lot::const_mutex(());

    #[test]
    fn lifecycle() {
        let _lock = TEST_MX.lock();
        shutdown().unwrap();
        assert!(!is_initialized());
        assert_eq!(with_octave(|_| ()).unwrap_err().kind(), ErrorKind::NotInitialized);
        init().unwrap();
        assert!(is_initialized());
        with_octave(|oct| oct.locals().set("kept", 1)).unwrap().unwrap();
        init().unwrap();
        let kept = with_octave(|oct| oct.locals().contains("kept")).unwrap();
        assert!(kept);
        assert!(shutdown().unwrap());
        assert!(!shutdown().unwrap());
    }

    #[test]
    fn nested_access_is_busy() {
        let _lock = TEST_MX.lock();
        init().unwrap();
        let inner = with_octave(|_| {
            assert!(is_initialized());
            with_octave(|_| ()).unwrap_err().kind()
        })
        .unwrap();
        assert_eq!(inner, ErrorKind::Busy);
        shutdown().unwrap();
    }

    #[test]
    fn callbacks_use_their_handle() {
        let _lock = TEST_MX.lock();
        let mut oct = Octave::new();
        oct.register_function("lock_state", |oct, _| {
            let nested = with_octave(|_| ()).is_err();
            let depth = oct.frame_depth() as f64;
            Ok(vec![HostValue::Bool(nested), HostValue::Float(depth)])
        })
        .unwrap();
        init_with(oct).unwrap();
        let out = with_octave(|oct| oct.eval(2, "[busy, depth] = lock_state()")).unwrap().unwrap();
        assert_eq!(out[0].as_f64(), Some(1.0));
        assert_eq!(out[1].as_f64(), Some(1.0));
        shutdown().unwrap();
    }

    #[test]
    fn other_threads_wait() {
        let _lock = TEST_MX.lock();
        init().unwrap();
        let workers: Vec<_> = (0..4)
            .map(|i| {
                std::thread::spawn(move || {
                    with_octave(|oct| oct.eval(0, &format!("global hits; hits = [hits {i}];")))
                        .unwrap()
                        .unwrap();
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }
        let n = with_octave(|oct| oct.eval(1, "numel(hits)")).unwrap().unwrap();
        assert_eq!(n[0].as_f64(), Some(4.0));
        shutdown().unwrap();
    }
}
