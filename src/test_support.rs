//! Helpers shared by unit tests.

use std::ffi::OsString;
use std::sync::{Mutex, MutexGuard};

/// Serializes tests that touch process-wide environment variables.
static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Sets or removes environment variables for one test and restores the
/// previous values on drop. Holds `ENV_MUTEX` while alive.
pub(crate) struct EnvGuard {
    saved: Vec<(String, Option<OsString>)>,
    _lock: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// `None` removes the variable.
    pub(crate) fn new(vars: &[(&str, Option<&str>)]) -> Self {
        let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        let mut saved = Vec::with_capacity(vars.len());
        for &(key, value) in vars {
            saved.push((key.to_string(), std::env::var_os(key)));
            // SAFETY: ENV_MUTEX is held; no other test reads or writes the environment.
            unsafe {
                match value {
                    Some(v) => std::env::set_var(key, v),
                    None => std::env::remove_var(key),
                }
            }
        }
        Self { saved, _lock: lock }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in self.saved.drain(..) {
            // SAFETY: ENV_MUTEX is still held; it is released after this body.
            unsafe {
                match value {
                    Some(v) => std::env::set_var(&key, v),
                    None => std::env::remove_var(&key),
                }
            }
        }
    }
}
