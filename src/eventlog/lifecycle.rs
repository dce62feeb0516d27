//! End-of-session hook slot
//!
//! The host has exactly one slot. Installing replaces whatever was there,
//! and firing takes the installed callback out so it runs at most once.

use std::sync::{Mutex, PoisonError};

type HookFn = Box<dyn FnOnce() + Send>;

#[derive(Default)]
pub struct ShutdownHook {
    slot: Mutex<Option<HookFn>>,
}

impl ShutdownHook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `hook`, replacing any previous one (last writer wins)
    pub fn install<F>(&self, hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            log::debug!("Replacing previously installed shutdown hook");
        }
        *slot = Some(Box::new(hook));
    }

    pub fn is_installed(&self) -> bool {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// Run the installed hook, if any. Returns whether one ran.
    pub fn fire(&self) -> bool {
        // Take under the lock, run outside it so the hook may reinstall.
        let hook = self.slot.lock().unwrap_or_else(PoisonError::into_inner).take();
        match hook {
            Some(hook) => {
                log::info!("Firing shutdown hook");
                hook();
                true
            }
            None => false,
        }
    }
}
