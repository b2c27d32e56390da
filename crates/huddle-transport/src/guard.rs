//! Duplicate-start guard (spec.md §4.2): on reconnect the transport must not
//! re-arm a long-running loop twice. Every supervised loop in
//! `huddle-gateway` wraps its entry point with one of these.

use std::sync::atomic::{AtomicBool, Ordering};

pub struct StartGuard {
    started: AtomicBool,
}

impl StartGuard {
    pub fn new() -> Self {
        Self {
            started: AtomicBool::new(false),
        }
    }

    /// Returns `true` the first time it's called; `false` on every
    /// subsequent call until [`StartGuard::reset`].
    pub fn try_start(&self) -> bool {
        self.started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn reset(&self) {
        self.started.store(false, Ordering::SeqCst);
    }
}

impl Default for StartGuard {
    fn default() -> Self {
        Self::new()
    }
}
