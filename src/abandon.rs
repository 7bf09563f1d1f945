//! Caller-side abandonment of in-progress work.
//!
//! Abandoning never aborts a network call that is already in flight; the
//! owner checks the token at its next suspension point and discards whatever
//! the call produced.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct AbandonToken {
    flag: Arc<AtomicBool>,
}

impl AbandonToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abandon(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_abandoned(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
