//! Cooperative cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A cancellation signal shared between a decode call and its caller.
///
/// Setting the token aborts pending work as soon as a slice checks in;
/// in-flight slices finish their current unit but do not start another.
/// There are no internal timeouts; deadlines are the caller's business.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of the work holding this token.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Rearm the token for the next decode call.
    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}
