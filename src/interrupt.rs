//! Cooperative interruption
//!
//! The lattice search owns an [`InterruptFlag`] and may raise it from any
//! thread. Every long-running loop in this crate polls it at class/row
//! granularity and aborts with [`Error::Interrupted`] instead of producing a
//! partial verdict.

use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Number of inner-loop iterations between two interrupt polls.
pub const CHECK_INTERVAL: usize = 1024;

/// Shared, cloneable interrupt flag.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag {
    raised: Arc<AtomicBool>,
}

impl InterruptFlag {
    /// Create a new, lowered flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that all computations observing this flag stop.
    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    /// Lower the flag so the next job can run.
    pub fn clear(&self) {
        self.raised.store(false, Ordering::SeqCst);
    }

    /// Whether an interrupt was requested.
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Relaxed)
    }

    /// Fail with [`Error::Interrupted`] if the flag is raised.
    pub fn check(&self) -> Result<()> {
        if self.is_raised() {
            Err(Error::Interrupted)
        } else {
            Ok(())
        }
    }

    /// Poll only every [`CHECK_INTERVAL`] iterations of an inner loop.
    pub fn check_every(&self, iteration: usize) -> Result<()> {
        if iteration % CHECK_INTERVAL == 0 {
            self.check()
        } else {
            Ok(())
        }
    }
}
