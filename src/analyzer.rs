//! Analyzer plumbing shared by both delivery controllers.
//!
//! The analyzer reference and the rotation correction live in their own
//! slots, set by a configuration thread and read by delivery threads. They
//! are deliberately independent of the controller's main lock: a swap takes
//! effect on the next dispatch, and an in-flight dispatch keeps the
//! reference it captured when it started.

use anyhow::Result;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, RwLock};

use crate::frame::Frame;

/// User-supplied analysis callback, invoked on the controller's callback
/// thread with the rotation correction current at dispatch time.
///
/// Invocations are strictly serialized; an implementation is never called
/// concurrently with itself. Errors are logged and swallowed by the
/// dispatch layer and never block frame release.
pub trait Analyzer: Send + Sync {
    fn analyze(&self, frame: &Frame, rotation_degrees: i32) -> Result<()>;
}

/// Single-slot analyzer reference.
pub struct AnalyzerSlot {
    slot: RwLock<Option<Arc<dyn Analyzer>>>,
}

impl AnalyzerSlot {
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(None),
        }
    }

    /// Swap the analyzer. `None` unsubscribes; frames still flow through
    /// release bookkeeping, the analysis step is simply skipped.
    pub fn set(&self, analyzer: Option<Arc<dyn Analyzer>>) {
        *self.slot.write().unwrap() = analyzer;
    }

    pub fn get(&self) -> Option<Arc<dyn Analyzer>> {
        self.slot.read().unwrap().clone()
    }

    pub fn is_set(&self) -> bool {
        self.slot.read().unwrap().is_some()
    }
}

impl Default for AnalyzerSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// Rotation correction in degrees, read at dispatch time.
pub struct RotationCell(AtomicI32);

impl RotationCell {
    pub fn new(degrees: i32) -> Self {
        Self(AtomicI32::new(degrees))
    }

    pub fn set(&self, degrees: i32) {
        self.0.store(degrees, Ordering::Relaxed);
    }

    pub fn get(&self) -> i32 {
        self.0.load(Ordering::Relaxed)
    }
}
