//! Server-driven flow control for the outbound write path.
//!
//! The gateway can ask the client to stop writing (`S`) and to continue
//! (`Q`).  While the gate is engaged its single permit is held, so every
//! writer that passes through [`FlowGate::pass`] waits.  Engage and
//! disengage are idempotent: repeated pauses do not stack and repeated
//! resumes do not mint extra permits.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Semaphore, SemaphorePermit};

/// Binary gate guarding frame writes.
#[derive(Debug)]
pub struct FlowGate {
    permits: Semaphore,
    engaged: AtomicBool,
}

impl Default for FlowGate {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowGate {
    /// Creates an open gate.
    pub fn new() -> Self {
        Self {
            permits: Semaphore::new(1),
            engaged: AtomicBool::new(false),
        }
    }

    /// Returns `true` while writes are paused.
    pub fn is_engaged(&self) -> bool {
        self.engaged.load(Ordering::Acquire)
    }

    /// Closes the gate.  Returns `false` if it was already engaged.
    ///
    /// Waits for an in-flight write to finish before taking the permit.
    pub async fn engage(&self) -> bool {
        if self.engaged.swap(true, Ordering::AcqRel) {
            return false;
        }
        // The semaphore is never closed, so acquire cannot fail.
        if let Ok(permit) = self.permits.acquire().await {
            permit.forget();
        }
        true
    }

    /// Opens the gate.  Returns `false` if it was not engaged.
    pub fn disengage(&self) -> bool {
        if !self.engaged.swap(false, Ordering::AcqRel) {
            return false;
        }
        self.permits.add_permits(1);
        true
    }

    /// Waits until the gate is open and holds it open for as long as the
    /// returned permit lives.
    pub async fn pass(&self) -> Option<SemaphorePermit<'_>> {
        self.permits.acquire().await.ok()
    }
}
