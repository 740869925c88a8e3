use crate::error::NarrationError;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// Shared flag flipped when a narration input is replaced or torn down.
/// Clones observe the same flag, so the fetch worker can poll it between
/// I/O stages.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn check_cancelled(&self, stage: &'static str) -> Result<(), NarrationError> {
        if self.is_cancelled() {
            return Err(NarrationError::Cancelled { stage });
        }
        Ok(())
    }
}
