use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One-shot claim guarding the apply of a requested lens.
///
/// Clones share the same flag; exactly one `try_claim` across all clones and
/// threads ever returns true.
#[derive(Debug, Clone, Default)]
pub struct ApplyClaim {
    claimed: Arc<AtomicBool>,
}

impl ApplyClaim {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_claim(&self) -> bool {
        self.claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }
}
