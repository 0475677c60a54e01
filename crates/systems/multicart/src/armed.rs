use std::sync::atomic::{AtomicBool, Ordering};

/// Write-once record that the select lines belong to the sequencer.
///
/// Claimed at most once per power cycle; there is no way to clear it.
#[derive(Debug, Default)]
pub struct ArmedFlag(AtomicBool);

impl ArmedFlag {
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Set the flag. Returns `true` only for the caller that set it.
    pub fn claim(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_armed(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
