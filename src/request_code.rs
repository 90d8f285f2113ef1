//! Run-scoped provider of unique permission request codes.

use std::sync::atomic::{AtomicU32, Ordering};

/// Issues unique request codes for one synthesis run.
///
/// One allocator is shared by reference across every host processed in a
/// run, so codes are run-unique even across unrelated hosts. Hosts may be
/// synthesized on independent worker threads; the counter is the only shared
/// mutable state and is advanced atomically.
#[derive(Debug, Default)]
pub struct RequestCodeAllocator {
    current: AtomicU32,
}

impl RequestCodeAllocator {
    pub fn new() -> Self {
        RequestCodeAllocator {
            current: AtomicU32::new(0),
        }
    }

    /// Obtains the next unique request code, starting at 0.
    pub fn next(&self) -> u32 {
        self.current.fetch_add(1, Ordering::Relaxed)
    }

    /// The code the next call to [`RequestCodeAllocator::next`] will return.
    pub fn peek(&self) -> u32 {
        self.current.load(Ordering::Relaxed)
    }
}
