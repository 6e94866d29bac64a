use std::io;
use std::mem;

use parking_lot::{Condvar, Mutex};

enum Slot {
    Pending,
    Ready(io::Result<u64>),
    Taken,
}

/// Set-once cell for the copy thread's terminal result.
pub(crate) struct Completion {
    slot: Mutex<Slot>,
    ready: Condvar,
}

impl Completion {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(Slot::Pending),
            ready: Condvar::new(),
        }
    }

    /// Store the result. Only the first call has any effect.
    pub(crate) fn complete(&self, result: io::Result<u64>) -> bool {
        let mut slot = self.slot.lock();
        if !matches!(*slot, Slot::Pending) {
            return false;
        }
        *slot = Slot::Ready(result);
        self.ready.notify_all();
        true
    }

    pub(crate) fn is_complete(&self) -> bool {
        !matches!(*self.slot.lock(), Slot::Pending)
    }

    /// Block until completed and take the result.
    ///
    /// Returns `None` if another caller already took it.
    pub(crate) fn wait(&self) -> Option<io::Result<u64>> {
        let mut slot = self.slot.lock();
        while matches!(*slot, Slot::Pending) {
            self.ready.wait(&mut slot);
        }
        match mem::replace(&mut *slot, Slot::Taken) {
            Slot::Ready(result) => Some(result),
            _ => None,
        }
    }
}
