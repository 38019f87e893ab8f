// Overflow tally shared with the counter ISR
//
// Single writer: the overflow interrupt, via bump(). Main-line code
// only reads, through snapshot() inside a critical section, so the
// multi-byte value is seen whole on targets without wide atomic
// loads. Nothing else may touch the cell.

use core::cell::Cell;

use critical_section::{CriticalSection, Mutex};

use crate::source::{COUNTER_RANGE, Tick};

/// Software extension of the narrow counter: one `COUNTER_RANGE` step
/// per serviced overflow. Wraps silently at `Tick::MAX`.
pub(crate) struct OverflowTally(Mutex<Cell<Tick>>);

impl OverflowTally {
    pub(crate) const fn new() -> Self {
        Self(Mutex::new(Cell::new(0)))
    }

    // Interrupt context only.
    pub(crate) fn bump(&self) {
        critical_section::with(|cs| {
            let tally = self.0.borrow(cs);
            tally.set(tally.get().wrapping_add(COUNTER_RANGE));
        });
    }

    // The caller holds the critical section so the tally, the counter
    // and the overflow flag can be read as one consistent snapshot.
    pub(crate) fn snapshot(&self, cs: CriticalSection) -> Tick {
        self.0.borrow(cs).get()
    }

    pub(crate) fn reset(&self) {
        critical_section::with(|cs| self.0.borrow(cs).set(0));
    }
}
