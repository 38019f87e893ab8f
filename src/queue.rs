// Fixed-capacity one-shot event queue
// NOTE: No dynamic allocation; N slots scanned in index order. All
// operations run in main-line context, never from the interrupt.

use core::fmt;

/// The signature for event procedures.
///
/// Events should return quickly and must not block; an event may
/// re-register itself or drive the timer from inside its own
/// invocation. Identity for deduplication is the function pointer.
pub type EventProc = fn();

/// No empty slot and no matching slot; the registration was dropped
/// and the queue is unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFull;

impl fmt::Display for QueueFull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event queue full")
    }
}

#[derive(Clone, Copy)]
struct Slot {
    proc: Option<EventProc>,
    remaining: u32,
}

impl Slot {
    const EMPTY: Self = Self {
        proc: None,
        remaining: 0,
    };
}

/// At most `N` pending one-shot events, each counting down in ticks.
pub struct EventQueue<const N: usize> {
    slots: [Slot; N],
}

impl<const N: usize> EventQueue<N> {
    pub const fn new() -> Self {
        Self {
            slots: [Slot::EMPTY; N],
        }
    }

    /// Queue `proc` to fire once `timeout` ticks have elapsed.
    ///
    /// A proc that is already queued has its timeout refreshed in
    /// place instead of taking a second slot, so the same proc never
    /// occupies two slots at once.
    pub fn register(&mut self, proc: EventProc, timeout: u32) -> Result<(), QueueFull> {
        for slot in self.slots.iter_mut() {
            if slot.proc == Some(proc) {
                slot.remaining = timeout;
                return Ok(());
            }
        }
        for slot in self.slots.iter_mut() {
            if slot.proc.is_none() {
                slot.proc = Some(proc);
                slot.remaining = timeout;
                return Ok(());
            }
        }
        Err(QueueFull)
    }

    /// Number of occupied slots.
    pub fn depth(&self) -> usize {
        self.slots.iter().filter(|s| s.proc.is_some()).count()
    }

    /// Drop every pending event. An event already mid-invocation is
    /// unaffected; its slot was emptied before it ran.
    pub fn clear(&mut self) {
        self.slots = [Slot::EMPTY; N];
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    // Age slot `i` by `elapsed` ticks. A matured slot is emptied here,
    // before its proc runs: the caller invokes the returned proc only
    // after releasing its borrow of the queue, so the proc can
    // re-register or poll the timer without seeing its own stale
    // entry. Collapsing this into invoke-then-clear breaks reentrant
    // registration.
    pub(crate) fn age_slot(&mut self, i: usize, elapsed: u32) -> Option<EventProc> {
        let slot = &mut self.slots[i];
        let proc = slot.proc?;
        if slot.remaining <= elapsed {
            *slot = Slot::EMPTY;
            Some(proc)
        } else {
            slot.remaining -= elapsed;
            None
        }
    }

    #[cfg(test)]
    fn remaining(&self, proc: EventProc) -> Option<u32> {
        self.slots
            .iter()
            .find(|s| s.proc == Some(proc))
            .map(|s| s.remaining)
    }
}

impl<const N: usize> Default for EventQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}
