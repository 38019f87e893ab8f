// Hardware counter boundary
//
// The timer core never touches registers. A TickSource hands it the
// narrow free-running counter value and the overflow-pending flag;
// prescaler selection and interrupt enablement stay in board code.

/// Extended tick count. Wide enough for session timing, not uptime;
/// it wraps silently and all comparisons go through wrap-aware
/// subtraction. Swap to `u32` here if longer sessions are needed.
pub type Tick = u16;

/// One full revolution of the narrow hardware counter.
pub const COUNTER_RANGE: Tick = 1 << 8;

/// Largest value the narrow counter holds before wrapping.
pub const COUNTER_MAX: u8 = u8::MAX;

/// The narrow free-running counter and its overflow flag.
///
/// Reads must be cheap and side-effect free: the tick reader calls
/// them with interrupts masked. The overflow flag is hardware-set on
/// counter wrap and cleared by the overflow interrupt's normal
/// servicing; between those two moments it tells the tick reader that
/// the tally is one revolution behind.
pub trait TickSource {
    /// Real-time length of one tick in microseconds, fixed by the CPU
    /// clock and prescaler.
    const MICROS_PER_TICK: u32;

    /// Current value of the free-running counter.
    fn counter(&self) -> u8;

    /// True while a counter wrap is latched but its interrupt has not
    /// run yet.
    fn overflow_pending(&self) -> bool;
}

impl<S: TickSource> TickSource for &S {
    const MICROS_PER_TICK: u32 = S::MICROS_PER_TICK;

    fn counter(&self) -> u8 {
        (**self).counter()
    }

    fn overflow_pending(&self) -> bool {
        (**self).overflow_pending()
    }
}
