// Tick reader and event dispatch
//
// The extended tick count is the overflow tally plus the live counter
// value. Elapsed time is measured between consecutive observations
// (tick_once polls, wait_at_least loop passes) with wrap-aware
// subtraction that assumes at most one wrap of the extended count in
// between: observations must come at least once per full period of
// the extended counter, or whole revolutions are silently lost. That
// is a precondition on the caller's polling frequency, not something
// the dispatcher detects.

use core::cell::{Cell, RefCell};

use critical_section::Mutex;

use crate::overflow::OverflowTally;
use crate::queue::{EventProc, EventQueue, QueueFull};
use crate::source::{COUNTER_MAX, COUNTER_RANGE, Tick, TickSource};

/// Called once per observation that saw any elapsed ticks, with the
/// elapsed count, before queued events are aged.
pub type LoopCallback = fn(Tick);

// Ticks from `last` to `current`, assuming at most one wrap of the
// extended count in between.
fn elapsed_between(last: Tick, current: Tick) -> Tick {
    if current > last {
        current - last
    } else {
        (Tick::MAX - last) + current
    }
}

/// Tick clock and one-shot event dispatch over a [`TickSource`].
///
/// Designed to live in a `static` so event procs and the overflow ISR
/// can reach it; every method takes `&self`. The overflow tally is
/// the only state shared with the interrupt. Everything else is
/// main-line-only: a single execution context polls `tick_once` from
/// its main loop or parks in `wait_at_least`.
pub struct TickTimer<S: TickSource, const N: usize = 8> {
    source: S,
    overflow: OverflowTally,
    last: Mutex<Cell<Tick>>,
    loop_cb: Mutex<Cell<Option<LoopCallback>>>,
    queue: Mutex<RefCell<EventQueue<N>>>,
}

impl<S: TickSource, const N: usize> TickTimer<S, N> {
    pub const fn new(source: S) -> Self {
        Self {
            source,
            overflow: OverflowTally::new(),
            last: Mutex::new(Cell::new(0)),
            loop_cb: Mutex::new(Cell::new(None)),
            queue: Mutex::new(RefCell::new(EventQueue::new())),
        }
    }

    /// Reset the overflow tally, the event queue and the last-observed
    /// tick. Call once before any other operation. Counter prescaler
    /// and overflow-interrupt enablement belong to board code, not
    /// here.
    pub fn init(&self) {
        self.overflow.reset();
        critical_section::with(|cs| {
            self.last.borrow(cs).set(0);
            self.queue.borrow_ref_mut(cs).clear();
        });
        log::debug!("ticks: init, queue capacity {}", N);
    }

    /// Call from the counter-overflow interrupt, and nowhere else.
    pub fn on_overflow(&self) {
        self.overflow.bump();
    }

    /// Current extended tick count.
    ///
    /// Snapshots the tally, the narrow counter and the overflow flag
    /// in one critical section (the prior interrupt state is restored
    /// afterwards, so this is safe where interrupts are already
    /// masked). A latched-but-unserviced wrap leaves the tally one
    /// revolution behind; when the counter has already restarted the
    /// missing revolution is added back here, so readings never step
    /// backwards. Must not be called from the overflow ISR itself.
    pub fn now(&self) -> Tick {
        let (ticks, counter, pending) = critical_section::with(|cs| {
            (
                self.overflow.snapshot(cs),
                self.source.counter(),
                self.source.overflow_pending(),
            )
        });
        let ticks = if pending && counter < COUNTER_MAX {
            ticks.wrapping_add(COUNTER_RANGE)
        } else {
            ticks
        };
        ticks.wrapping_add(counter as Tick)
    }

    /// Microseconds since init, at tick granularity.
    pub fn micros(&self) -> u32 {
        self.now() as u32 * S::MICROS_PER_TICK
    }

    /// Queue `proc` to run once at least `ticks` ticks have elapsed.
    /// It fires on the first observation at or past the timeout, so
    /// latency is bounded by the caller's polling interval. A proc
    /// that is already queued has its timeout refreshed instead.
    pub fn register(&self, proc: EventProc, ticks: u32) -> Result<(), QueueFull> {
        let result = critical_section::with(|cs| self.queue.borrow_ref_mut(cs).register(proc, ticks));
        if result.is_err() {
            log::warn!("ticks: event queue full ({} slots), registration dropped", N);
        }
        result
    }

    /// [`register`](Self::register) with the timeout in microseconds.
    pub fn register_micros(&self, proc: EventProc, micros: u32) -> Result<(), QueueFull> {
        self.register(proc, micros / S::MICROS_PER_TICK)
    }

    /// [`register`](Self::register) with the timeout in milliseconds.
    pub fn register_millis(&self, proc: EventProc, millis: u32) -> Result<(), QueueFull> {
        self.register_micros(proc, millis * 1000)
    }

    /// Number of events waiting to fire.
    pub fn depth(&self) -> usize {
        critical_section::with(|cs| self.queue.borrow_ref(cs).depth())
    }

    /// Drop every pending event.
    pub fn clear(&self) {
        critical_section::with(|cs| self.queue.borrow_ref_mut(cs).clear());
    }

    /// Set or unset the per-observation callback. With `None` the
    /// callback step is simply skipped.
    pub fn set_loop_callback(&self, cb: Option<LoopCallback>) {
        critical_section::with(|cs| self.loop_cb.borrow(cs).set(cb));
    }

    /// One dispatcher step; never blocks. Call on every iteration of
    /// the application's main loop. Does nothing when no tick has
    /// elapsed since the last observation.
    pub fn tick_once(&self) {
        let Some(elapsed) = self.observe() else {
            return;
        };
        if let Some(cb) = self.loop_callback() {
            cb(elapsed);
        }
        self.run_matured(elapsed);
    }

    /// Spin until at least `ticks` ticks have elapsed, dispatching the
    /// loop callback and queued events along the way so deferred work
    /// is not starved. Time spent inside events that themselves drive
    /// the timer is credited against the budget on the same pass. A
    /// zero budget returns immediately. Cannot fail and cannot be
    /// cancelled; it returns only when satisfied.
    pub fn wait_at_least(&self, ticks: u32) {
        let mut budget = ticks;
        if budget == 0 {
            return;
        }
        loop {
            let Some(elapsed) = self.observe() else {
                continue;
            };
            if elapsed as u32 >= budget {
                return;
            }
            budget -= elapsed as u32;
            if let Some(cb) = self.loop_callback() {
                cb(elapsed);
            }

            // Events spend real time, and an event that polls the
            // timer moves the last-observed tick itself. Whatever
            // moved during queue processing also counts against the
            // budget.
            let before = self.last_observed();
            self.run_matured(elapsed);
            let after = self.last_observed();
            if after != before {
                let spent = elapsed_between(before, after);
                if spent as u32 >= budget {
                    return;
                }
                budget -= spent as u32;
            }
        }
    }

    /// [`wait_at_least`](Self::wait_at_least) with the budget in
    /// microseconds.
    pub fn wait_micros(&self, micros: u32) {
        self.wait_at_least(micros / S::MICROS_PER_TICK);
    }

    /// [`wait_at_least`](Self::wait_at_least) with the budget in
    /// milliseconds.
    pub fn wait_millis(&self, millis: u32) {
        self.wait_micros(millis * 1000);
    }

    // Advance the last-observed tick, returning the ticks elapsed
    // since the previous observation. None when no tick has passed;
    // consecutive observations faster than one tick skip all work.
    fn observe(&self) -> Option<Tick> {
        let current = self.now();
        critical_section::with(|cs| {
            let last = self.last.borrow(cs);
            if current == last.get() {
                return None;
            }
            let elapsed = elapsed_between(last.get(), current);
            last.set(current);
            Some(elapsed)
        })
    }

    fn last_observed(&self) -> Tick {
        critical_section::with(|cs| self.last.borrow(cs).get())
    }

    fn loop_callback(&self) -> Option<LoopCallback> {
        critical_section::with(|cs| self.loop_cb.borrow(cs).get())
    }

    // Age every slot once, in index order. A matured slot is emptied
    // inside the queue borrow and its proc invoked after the borrow
    // is released, so procs may re-register themselves or call back
    // into tick_once. Maturation order is slot order, not expiry
    // order.
    fn run_matured(&self, elapsed: Tick) {
        for i in 0..N {
            let matured =
                critical_section::with(|cs| self.queue.borrow_ref_mut(cs).age_slot(i, elapsed as u32));
            if let Some(proc) = matured {
                proc();
            }
        }
    }
}
