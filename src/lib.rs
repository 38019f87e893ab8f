// smol-ticks: tick timing and one-shot timeouts over a single narrow
// free-running hardware counter.
// source:   hardware boundary (counter value, overflow flag, tick ratio)
// overflow: software-extended overflow tally, bumped from the overflow ISR
// queue:    fixed-capacity one-shot event queue
// timer:    tick reader, poll-driven dispatcher, blocking wait

#![cfg_attr(not(test), no_std)]

pub mod overflow;
pub mod queue;
pub mod source;
pub mod timer;

pub use queue::{EventProc, EventQueue, QueueFull};
pub use source::{COUNTER_MAX, COUNTER_RANGE, Tick, TickSource};
pub use timer::{LoopCallback, TickTimer};
