//! Cooperative task scheduling and debounced switch/encoder input for
//! embedded targets.
//!
//! The crate has two layers. [`sched`] is a single-threaded cooperative
//! scheduler: a fixed array of task slots, a time-ordered run queue, and a
//! `run_loop` that is called from the application's main loop. [`input`]
//! sits on top of it and drives debounced switches and rotary encoders
//! through the uniform pin-provider interface in [`io`], so the same
//! application code works against on-chip pins or an I2C port expander.
//!
//! Nothing here allocates. Task slots, key records and encoder slots are
//! fixed-capacity arrays sized in [`config`]; callbacks are either plain
//! function pointers or borrowed trait objects owned by the caller.

#![cfg_attr(not(test), no_std)]

pub mod clock;
pub mod config;
pub mod diag;
pub mod input;
pub mod io;
pub mod sched;
pub mod testing;

pub use clock::Clock;
pub use input::{
    Encoder, EncoderCallbackFn, EncoderUpDownButtons, HardwareRotaryEncoder, KeyCallbackFn,
    KeyState, RotaryEncoder, SwitchAction, SwitchInput, SwitchListener,
};
pub use io::{InterruptMode, IoDevice, IoPin, PinId, PinMode, RawIntHandler};
pub use sched::{
    Executable, IdleTask, InterruptFn, InterruptHandler, TaskAction, TaskId, TaskManager,
    TaskScheduler, TimeUnit, TimerFn, TimerTask,
};
