//! Cooperative task scheduling
//!
//! A [`TaskManager`] owns a fixed array of task slots and a run queue kept
//! in firing order. The application calls [`TaskManager::run_loop`] from
//! its main loop; everything else - periodic work, one-shots, marshalled
//! interrupts, idle callbacks - hangs off that one call.

mod interrupts;
mod manager;
mod task;

pub use interrupts::{mark_interrupted, InterruptFn, InterruptHandler, OTHER_INTERRUPT};
pub use manager::{QueueIter, TaskManager, TaskScheduler};
pub use task::{Executable, IdleTask, TaskAction, TaskId, TimeUnit, TimerFn, TimerTask};
