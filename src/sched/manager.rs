//! The cooperative task manager

use core::cell::Cell;

use crate::clock::Clock;
use crate::config::DEFAULT_TASK_SIZE;
use crate::io::{InterruptMode, IoDevice, PinId};

use super::interrupts::{self, InterruptFn, InterruptHandler};
use super::task::{
    to_timer_value, Executable, IdleTask, TaskAction, TaskId, TimeUnit, TimerFn, TimerTask,
    TASK_IN_USE, TASK_REPEATING,
};

/// Nesting depth at which `yield_for_micros` trips its debug guard.
const MAX_YIELD_DEPTH: u8 = 8;

/// The scheduling surface the input engine needs, separated out so engine
/// code is not generic over the clock behind the manager.
pub trait TaskScheduler<'a> {
    fn schedule_once_exec(&self, when: u16, exec: &'a dyn Executable, unit: TimeUnit) -> TaskId;
    fn schedule_fixed_rate_exec(&self, period: u16, exec: &'a dyn Executable, unit: TimeUnit)
        -> TaskId;
    fn add_interrupt(&self, io: &dyn IoDevice, pin: PinId, mode: InterruptMode);
    fn set_interrupt_handler(&self, handler: &'a dyn InterruptHandler);
}

#[derive(Clone, Copy)]
enum InterruptTarget<'a> {
    Function(InterruptFn),
    Handler(&'a dyn InterruptHandler),
}

impl InterruptTarget<'_> {
    fn dispatch(&self, pin: PinId) {
        match self {
            InterruptTarget::Function(f) => f(pin),
            InterruptTarget::Handler(h) => h.interrupt(pin),
        }
    }
}

/// Cooperative single-threaded scheduler.
///
/// Owns a fixed array of task slots and keeps the armed ones in a singly
/// linked queue ordered by time until due. `run_loop` must be called from
/// the application's main loop; tasks run to completion on that one
/// context, so a slow task delays everything behind it.
///
/// All methods take `&self`: slot state lives in `Cell`s so a task's
/// callback may schedule, cancel (including itself) or introspect through
/// the same manager reference that is currently running it.
pub struct TaskManager<'a, C: Clock> {
    clock: C,
    tasks: [TimerTask<'a>; DEFAULT_TASK_SIZE],
    first: Cell<Option<u8>>,
    interrupt_target: Cell<Option<InterruptTarget<'a>>>,
    idle_head: Cell<Option<&'a IdleTask<'a>>>,
    yield_depth: Cell<u8>,
}

impl<'a, C: Clock> TaskManager<'a, C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            tasks: core::array::from_fn(|_| TimerTask::new()),
            first: Cell::new(None),
            interrupt_target: Cell::new(None),
            idle_head: Cell::new(None),
            yield_depth: Cell::new(0),
        }
    }

    /// The time source this manager schedules against.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Total number of task slots.
    pub fn slot_count(&self) -> usize {
        self.tasks.len()
    }

    /// Schedule a function to run once after `when` elapses.
    ///
    /// Returns [`TaskId::INVALID`] when every slot is in use; that is a
    /// reportable condition for the caller, not an error.
    pub fn schedule_once(&self, when: u16, callback: TimerFn, unit: TimeUnit) -> TaskId {
        self.schedule(when, TaskAction::Function(callback), unit, false)
    }

    /// Schedule a function to run every `period`.
    pub fn schedule_fixed_rate(&self, period: u16, callback: TimerFn, unit: TimeUnit) -> TaskId {
        self.schedule(period, TaskAction::Function(callback), unit, true)
    }

    /// As [`schedule_once`](Self::schedule_once), for an executable object.
    pub fn schedule_once_exec(
        &self,
        when: u16,
        exec: &'a dyn Executable,
        unit: TimeUnit,
    ) -> TaskId {
        self.schedule(when, TaskAction::Executable(exec), unit, false)
    }

    /// As [`schedule_fixed_rate`](Self::schedule_fixed_rate), for an
    /// executable object.
    pub fn schedule_fixed_rate_exec(
        &self,
        period: u16,
        exec: &'a dyn Executable,
        unit: TimeUnit,
    ) -> TaskId {
        self.schedule(period, TaskAction::Executable(exec), unit, true)
    }

    fn schedule(&self, when: u16, action: TaskAction<'a>, unit: TimeUnit, repeating: bool) -> TaskId {
        let Some(slot) = self.find_free_task() else {
            return TaskId::INVALID;
        };
        let mut info = to_timer_value(when, unit) | TASK_IN_USE;
        if repeating {
            info |= TASK_REPEATING;
        }
        self.tasks[slot as usize].initialise(info, action, &self.clock);
        self.put_item_into_queue(slot);
        TaskId(slot)
    }

    fn find_free_task(&self) -> Option<u8> {
        self.tasks
            .iter()
            .position(|t| !t.is_in_use())
            .map(|i| i as u8)
    }

    /// Stop a task, or stop a repeating task from running again.
    ///
    /// Out-of-range and already-free ids are ignored. Calling this from
    /// inside the task being cancelled works: the slot is cleared before
    /// the callback returns and the loop does not re-insert it. Not legal
    /// from ISR context - an ISR may only touch the interrupt latch.
    pub fn cancel_task(&self, task: TaskId) {
        let Some(slot) = self.tasks.get(task.0 as usize) else {
            return;
        };
        self.remove_from_queue(task.0);
        slot.clear();
    }

    /// Append a callback to the idle chain, run on every loop pass.
    pub fn add_idle_task(&self, task: &'a IdleTask<'a>) {
        task.set_next(None);
        match self.idle_head.get() {
            None => self.idle_head.set(Some(task)),
            Some(head) => {
                let mut cursor = head;
                while let Some(next) = cursor.next_idle() {
                    cursor = next;
                }
                cursor.set_next(Some(task));
            }
        }
    }

    /// Install the function called, from the cooperative loop, when a
    /// marshalled interrupt is pending.
    pub fn set_interrupt_callback(&self, callback: InterruptFn) {
        self.interrupt_target
            .set(Some(InterruptTarget::Function(callback)));
    }

    /// Object form of [`set_interrupt_callback`](Self::set_interrupt_callback).
    pub fn set_interrupt_handler(&self, handler: &'a dyn InterruptHandler) {
        self.interrupt_target
            .set(Some(InterruptTarget::Handler(handler)));
    }

    /// Register an interrupt on a provider pin, routed through the latch
    /// into the installed receiver. A receiver must be installed first;
    /// without one the registration is skipped.
    pub fn add_interrupt(&self, io: &dyn IoDevice, pin: PinId, mode: InterruptMode) {
        if self.interrupt_target.get().is_none() {
            return;
        }
        io.attach_interrupt(pin, interrupts::trampoline_for(pin), mode);
    }

    /// One pass of the cooperative loop: dispatch a pending marshalled
    /// interrupt, run every due task in deadline order, then run the idle
    /// chain.
    pub fn run_loop(&self) {
        if let Some(pin) = interrupts::latch().take() {
            if let Some(target) = self.interrupt_target.get() {
                target.dispatch(pin);
            }
        }

        // The queue is time-ordered, so the walk stops at the first slot
        // that is not due. The cursor is captured locally: the running
        // task may cancel itself (or be cancelled) and its cleared link
        // simply ends the walk.
        let mut current = self.first.get();
        while let Some(index) = current {
            let task = &self.tasks[index as usize];
            if !task.is_ready(&self.clock) {
                break;
            }
            self.remove_from_queue(index);
            task.execute(&self.clock);
            if task.is_repeating() {
                self.put_item_into_queue(index);
            }
            current = task.next_index();
        }

        let mut idle = self.idle_head.get();
        while let Some(task) = idle {
            task.action().run();
            idle = task.next_idle();
        }
    }

    /// Busy-wait for at least `micros` while keeping the scheduler running.
    ///
    /// Use this instead of a raw delay inside task code. Tasks executed
    /// from within the wait may call it again, but only to a small depth;
    /// the bound is asserted in debug builds and unchecked in release.
    pub fn yield_for_micros(&self, micros: u16) {
        let depth = self.yield_depth.get();
        debug_assert!(depth < MAX_YIELD_DEPTH, "yield_for_micros nested too deeply");
        self.yield_depth.set(depth.saturating_add(1));

        let started = self.clock.micros();
        loop {
            self.run_loop();
            if self.clock.micros().wrapping_sub(started) >= u32::from(micros) {
                break;
            }
        }

        self.yield_depth.set(depth);
    }

    /// Fill `buffer` with one status byte per slot: `F` free, `U` in use,
    /// `R` repeating, lowercased while the slot is executing, followed by a
    /// zero terminator. Returns the written prefix. `buffer` should hold at
    /// least `slot_count() + 1` bytes; extra slots are dropped if not.
    pub fn check_available_slots<'b>(&self, buffer: &'b mut [u8]) -> &'b [u8] {
        if buffer.is_empty() {
            return buffer;
        }
        let n = self.tasks.len().min(buffer.len() - 1);
        for (out, task) in buffer.iter_mut().zip(&self.tasks) {
            let status = if task.is_repeating() {
                b'R'
            } else if task.is_in_use() {
                b'U'
            } else {
                b'F'
            };
            *out = if task.is_running() {
                status.to_ascii_lowercase()
            } else {
                status
            };
        }
        buffer[n] = 0;
        &buffer[..=n]
    }

    /// Clear every slot, the queue, the idle chain and the interrupt
    /// receiver. Intended for tests that reuse one manager.
    pub fn reset(&self) {
        for task in &self.tasks {
            task.clear();
        }
        self.first.set(None);
        self.idle_head.set(None);
        self.interrupt_target.set(None);
    }

    /// The head of the run queue, if any task is armed.
    pub fn first_task(&self) -> Option<&TimerTask<'a>> {
        self.first.get().map(|i| &self.tasks[i as usize])
    }

    /// The slot behind a task id, valid or not.
    pub fn task(&self, id: TaskId) -> Option<&TimerTask<'a>> {
        self.tasks.get(id.0 as usize)
    }

    /// Iterate the run queue in firing order.
    pub fn queue(&self) -> QueueIter<'_, 'a, C> {
        QueueIter {
            manager: self,
            next: self.first.get(),
        }
    }

    fn put_item_into_queue(&self, index: u8) {
        let task = &self.tasks[index as usize];

        // no queue yet, the new item is the head
        let Some(first) = self.first.get() else {
            task.set_next(None);
            self.first.set(Some(index));
            return;
        };

        let key = task.micros_from_now(&self.clock);

        // due sooner than the current head
        if self.tasks[first as usize].micros_from_now(&self.clock) > key {
            task.set_next(Some(first));
            self.first.set(Some(index));
            return;
        }

        // walk with a trailing cursor until a later item or the tail
        let mut previous = first;
        let mut current = self.tasks[first as usize].next_index();
        while let Some(cursor) = current {
            let candidate = &self.tasks[cursor as usize];
            if candidate.micros_from_now(&self.clock) > key {
                self.tasks[previous as usize].set_next(Some(index));
                task.set_next(Some(cursor));
                return;
            }
            previous = cursor;
            current = candidate.next_index();
        }

        self.tasks[previous as usize].set_next(Some(index));
        task.set_next(None);
    }

    fn remove_from_queue(&self, index: u8) {
        let Some(first) = self.first.get() else {
            return;
        };
        let task = &self.tasks[index as usize];

        if first == index {
            self.first.set(task.next_index());
            task.set_next(None);
            return;
        }

        let mut previous = first;
        let mut current = self.tasks[first as usize].next_index();
        while let Some(cursor) = current {
            if cursor == index {
                self.tasks[previous as usize].set_next(task.next_index());
                task.set_next(None);
                return;
            }
            previous = cursor;
            current = self.tasks[cursor as usize].next_index();
        }
    }
}

impl<'a, C: Clock> TaskScheduler<'a> for TaskManager<'a, C> {
    fn schedule_once_exec(&self, when: u16, exec: &'a dyn Executable, unit: TimeUnit) -> TaskId {
        TaskManager::schedule_once_exec(self, when, exec, unit)
    }

    fn schedule_fixed_rate_exec(
        &self,
        period: u16,
        exec: &'a dyn Executable,
        unit: TimeUnit,
    ) -> TaskId {
        TaskManager::schedule_fixed_rate_exec(self, period, exec, unit)
    }

    fn add_interrupt(&self, io: &dyn IoDevice, pin: PinId, mode: InterruptMode) {
        TaskManager::add_interrupt(self, io, pin, mode);
    }

    fn set_interrupt_handler(&self, handler: &'a dyn InterruptHandler) {
        TaskManager::set_interrupt_handler(self, handler);
    }
}

/// Iterator over the run queue in firing order, yielding armed slots.
pub struct QueueIter<'m, 'a, C: Clock> {
    manager: &'m TaskManager<'a, C>,
    next: Option<u8>,
}

impl<'m, 'a, C: Clock> Iterator for QueueIter<'m, 'a, C> {
    type Item = &'m TimerTask<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.next?;
        let task = &self.manager.tasks[index as usize];
        self.next = task.next_index();
        Some(task)
    }
}
