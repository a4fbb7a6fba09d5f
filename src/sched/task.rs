//! Task records and the packed execution-info word

use core::cell::Cell;

use crate::clock::Clock;

/// Callback signature for plain scheduled functions.
pub type TimerFn = fn();

/// A schedulable object. Implementors typically keep their working state in
/// `Cell`s so a shared reference is enough to run them.
pub trait Executable {
    fn exec(&self);
}

/// What a task slot runs when it fires: a free function or a borrowed
/// executable object. The object form is how a job carries data.
#[derive(Clone, Copy)]
pub enum TaskAction<'a> {
    Function(TimerFn),
    Executable(&'a dyn Executable),
}

impl TaskAction<'_> {
    pub fn run(&self) {
        match self {
            TaskAction::Function(f) => f(),
            TaskAction::Executable(e) => e.exec(),
        }
    }
}

/// Time unit for a schedule request.
///
/// The discriminants match the unit field of the packed execution info,
/// which stores `unit << 12`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TimeUnit {
    Micros = 0,
    Seconds = 1,
    Millis = 2,
}

pub(crate) const TASK_IN_USE: u16 = 0x8000;
pub(crate) const TASK_REPEATING: u16 = 0x4000;
pub(crate) const TASK_MILLIS: u16 = 0x2000;
pub(crate) const TASK_SECONDS: u16 = 0x1000;
pub(crate) const TASK_RUNNING: u16 = 0x0800;
pub(crate) const TIMER_MASK: u16 = 0x07ff;

/// Pack a magnitude and unit into the low bits of an execution-info word.
///
/// Millisecond magnitudes that do not fit the 11-bit field are re-encoded
/// in seconds (rounding down); anything still over the field maximum is
/// clamped to it.
pub(crate) fn to_timer_value(magnitude: u16, unit: TimeUnit) -> u16 {
    let (magnitude, unit) = if unit == TimeUnit::Millis && magnitude > TIMER_MASK {
        (magnitude / 1000, TimeUnit::Seconds)
    } else {
        (magnitude, unit)
    };
    magnitude.min(TIMER_MASK) | ((unit as u16) << 12)
}

/// One fixed task slot: packed flags and magnitude, the timestamp captured
/// when the slot was armed, the action to run, and the forward link of the
/// time-ordered run queue (a slot index, since slots never move).
pub struct TimerTask<'a> {
    exec_info: Cell<u16>,
    scheduled_at: Cell<u32>,
    action: Cell<Option<TaskAction<'a>>>,
    next: Cell<Option<u8>>,
}

impl<'a> TimerTask<'a> {
    pub(crate) fn new() -> Self {
        Self {
            exec_info: Cell::new(0),
            scheduled_at: Cell::new(0),
            action: Cell::new(None),
            next: Cell::new(None),
        }
    }

    /// Arm the slot. Captures "now" in the unit the packed info selects.
    pub(crate) fn initialise(&self, exec_info: u16, action: TaskAction<'a>, clock: &impl Clock) {
        self.exec_info.set(exec_info);
        self.action.set(Some(action));
        self.scheduled_at.set(if self.is_job_micros() {
            clock.micros()
        } else {
            clock.millis()
        });
        self.next.set(None);
    }

    /// True when the slot is armed, not currently executing, and its delay
    /// has elapsed on the counter matching its unit.
    pub fn is_ready(&self, clock: &impl Clock) -> bool {
        if !self.is_in_use() || self.is_running() {
            return false;
        }
        let delay = u32::from(self.timer_value());
        if self.is_job_micros() {
            clock.micros().wrapping_sub(self.scheduled_at.get()) >= delay
        } else if self.is_job_seconds() {
            clock.millis().wrapping_sub(self.scheduled_at.get()) >= delay * 1000
        } else {
            clock.millis().wrapping_sub(self.scheduled_at.get()) >= delay
        }
    }

    /// Remaining time before this slot fires, in microseconds, saturating
    /// at zero once the deadline has passed. This is the ordering key of
    /// the run queue.
    pub fn micros_from_now(&self, clock: &impl Clock) -> u32 {
        let delay = u32::from(self.timer_value());
        if self.is_job_micros() {
            let taken = clock.micros().wrapping_sub(self.scheduled_at.get());
            delay.saturating_sub(taken)
        } else {
            let delay = if self.is_job_seconds() { delay * 1000 } else { delay };
            let taken = clock.millis().wrapping_sub(self.scheduled_at.get());
            delay.saturating_sub(taken) * 1000
        }
    }

    /// Run the slot's action.
    ///
    /// One-shot slots are cleared before the action is invoked so the
    /// callback may claim a slot again, possibly the one it just vacated.
    /// Repeating slots are flagged running for the duration of the call and
    /// re-stamped afterwards, so the next fire is `now + period` measured
    /// from completion.
    pub(crate) fn execute(&self, clock: &impl Clock) {
        let Some(action) = self.action.get() else {
            return;
        };
        if self.is_repeating() {
            self.mark_running();
            action.run();
            self.scheduled_at.set(if self.is_job_micros() {
                clock.micros()
            } else {
                clock.millis()
            });
            self.clear_running();
        } else {
            self.clear();
            action.run();
        }
    }

    pub(crate) fn clear(&self) {
        self.exec_info.set(0);
        self.action.set(None);
        self.next.set(None);
    }

    pub fn is_in_use(&self) -> bool {
        self.exec_info.get() & TASK_IN_USE != 0
    }

    pub fn is_repeating(&self) -> bool {
        self.exec_info.get() & TASK_REPEATING != 0
    }

    pub fn is_running(&self) -> bool {
        self.exec_info.get() & TASK_RUNNING != 0
    }

    pub fn is_job_micros(&self) -> bool {
        self.exec_info.get() & (TASK_MILLIS | TASK_SECONDS) == 0
    }

    pub fn is_job_seconds(&self) -> bool {
        self.exec_info.get() & TASK_SECONDS != 0
    }

    pub fn is_job_millis(&self) -> bool {
        self.exec_info.get() & TASK_MILLIS != 0
    }

    /// The magnitude field, in the slot's own unit.
    pub fn timer_value(&self) -> u16 {
        self.exec_info.get() & TIMER_MASK
    }

    fn mark_running(&self) {
        self.exec_info.set(self.exec_info.get() | TASK_RUNNING);
    }

    fn clear_running(&self) {
        self.exec_info.set(self.exec_info.get() & !TASK_RUNNING);
    }

    pub(crate) fn next_index(&self) -> Option<u8> {
        self.next.get()
    }

    pub(crate) fn set_next(&self, next: Option<u8>) {
        self.next.set(next);
    }
}

/// A callback run on every pass of the loop, after timed tasks.
///
/// Records are owned by the caller and chained through the manager; a
/// record must not be added to more than one chain, or twice to the same
/// one. Keep these genuinely light: they run every iteration and anything
/// slow here delays timed tasks.
pub struct IdleTask<'a> {
    action: TaskAction<'a>,
    next: Cell<Option<&'a IdleTask<'a>>>,
}

impl<'a> IdleTask<'a> {
    pub const fn new(action: TaskAction<'a>) -> Self {
        Self {
            action,
            next: Cell::new(None),
        }
    }

    pub(crate) fn action(&self) -> TaskAction<'a> {
        self.action
    }

    pub(crate) fn next_idle(&self) -> Option<&'a IdleTask<'a>> {
        self.next.get()
    }

    pub(crate) fn set_next(&self, next: Option<&'a IdleTask<'a>>) {
        self.next.set(next);
    }
}

/// Identifier of a claimed task slot, as returned by the schedule calls.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TaskId(pub(crate) u8);

impl TaskId {
    /// The reserved id returned when every slot is in use.
    pub const INVALID: TaskId = TaskId(0xff);

    pub const fn is_invalid(self) -> bool {
        self.0 == Self::INVALID.0
    }
}
