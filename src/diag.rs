//! Diagnostic rendering over `ufmt`
//!
//! The scheduler itself never logs; these helpers render its introspection
//! surfaces to whatever `uWrite` sink the application already has (a UART
//! console, usually) when something needs eyeballing.

use ufmt::{uwrite, uDebug, uWrite, Formatter};

use crate::clock::Clock;
use crate::config::DEFAULT_TASK_SIZE;
use crate::input::{KeyState, SwitchInput};
use crate::io::{InterruptMode, PinMode};
use crate::sched::{TaskManager, TimeUnit};

impl uDebug for TimeUnit {
    fn fmt<W>(&self, f: &mut Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: uWrite + ?Sized,
    {
        f.write_str(match self {
            TimeUnit::Micros => "Micros",
            TimeUnit::Seconds => "Seconds",
            TimeUnit::Millis => "Millis",
        })
    }
}

impl uDebug for KeyState {
    fn fmt<W>(&self, f: &mut Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: uWrite + ?Sized,
    {
        f.write_str(match self {
            KeyState::NotPressed => "NotPressed",
            KeyState::Debouncing1 => "Debouncing1",
            KeyState::Debouncing2 => "Debouncing2",
            KeyState::Pressed => "Pressed",
            KeyState::Held => "Held",
        })
    }
}

impl uDebug for PinMode {
    fn fmt<W>(&self, f: &mut Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: uWrite + ?Sized,
    {
        f.write_str(match self {
            PinMode::Input => "Input",
            PinMode::InputPullup => "InputPullup",
            PinMode::Output => "Output",
        })
    }
}

impl uDebug for InterruptMode {
    fn fmt<W>(&self, f: &mut Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: uWrite + ?Sized,
    {
        f.write_str(match self {
            InterruptMode::Rising => "Rising",
            InterruptMode::Falling => "Falling",
            InterruptMode::Change => "Change",
        })
    }
}

/// Render the slot report, e.g. `tasks [RUFFFFFFFF]`.
pub fn write_slot_report<W, C>(out: &mut W, tasks: &TaskManager<'_, C>) -> Result<(), W::Error>
where
    W: uWrite,
    C: Clock,
{
    let mut buffer = [0u8; DEFAULT_TASK_SIZE + 1];
    let report = tasks.check_available_slots(&mut buffer);
    out.write_str("tasks [")?;
    if let Some((_, slots)) = report.split_last() {
        if let Ok(text) = core::str::from_utf8(slots) {
            out.write_str(text)?;
        }
    }
    out.write_str("]")
}

/// Render every registered key's pin and state on one line.
pub fn write_switch_report<W>(out: &mut W, switches: &SwitchInput<'_>) -> Result<(), W::Error>
where
    W: uWrite,
{
    uwrite!(
        out,
        "switches pullup={:?} int={:?}",
        switches.is_pullup_logic(),
        switches.is_interrupt_driven()
    )?;
    for index in 0..switches.key_count() {
        if let (Some(pin), Some(state)) = (switches.key_pin(index), switches.key_state(index)) {
            uwrite!(out, " pin{}={:?}", pin, state)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SimClock;

    struct StringSink(String);

    impl uWrite for StringSink {
        type Error = core::convert::Infallible;

        fn write_str(&mut self, s: &str) -> Result<(), Self::Error> {
            self.0.push_str(s);
            Ok(())
        }
    }

    #[test]
    fn slot_report_shows_all_free() {
        let clock = SimClock::new();
        let tasks = TaskManager::new(&clock);
        let mut sink = StringSink(String::new());
        write_slot_report(&mut sink, &tasks).unwrap();
        assert_eq!(sink.0, format!("tasks [{}]", "F".repeat(DEFAULT_TASK_SIZE)));
    }

    #[test]
    fn switch_report_lists_keys() {
        use crate::io::PinId;
        use crate::testing::MockIo;

        fn on_key(_pin: PinId, _held: bool) {}

        let clock = SimClock::new();
        let tasks = TaskManager::new(&clock);
        let io = MockIo::new(4);
        let switches = SwitchInput::new();
        switches.initialise(&tasks, &io, true);
        switches.add_switch(2, on_key, crate::config::NO_REPEAT);

        let mut sink = StringSink(String::new());
        write_switch_report(&mut sink, &switches).unwrap();
        assert_eq!(sink.0, "switches pullup=true int=false pin2=NotPressed");
    }
}
