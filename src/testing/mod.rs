//! Test doubles: a simulated clock and a scripted pin provider
//!
//! Neither type is meant for production use, but both ship in the library
//! so downstream crates can drive the scheduler and input engine in their
//! own host tests.

use core::cell::Cell;

use crate::clock::Clock;
use crate::io::{InterruptMode, IoDevice, PinId, PinMode, RawIntHandler};

/// A pair of counters tests move by hand.
///
/// The micros and millis counters are independent, so a test can park
/// millis just short of wrap while micros starts at zero. `advance_micros`
/// moves both coherently, carrying whole milliseconds across. An optional
/// auto-tick advances time on every read, which lets `yield_for_micros`
/// make progress without a second thread.
pub struct SimClock {
    micros: Cell<u32>,
    millis: Cell<u32>,
    micros_remainder: Cell<u32>,
    tick: Cell<u32>,
}

impl SimClock {
    pub fn new() -> Self {
        Self {
            micros: Cell::new(0),
            millis: Cell::new(0),
            micros_remainder: Cell::new(0),
            tick: Cell::new(0),
        }
    }

    /// Set the micros counter, leaving millis alone.
    pub fn set_micros(&self, value: u32) {
        self.micros.set(value);
    }

    /// Set the millis counter, leaving micros alone.
    pub fn set_millis(&self, value: u32) {
        self.millis.set(value);
        self.micros_remainder.set(0);
    }

    /// Advance time by `n` microseconds on both counters.
    pub fn advance_micros(&self, n: u32) {
        self.micros.set(self.micros.get().wrapping_add(n));
        let carried = self.micros_remainder.get() + n;
        self.millis.set(self.millis.get().wrapping_add(carried / 1000));
        self.micros_remainder.set(carried % 1000);
    }

    /// Advance time by `n` milliseconds on both counters.
    pub fn advance_millis(&self, n: u32) {
        self.advance_micros(n * 1000);
    }

    /// Make every counter read advance time by `per_read` microseconds.
    /// Zero (the default) disables the auto-tick.
    pub fn set_auto_tick(&self, per_read: u32) {
        self.tick.set(per_read);
    }

    fn bump(&self) {
        let tick = self.tick.get();
        if tick != 0 {
            self.advance_micros(tick);
        }
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SimClock {
    fn micros(&self) -> u32 {
        self.bump();
        self.micros.get()
    }

    fn millis(&self) -> u32 {
        self.bump();
        self.millis.get()
    }
}

/// Usage errors a [`MockIo`] records while a test runs. Only the most
/// recent one is kept.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MockIoError {
    None,
    PinTooHigh,
    ReadNotInput,
    WriteNotOutput,
}

/// Number of virtual pins on a [`MockIo`]: one 16-bit wide device, exposed
/// as two 8-bit ports.
pub const MOCK_PIN_COUNT: usize = 16;

const MAX_CYCLES: usize = 32;

/// A scripted 16-pin provider.
///
/// Reads come from a per-cycle table set up front with
/// [`set_value_for_reading`](Self::set_value_for_reading); every `sync`
/// moves to the next cycle (wrapping after `cycles`) and carries the
/// written image forward, since writes are generally additive. Pin modes,
/// writes and interrupt registrations are recorded for assertion, and
/// reads from non-inputs or writes to non-outputs latch a usage error.
pub struct MockIo {
    cycles: usize,
    pin_modes: [Cell<Option<PinMode>>; MOCK_PIN_COUNT],
    read_values: [Cell<u16>; MAX_CYCLES],
    write_values: [Cell<u16>; MAX_CYCLES],
    cycle: Cell<usize>,
    sync_calls: Cell<usize>,
    sync_result: Cell<bool>,
    error: Cell<MockIoError>,
    int_handler: Cell<Option<RawIntHandler>>,
    int_pin: Cell<Option<PinId>>,
    int_mode: Cell<Option<InterruptMode>>,
}

impl MockIo {
    /// A mock that cycles its read script every `cycles` syncs (capped at
    /// an internal maximum).
    pub fn new(cycles: usize) -> Self {
        Self {
            cycles: cycles.clamp(1, MAX_CYCLES),
            pin_modes: core::array::from_fn(|_| Cell::new(None)),
            read_values: core::array::from_fn(|_| Cell::new(0)),
            write_values: core::array::from_fn(|_| Cell::new(0)),
            cycle: Cell::new(0),
            sync_calls: Cell::new(0),
            sync_result: Cell::new(true),
            error: Cell::new(MockIoError::None),
            int_handler: Cell::new(None),
            int_pin: Cell::new(None),
            int_mode: Cell::new(None),
        }
    }

    /// Wind the scripted state back for the next test. Pin modes and the
    /// interrupt registration survive, mirroring real hardware setup.
    pub fn reset_io(&self) {
        for value in &self.read_values {
            value.set(0);
        }
        for value in &self.write_values {
            value.set(0);
        }
        self.cycle.set(0);
        self.sync_calls.set(0);
        self.error.set(MockIoError::None);
    }

    /// Script the 16-pin read image for one sync cycle.
    pub fn set_value_for_reading(&self, cycle: usize, value: u16) {
        if let Some(slot) = self.read_values.get(cycle) {
            slot.set(value);
        }
    }

    /// The 16-pin image written during a given cycle.
    pub fn written_value(&self, cycle: usize) -> u16 {
        self.write_values.get(cycle).map(Cell::get).unwrap_or(0)
    }

    /// Total number of `sync` calls observed.
    pub fn sync_count(&self) -> usize {
        self.sync_calls.get()
    }

    /// Script the result of every subsequent `sync`.
    pub fn set_sync_result(&self, ok: bool) {
        self.sync_result.set(ok);
    }

    /// The most recent usage error, if any.
    pub fn error(&self) -> MockIoError {
        self.error.get()
    }

    pub fn clear_error(&self) {
        self.error.set(MockIoError::None);
    }

    /// The mode a pin was last configured with.
    pub fn pin_mode(&self, pin: PinId) -> Option<PinMode> {
        self.pin_modes.get(pin as usize).and_then(Cell::get)
    }

    /// The raw handler registered by `attach_interrupt`, for firing it by
    /// hand in a test.
    pub fn interrupt_function(&self) -> Option<RawIntHandler> {
        self.int_handler.get()
    }

    /// Whether an interrupt was registered for exactly this pin and mode.
    pub fn is_interrupt_registered(&self, pin: PinId, mode: InterruptMode) -> bool {
        self.int_handler.get().is_some()
            && self.int_pin.get() == Some(pin)
            && self.int_mode.get() == Some(mode)
    }

    fn check_pin(&self, pin: PinId) -> bool {
        if (pin as usize) < MOCK_PIN_COUNT {
            true
        } else {
            self.error.set(MockIoError::PinTooHigh);
            false
        }
    }
}

impl IoDevice for MockIo {
    fn pin_direction(&self, pin: PinId, mode: PinMode) {
        if self.check_pin(pin) {
            self.pin_modes[pin as usize].set(Some(mode));
        }
    }

    fn write_value(&self, pin: PinId, value: bool) {
        if !self.check_pin(pin) {
            return;
        }
        if self.pin_modes[pin as usize].get() != Some(PinMode::Output) {
            self.error.set(MockIoError::WriteNotOutput);
        }
        let image = self.write_values[self.cycle.get()].get();
        let bit = 1 << pin;
        self.write_values[self.cycle.get()].set(if value { image | bit } else { image & !bit });
    }

    fn read_value(&self, pin: PinId) -> bool {
        if !self.check_pin(pin) {
            return false;
        }
        match self.pin_modes[pin as usize].get() {
            Some(PinMode::Input) | Some(PinMode::InputPullup) => {}
            _ => self.error.set(MockIoError::ReadNotInput),
        }
        self.read_values[self.cycle.get()].get() & (1 << pin) != 0
    }

    fn write_port(&self, pin: PinId, value: u8) {
        if !self.check_pin(pin) {
            return;
        }
        let image = self.write_values[self.cycle.get()].get();
        self.write_values[self.cycle.get()].set(if pin < 8 {
            (image & 0xff00) | u16::from(value)
        } else {
            (image & 0x00ff) | (u16::from(value) << 8)
        });
    }

    fn read_port(&self, pin: PinId) -> u8 {
        if !self.check_pin(pin) {
            return 0;
        }
        let image = self.read_values[self.cycle.get()].get();
        if pin < 8 {
            image as u8
        } else {
            (image >> 8) as u8
        }
    }

    fn attach_interrupt(&self, pin: PinId, handler: RawIntHandler, mode: InterruptMode) {
        self.int_handler.set(Some(handler));
        self.int_pin.set(Some(pin));
        self.int_mode.set(Some(mode));
    }

    fn sync(&self) -> bool {
        let written = self.write_values[self.cycle.get()].get();
        let next = (self.cycle.get() + 1) % self.cycles;
        self.cycle.set(next);
        self.write_values[next].set(written);
        self.sync_calls.set(self.sync_calls.get() + 1);
        self.sync_result.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_clock_carries_millis() {
        let clock = SimClock::new();
        clock.advance_micros(2500);
        assert_eq!(clock.micros(), 2500);
        assert_eq!(clock.millis(), 2);
        clock.advance_micros(500);
        assert_eq!(clock.millis(), 3);
    }

    #[test]
    fn mock_io_write_sync_read_round_trip() {
        let io = MockIo::new(6);
        io.pin_direction(4, PinMode::Output);
        io.write_value(4, true);
        io.sync();
        // written image carries into the new cycle
        assert_eq!(io.written_value(1) & (1 << 4), 1 << 4);
        assert_eq!(io.error(), MockIoError::None);
    }

    #[test]
    fn mock_io_flags_misuse() {
        let io = MockIo::new(6);
        io.pin_direction(3, PinMode::Output);
        io.read_value(3);
        assert_eq!(io.error(), MockIoError::ReadNotInput);
        io.clear_error();
        io.write_value(16, true);
        assert_eq!(io.error(), MockIoError::PinTooHigh);
    }
}
