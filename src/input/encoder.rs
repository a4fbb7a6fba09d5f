//! Rotary encoders: a bounded-value core plus two input front ends

use core::cell::Cell;

use crate::io::{IoDevice, PinId};

use super::switches::SwitchListener;

/// Callback invoked with the new reading whenever an encoder value changes.
pub type EncoderCallbackFn = fn(u16);

/// An encoder the switch engine can hold in a slot.
pub trait Encoder {
    /// Decode a (possibly coalesced) pin change. Called from the engine's
    /// marshalled interrupt path with the shared provider.
    fn encoder_changed(&self, io: &dyn IoDevice);

    /// Reset the range and current value, emitting one change callback.
    fn change_precision(&self, maximum: u16, current: u16);

    fn current_reading(&self) -> u16;
}

/// The bounded integer value shared by every encoder front end.
///
/// The reading stays inside `0..=maximum`; steps that would leave the range
/// are clamped silently and the change callback fires only when the reading
/// actually moved.
pub struct RotaryEncoder {
    maximum: Cell<u16>,
    current: Cell<u16>,
    callback: EncoderCallbackFn,
}

impl RotaryEncoder {
    pub const fn new(callback: EncoderCallbackFn) -> Self {
        Self {
            maximum: Cell::new(0),
            current: Cell::new(0),
            callback,
        }
    }

    pub fn change_precision(&self, maximum: u16, current: u16) {
        self.maximum.set(maximum);
        self.current.set(current.min(maximum));
        (self.callback)(self.current.get());
    }

    /// Step the reading by `by`, saturating against the range.
    pub fn increment(&self, by: i16) {
        let current = self.current.get();
        let next = if by >= 0 {
            current.saturating_add(by as u16).min(self.maximum.get())
        } else {
            current.saturating_sub(by.unsigned_abs())
        };
        if next != current {
            self.current.set(next);
            (self.callback)(next);
        }
    }

    pub fn current_reading(&self) -> u16 {
        self.current.get()
    }

    pub fn maximum(&self) -> u16 {
        self.maximum.get()
    }
}

/// Quadrature encoder decoded from two pins of the shared provider.
///
/// The decoder keeps the last observed A and a cleaned B: B is only
/// re-latched when A has just changed, which filters contact bounce on B,
/// and a step registers on A's rising sample - down when A and B differ,
/// up when they match. Interrupt coalescing can swallow an intermediate
/// edge and with it a single step; the next detent resynchronises.
pub struct HardwareRotaryEncoder {
    value: RotaryEncoder,
    pin_a: PinId,
    pin_b: PinId,
    a_last: Cell<bool>,
    clean_from_b: Cell<bool>,
}

impl HardwareRotaryEncoder {
    pub const fn new(pin_a: PinId, pin_b: PinId, callback: EncoderCallbackFn) -> Self {
        Self {
            value: RotaryEncoder::new(callback),
            pin_a,
            pin_b,
            a_last: Cell::new(false),
            clean_from_b: Cell::new(false),
        }
    }

    pub fn pin_a(&self) -> PinId {
        self.pin_a
    }

    pub fn pin_b(&self) -> PinId {
        self.pin_b
    }

    pub fn value(&self) -> &RotaryEncoder {
        &self.value
    }

    /// Latch the current pin levels as the decoder's starting point.
    pub(crate) fn seed_from(&self, io: &dyn IoDevice) {
        self.a_last.set(io.read_value(self.pin_a));
        self.clean_from_b.set(io.read_value(self.pin_b));
    }
}

impl Encoder for HardwareRotaryEncoder {
    fn encoder_changed(&self, io: &dyn IoDevice) {
        io.sync();
        let a = io.read_value(self.pin_a);
        let b = io.read_value(self.pin_b);
        if a != self.a_last.get() {
            self.a_last.set(a);
            if b != self.clean_from_b.get() {
                self.clean_from_b.set(b);
                if a {
                    self.value.increment(if a != b { -1 } else { 1 });
                }
            }
        }
    }

    fn change_precision(&self, maximum: u16, current: u16) {
        self.value.change_precision(maximum, current);
    }

    fn current_reading(&self) -> u16 {
        self.value.current_reading()
    }
}

/// Two-button encoder: an up key and a down key on the switch engine.
///
/// Register it with `SwitchInput::set_up_down_encoder`; the keys' repeat
/// interval makes a held button step repeatedly, which is the acceleration.
pub struct EncoderUpDownButtons {
    value: RotaryEncoder,
    pin_up: PinId,
    pin_down: PinId,
}

impl EncoderUpDownButtons {
    pub const fn new(pin_up: PinId, pin_down: PinId, callback: EncoderCallbackFn) -> Self {
        Self {
            value: RotaryEncoder::new(callback),
            pin_up,
            pin_down,
        }
    }

    pub fn pin_up(&self) -> PinId {
        self.pin_up
    }

    pub fn pin_down(&self) -> PinId {
        self.pin_down
    }

    pub fn value(&self) -> &RotaryEncoder {
        &self.value
    }
}

impl Encoder for EncoderUpDownButtons {
    fn encoder_changed(&self, _io: &dyn IoDevice) {
        // driven by key events, not pin edges
    }

    fn change_precision(&self, maximum: u16, current: u16) {
        self.value.change_precision(maximum, current);
    }

    fn current_reading(&self) -> u16 {
        self.value.current_reading()
    }
}

impl SwitchListener for EncoderUpDownButtons {
    fn on_pressed(&self, pin: PinId, _held: bool) {
        if pin == self.pin_up {
            self.value.increment(1);
        } else if pin == self.pin_down {
            self.value.increment(-1);
        }
    }

    fn on_released(&self, _pin: PinId, _held: bool) {}
}
