//! Uniform pin-provider interface
//!
//! Everything above this module reads and writes pins through [`IoDevice`],
//! so switches and encoders work the same whether the pins are on-chip GPIO
//! or live behind a serial-bus expander. Serial providers cache reads and
//! writes; a [`IoDevice::sync`] round-trip commits pending writes and
//! refreshes the read cache, and direct GPIO providers implement it as a
//! no-op returning `true`.

mod hal;

pub use hal::IoPin;

/// Logical pin index understood by a pin provider.
pub type PinId = u8;

/// Raw handler registered with the hardware for a pin-change interrupt.
///
/// Runs in ISR context, so it must only touch the interrupt latch; use the
/// trampolines installed by `TaskManager::add_interrupt` rather than
/// registering your own unless you know what you are doing.
pub type RawIntHandler = fn();

/// Direction and pull configuration for a logical pin.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PinMode {
    Input,
    InputPullup,
    Output,
}

/// Edge selection for a pin-change interrupt registration.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum InterruptMode {
    Rising,
    Falling,
    Change,
}

/// Capability interface every pin provider implements.
///
/// Methods take `&self`; providers that buffer bus traffic use interior
/// mutability. Port operations address the 8-bit port containing `pin`.
pub trait IoDevice {
    /// Set the direction (and pull) of a single pin.
    fn pin_direction(&self, pin: PinId, mode: PinMode);

    /// Write one pin. On serial providers the value is cached until `sync`.
    fn write_value(&self, pin: PinId, value: bool);

    /// Read one pin. On serial providers this returns the cached sample
    /// captured by the last `sync`.
    fn read_value(&self, pin: PinId) -> bool;

    /// Write the whole port that `pin` belongs to.
    fn write_port(&self, pin: PinId, value: u8);

    /// Read the whole port that `pin` belongs to.
    fn read_port(&self, pin: PinId) -> u8;

    /// Register a raw interrupt handler for a pin.
    fn attach_interrupt(&self, pin: PinId, handler: RawIntHandler, mode: InterruptMode);

    /// Flush pending writes and refresh cached reads.
    ///
    /// Returns `false` on hardware failure (e.g. the I2C transaction did
    /// not complete). Direct GPIO providers return `true` unconditionally.
    fn sync(&self) -> bool;

    /// Read one pin with a `sync` first, so the sample is current.
    fn digital_read_sync(&self, pin: PinId) -> bool {
        self.sync();
        self.read_value(pin)
    }

    /// Write one pin and `sync` immediately, so the value is committed.
    fn digital_write_sync(&self, pin: PinId, value: bool) {
        self.write_value(pin, value);
        self.sync();
    }
}
