//! embedded-hal adapter for single pins of a provider

use core::convert::Infallible;

use embedded_hal::digital::v2::{InputPin, OutputPin};

use super::{IoDevice, PinId, PinMode};

/// One logical pin of an [`IoDevice`], viewed as an embedded-hal pin.
///
/// This lets third-party embedded-hal drivers sit on a pin that actually
/// lives behind a port expander. Every access is sync-wrapped so the driver
/// observes committed hardware state rather than the provider's cache,
/// which costs a bus round-trip per call on serial providers.
pub struct IoPin<'a> {
    io: &'a dyn IoDevice,
    pin: PinId,
}

impl<'a> IoPin<'a> {
    /// Wrap a pin without touching its direction.
    pub fn new(io: &'a dyn IoDevice, pin: PinId) -> Self {
        Self { io, pin }
    }

    /// Wrap a pin after configuring it as an input.
    pub fn input(io: &'a dyn IoDevice, pin: PinId) -> Self {
        io.pin_direction(pin, PinMode::Input);
        Self { io, pin }
    }

    /// Wrap a pin after configuring it as an input with pull-up.
    pub fn input_pullup(io: &'a dyn IoDevice, pin: PinId) -> Self {
        io.pin_direction(pin, PinMode::InputPullup);
        Self { io, pin }
    }

    /// Wrap a pin after configuring it as an output.
    pub fn output(io: &'a dyn IoDevice, pin: PinId) -> Self {
        io.pin_direction(pin, PinMode::Output);
        Self { io, pin }
    }

    /// The logical pin index this adapter drives.
    pub fn pin(&self) -> PinId {
        self.pin
    }
}

impl InputPin for IoPin<'_> {
    type Error = Infallible;

    fn is_high(&self) -> Result<bool, Self::Error> {
        Ok(self.io.digital_read_sync(self.pin))
    }

    fn is_low(&self) -> Result<bool, Self::Error> {
        Ok(!self.io.digital_read_sync(self.pin))
    }
}

impl OutputPin for IoPin<'_> {
    type Error = Infallible;

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.io.digital_write_sync(self.pin, true);
        Ok(())
    }

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.io.digital_write_sync(self.pin, false);
        Ok(())
    }
}
