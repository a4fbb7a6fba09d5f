//! The embedded-hal pin adapter behaves like a native embedded-hal pin.

use embedded_hal::digital::v2::{InputPin, OutputPin};
use embedded_hal_mock::pin::{
    Mock as PinMock, State as PinState, Transaction as PinTransaction,
};

use taskio::testing::MockIo;
use taskio::IoPin;

/// The call pattern a typical embedded-hal driver makes against a pin.
fn pulse<P: OutputPin>(pin: &mut P) {
    pin.set_high().ok();
    pin.set_low().ok();
}

fn sample<P: InputPin>(pin: &P) -> bool {
    pin.is_high().unwrap_or(false)
}

#[test]
fn adapter_accepts_the_same_driver_calls_as_a_native_pin() {
    // reference: the mock pin accepts exactly this transaction sequence
    let mut reference = PinMock::new(&[
        PinTransaction::set(PinState::High),
        PinTransaction::set(PinState::Low),
    ]);
    pulse(&mut reference);
    reference.done();

    // the adapter sees the same calls and commits each one with a sync
    let io = MockIo::new(8);
    let mut pin = IoPin::output(&io, 3);
    pulse(&mut pin);

    assert_eq!(io.sync_count(), 2);
    // cycle 0 ends with the high write, cycle 1 with the low write
    assert_eq!(io.written_value(0) & (1 << 3), 1 << 3);
    assert_eq!(io.written_value(1) & (1 << 3), 0);
}

#[test]
fn adapter_reads_are_sync_fresh() {
    let reference = PinMock::new(&[
        PinTransaction::get(PinState::High),
        PinTransaction::get(PinState::Low),
    ]);
    assert!(sample(&reference));
    assert!(!sample(&reference));
    let mut reference = reference;
    reference.done();

    let io = MockIo::new(8);
    // the image scripted for the next cycle is only visible through the
    // sync the adapter performs before reading
    io.set_value_for_reading(1, 1 << 5);
    let pin = IoPin::input(&io, 5);
    assert!(sample(&pin));
    assert!(!sample(&pin));
}
