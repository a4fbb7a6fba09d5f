//! Interrupt marshalling: the latch ISRs write and the trampoline table

use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use crate::io::{PinId, RawIntHandler};

/// Callback signature for marshalled interrupts. Runs in the cooperative
/// loop, not in ISR context, so it may touch any state.
pub type InterruptFn = fn(PinId);

/// Object form of the marshalled-interrupt receiver.
pub trait InterruptHandler {
    fn interrupt(&self, pin: PinId);
}

/// The pin id a trampoline reports when it was registered for a pin the
/// fixed table does not cover.
pub const OTHER_INTERRUPT: PinId = 0xff;

/// Single-producer single-consumer handoff between ISR context and the
/// cooperative loop. The ISR side stores the pin and raises the flag; the
/// loop consumes both at the top of each pass. Two interrupts arriving
/// before a consume coalesce into one dispatch carrying the latest pin.
pub(crate) struct InterruptLatch {
    pin: AtomicU8,
    triggered: AtomicBool,
}

impl InterruptLatch {
    const fn new() -> Self {
        Self {
            pin: AtomicU8::new(0),
            triggered: AtomicBool::new(false),
        }
    }

    pub(crate) fn mark(&self, pin: PinId) {
        self.pin.store(pin, Ordering::Relaxed);
        self.triggered.store(true, Ordering::Release);
    }

    // Plain load/store rather than swap: AVR has no atomic read-modify-write,
    // and losing a mark that lands between the load and the store is the
    // coalescing the latch already permits.
    pub(crate) fn take(&self) -> Option<PinId> {
        if self.triggered.load(Ordering::Acquire) {
            self.triggered.store(false, Ordering::Release);
            Some(self.pin.load(Ordering::Relaxed))
        } else {
            None
        }
    }
}

static LATCH: InterruptLatch = InterruptLatch::new();

pub(crate) fn latch() -> &'static InterruptLatch {
    &LATCH
}

/// Record that an interrupt fired on `pin`.
///
/// This is what the installed trampolines call; it is public so a custom
/// ISR can feed the same marshalling path. Safe from ISR context - it only
/// touches the latch.
pub fn mark_interrupted(pin: PinId) {
    LATCH.mark(pin);
}

macro_rules! trampoline {
    ($name:ident, $pin:expr) => {
        fn $name() {
            mark_interrupted($pin);
        }
    };
}

trampoline!(irq_pin0, 0);
trampoline!(irq_pin1, 1);
trampoline!(irq_pin2, 2);
trampoline!(irq_pin3, 3);
trampoline!(irq_pin4, 4);
trampoline!(irq_pin5, 5);
trampoline!(irq_pin6, 6);
trampoline!(irq_pin7, 7);
trampoline!(irq_pin8, 8);
trampoline!(irq_pin9, 9);
trampoline!(irq_pin10, 10);
trampoline!(irq_pin11, 11);
trampoline!(irq_pin12, 12);
trampoline!(irq_pin13, 13);
trampoline!(irq_pin14, 14);
trampoline!(irq_pin15, 15);
trampoline!(irq_other, OTHER_INTERRUPT);

/// The raw handler to register with a provider so that an interrupt on
/// `pin` is recorded in the latch. Pins beyond the fixed table share one
/// trampoline that reports [`OTHER_INTERRUPT`].
pub(crate) fn trampoline_for(pin: PinId) -> RawIntHandler {
    match pin {
        0 => irq_pin0,
        1 => irq_pin1,
        2 => irq_pin2,
        3 => irq_pin3,
        4 => irq_pin4,
        5 => irq_pin5,
        6 => irq_pin6,
        7 => irq_pin7,
        8 => irq_pin8,
        9 => irq_pin9,
        10 => irq_pin10,
        11 => irq_pin11,
        12 => irq_pin12,
        13 => irq_pin13,
        14 => irq_pin14,
        15 => irq_pin15,
        _ => irq_other,
    }
}
