//! Interrupt-driven switch engine: no periodic polling, bounded bursts.
//!
//! Uses the process-wide interrupt latch, so this binary holds exactly one
//! test (see interrupt_marshalling.rs).

use std::cell::RefCell;

use taskio::config::NO_REPEAT;
use taskio::testing::{MockIo, SimClock};
use taskio::{InterruptMode, PinId, SwitchInput, SwitchListener, TaskManager};

#[derive(Default)]
struct Events {
    presses: RefCell<Vec<(PinId, bool)>>,
    releases: RefCell<Vec<(PinId, bool)>>,
}

impl SwitchListener for Events {
    fn on_pressed(&self, pin: PinId, held: bool) {
        self.presses.borrow_mut().push((pin, held));
    }

    fn on_released(&self, pin: PinId, held: bool) {
        self.releases.borrow_mut().push((pin, held));
    }
}

#[test]
fn pin_interrupt_starts_a_polling_burst_that_ends_when_keys_settle() {
    let clock = SimClock::new();
    let tasks = TaskManager::new(&clock);
    let io = MockIo::new(32);
    let switches = SwitchInput::new();
    let events = Events::default();

    switches.initialise_interrupt(&tasks, &io, true);
    assert!(switches.add_switch_listener(2, &events, NO_REPEAT));
    assert!(io.is_interrupt_registered(2, InterruptMode::Change));

    // interrupt mode schedules nothing up front
    assert!(tasks.first_task().is_none());

    // the pin goes low (pressed, pull-up logic) for four samples, then high
    io.set_value_for_reading(5, 1 << 2);
    io.set_value_for_reading(6, 1 << 2);

    // edge fires; the marshalled dispatch starts the burst
    (io.interrupt_function().expect("interrupt registered"))();
    tasks.run_loop();
    assert!(switches.is_interrupt_debouncing());
    assert!(tasks.first_task().is_some(), "burst task must be queued");

    // drive the burst: one 20ms follow-up at a time until the key settles
    for _ in 0..8 {
        clock.advance_millis(20);
        tasks.run_loop();
    }

    assert_eq!(*events.presses.borrow(), vec![(2, false)]);
    assert_eq!(*events.releases.borrow(), vec![(2, false)]);

    // key released and debounced: back to pure interrupt wait
    assert!(!switches.is_interrupt_debouncing());
    assert!(tasks.first_task().is_none());
    assert_eq!(io.sync_count(), 5);
}
