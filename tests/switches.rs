//! Switch engine state machine, driven tick by tick.
//!
//! The scripted provider serves one read image per sync, and the engine
//! syncs once per `run_loop`, so read cycle N is what the engine sees on
//! tick N (cycle 0 is never read - the first sync moves past it). With
//! pull-up logic the all-zero default image reads as "pressed".

use std::cell::RefCell;
use std::sync::atomic::{AtomicU32, Ordering};

use taskio::config::{HOLD_THRESHOLD, MAX_KEYS, NO_REPEAT};
use taskio::testing::{MockIo, SimClock};
use taskio::{KeyState, PinId, PinMode, SwitchInput, SwitchListener, TaskManager};

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

/// Initialise an engine with pull-up logic and one listener key on `pin`.
/// The engine is set up in place because initialising pins it into the
/// scheduler by reference.
fn setup_key<'a>(
    switches: &'a SwitchInput<'a>,
    tasks: &'a TaskManager<'a, &'a SimClock>,
    io: &'a MockIo,
    events: &'a Events,
    pin: PinId,
    repeat: u8,
) {
    switches.initialise(tasks, io, true);
    assert!(switches.add_switch_listener(pin, events, repeat));
}

#[test]
fn press_hold_release_sequence() {
    let clock = SimClock::new();
    let tasks = TaskManager::new(&clock);
    let io = MockIo::new(32);
    let events = Events::default();
    let switches = SwitchInput::new();
    setup_key(&switches, &tasks, &io, &events, 2, NO_REPEAT);

    // tick 1 released, ticks 2..=24 pressed, tick 25 released again
    io.set_value_for_reading(1, 1 << 2);
    io.set_value_for_reading(25, 1 << 2);

    let mut last_needed_another = false;
    for _ in 0..25 {
        last_needed_another = switches.run_loop();
    }

    // one press once debounced, one held notification ~400ms later, one
    // release reporting the key had been held
    assert_eq!(*events.presses.borrow(), vec![(2, false), (2, true)]);
    assert_eq!(*events.releases.borrow(), vec![(2, true)]);
    assert!(!last_needed_another, "released key should end polling");
    assert!(!switches.is_switch_pressed(2));
}

#[test]
fn hold_fires_after_the_threshold_tick() {
    let clock = SimClock::new();
    let tasks = TaskManager::new(&clock);
    let io = MockIo::new(32);
    let events = Events::default();
    let switches = SwitchInput::new();
    setup_key(&switches, &tasks, &io, &events, 4, NO_REPEAT);

    // pressed from tick 1: press fires on tick 2, held must arrive
    // exactly HOLD_THRESHOLD + 1 ticks later
    for _ in 0..2 {
        switches.run_loop();
    }
    assert_eq!(events.presses.borrow().len(), 1);

    for _ in 0..u32::from(HOLD_THRESHOLD) {
        switches.run_loop();
    }
    assert_eq!(events.presses.borrow().len(), 1, "held fired early");

    switches.run_loop();
    assert_eq!(*events.presses.borrow(), vec![(4, false), (4, true)]);
    assert_eq!(switches.key_state(0), Some(KeyState::Held));
}

#[test]
fn single_tick_blip_is_debounced_away() {
    let clock = SimClock::new();
    let tasks = TaskManager::new(&clock);
    let io = MockIo::new(32);
    let events = Events::default();
    let switches = SwitchInput::new();
    setup_key(&switches, &tasks, &io, &events, 2, NO_REPEAT);

    // active on tick 1 only, then released for good
    for cycle in 2..8 {
        io.set_value_for_reading(cycle, 1 << 2);
    }
    for _ in 0..6 {
        switches.run_loop();
    }

    assert!(events.presses.borrow().is_empty());
    assert!(events.releases.borrow().is_empty());
    assert_eq!(switches.key_state(0), Some(KeyState::NotPressed));
}

#[test]
fn short_press_releases_without_held() {
    let clock = SimClock::new();
    let tasks = TaskManager::new(&clock);
    let io = MockIo::new(32);
    let events = Events::default();
    let switches = SwitchInput::new();
    setup_key(&switches, &tasks, &io, &events, 2, NO_REPEAT);

    // pressed ticks 1..=4, released from tick 5
    for cycle in 5..10 {
        io.set_value_for_reading(cycle, 1 << 2);
    }
    for _ in 0..6 {
        switches.run_loop();
    }

    assert_eq!(*events.presses.borrow(), vec![(2, false)]);
    assert_eq!(*events.releases.borrow(), vec![(2, false)]);
}

#[test]
fn held_key_repeats_at_its_interval() {
    let clock = SimClock::new();
    let tasks = TaskManager::new(&clock);
    let io = MockIo::new(32);
    let events = Events::default();
    let switches = SwitchInput::new();
    setup_key(&switches, &tasks, &io, &events, 2, 2);

    // held down for the whole window
    for _ in 0..32 {
        switches.run_loop();
    }

    let presses = events.presses.borrow();
    // press, held, then a repeat every repeat_interval + 1 ticks
    assert_eq!(presses[0], (2, false));
    assert!(presses.len() >= 4, "only {} events", presses.len());
    assert!(presses[1..].iter().all(|&(pin, held)| pin == 2 && held));
}

#[test]
fn active_high_polarity_reads_without_inversion() {
    static PRESSES: AtomicU32 = AtomicU32::new(0);
    fn on_key(_pin: PinId, _held: bool) {
        PRESSES.fetch_add(1, Ordering::Relaxed);
    }

    let clock = SimClock::new();
    let tasks = TaskManager::new(&clock);
    let io = MockIo::new(32);
    let switches = SwitchInput::new();
    switches.initialise(&tasks, &io, false);
    assert!(switches.add_switch(3, on_key, NO_REPEAT));

    // without pull-up logic the pin direction is plain input and a high
    // sample is a press
    assert_eq!(io.pin_mode(3), Some(PinMode::Input));
    io.set_value_for_reading(1, 1 << 3);
    io.set_value_for_reading(2, 1 << 3);
    for _ in 0..4 {
        switches.run_loop();
    }

    assert_eq!(PRESSES.load(Ordering::Relaxed), 1);
}

#[test]
fn on_release_attaches_to_an_unknown_pin() {
    static RELEASES: AtomicU32 = AtomicU32::new(0);
    fn on_key_up(_pin: PinId, held: bool) {
        assert!(!held);
        RELEASES.fetch_add(1, Ordering::Relaxed);
    }

    let clock = SimClock::new();
    let tasks = TaskManager::new(&clock);
    let io = MockIo::new(32);
    let switches = SwitchInput::new();
    switches.initialise(&tasks, &io, true);

    // never registered through add_switch; a key record is created
    switches.on_release(6, on_key_up);
    assert_eq!(switches.key_count(), 1);

    // press ticks 1..=3, release from tick 4: only the release notifies
    for cycle in 4..8 {
        io.set_value_for_reading(cycle, 1 << 6);
    }
    for _ in 0..6 {
        switches.run_loop();
    }

    assert_eq!(RELEASES.load(Ordering::Relaxed), 1);
}

#[test]
fn replace_on_pressed_swaps_the_callback_in_place() {
    static FIRST: AtomicU32 = AtomicU32::new(0);
    static SECOND: AtomicU32 = AtomicU32::new(0);
    fn first_callback(_pin: PinId, _held: bool) {
        FIRST.fetch_add(1, Ordering::Relaxed);
    }
    fn second_callback(_pin: PinId, _held: bool) {
        SECOND.fetch_add(1, Ordering::Relaxed);
    }

    let clock = SimClock::new();
    let tasks = TaskManager::new(&clock);
    let io = MockIo::new(32);
    let switches = SwitchInput::new();
    switches.initialise(&tasks, &io, true);
    assert!(switches.add_switch(2, first_callback, NO_REPEAT));

    // press, release (ticks 3-4), then press again under the new callback
    io.set_value_for_reading(3, 1 << 2);
    io.set_value_for_reading(4, 1 << 2);
    for _ in 0..2 {
        switches.run_loop();
    }
    assert_eq!(FIRST.load(Ordering::Relaxed), 1);

    switches.replace_on_pressed(2, second_callback);
    for _ in 0..6 {
        switches.run_loop();
    }

    assert_eq!(FIRST.load(Ordering::Relaxed), 1);
    assert_eq!(SECOND.load(Ordering::Relaxed), 1);
}

#[test]
fn push_switch_synthesises_a_press() {
    let clock = SimClock::new();
    let tasks = TaskManager::new(&clock);
    let io = MockIo::new(32);
    let events = Events::default();
    let switches = SwitchInput::new();
    setup_key(&switches, &tasks, &io, &events, 2, NO_REPEAT);

    switches.push_switch(2, true);
    assert_eq!(*events.presses.borrow(), vec![(2, true)]);
    // bypasses the state machine entirely
    assert_eq!(switches.key_state(0), Some(KeyState::NotPressed));
}

#[test]
fn key_table_capacity_is_enforced() {
    let clock = SimClock::new();
    let tasks = TaskManager::new(&clock);
    let io = MockIo::new(32);
    let events = Events::default();
    let switches = SwitchInput::new();
    switches.initialise(&tasks, &io, true);

    for pin in 0..MAX_KEYS as PinId {
        assert!(switches.add_switch_listener(pin, &events, NO_REPEAT));
    }
    assert!(!switches.add_switch_listener(MAX_KEYS as PinId, &events, NO_REPEAT));
    assert_eq!(switches.key_count(), MAX_KEYS);
}

#[test]
fn polling_engine_runs_as_a_scheduled_task() {
    let clock = SimClock::new();
    let tasks = TaskManager::new(&clock);
    let io = MockIo::new(32);
    let switches = SwitchInput::new();
    let events = Events::default();

    switches.initialise(&tasks, &io, true);
    assert!(switches.add_switch_listener(2, &events, NO_REPEAT));

    // released on the first engine tick, pressed afterwards
    io.set_value_for_reading(1, 1 << 2);

    // 100ms of wall time = five 20ms engine ticks
    for _ in 0..100 {
        clock.advance_millis(1);
        tasks.run_loop();
    }

    assert_eq!(io.sync_count(), 5);
    assert_eq!(*events.presses.borrow(), vec![(2, false)]);
    assert!(switches.is_switch_pressed(2));
}

#[test]
fn sync_failure_is_reported_but_not_fatal() {
    let clock = SimClock::new();
    let tasks = TaskManager::new(&clock);
    let io = MockIo::new(32);
    let events = Events::default();
    let switches = SwitchInput::new();
    setup_key(&switches, &tasks, &io, &events, 2, NO_REPEAT);

    assert!(switches.was_last_sync_ok());
    io.set_sync_result(false);
    switches.run_loop();
    assert!(!switches.was_last_sync_ok());

    // the engine keeps sampling the cached image regardless
    switches.run_loop();
    assert_eq!(*events.presses.borrow(), vec![(2, false)]);

    io.set_sync_result(true);
    switches.run_loop();
    assert!(switches.was_last_sync_ok());
}

#[test]
fn reset_drops_keys_and_detaches_the_provider() {
    static PRESSES: AtomicU32 = AtomicU32::new(0);
    fn on_key(_pin: PinId, _held: bool) {
        PRESSES.fetch_add(1, Ordering::Relaxed);
    }

    let clock = SimClock::new();
    let tasks = TaskManager::new(&clock);
    let io = MockIo::new(32);
    let switches = SwitchInput::new();
    switches.initialise(&tasks, &io, true);
    assert!(switches.add_switch(2, on_key, NO_REPEAT));

    switches.reset_all_switches();
    assert_eq!(switches.key_count(), 0);
    assert!(!switches.run_loop());
    // detached from the provider: keys cannot be added until re-initialised
    assert!(!switches.add_switch(2, on_key, NO_REPEAT));
}
