//! Debounced switch engine

use core::cell::Cell;

use crate::config::{HOLD_THRESHOLD, MAX_KEYS, MAX_ROTARY_ENCODERS, NO_REPEAT, SWITCH_POLL_INTERVAL};
use crate::io::{InterruptMode, IoDevice, PinId, PinMode};
use crate::sched::{Executable, InterruptHandler, TaskScheduler, TimeUnit};

use super::encoder::{Encoder, EncoderUpDownButtons, HardwareRotaryEncoder};

/// Callback signature for key events: the pin that changed and whether the
/// key was in the held state.
pub type KeyCallbackFn = fn(PinId, bool);

/// Object form of the key notification, receiving both edges.
pub trait SwitchListener {
    fn on_pressed(&self, pin: PinId, held: bool);
    fn on_released(&self, pin: PinId, held: bool);
}

/// Where a key's press events go: a free function or a borrowed listener.
#[derive(Clone, Copy)]
pub enum SwitchAction<'a> {
    Callback(KeyCallbackFn),
    Listener(&'a dyn SwitchListener),
}

/// Debounce/hold state of one key.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum KeyState {
    NotPressed,
    Debouncing1,
    Debouncing2,
    Pressed,
    Held,
}

struct KeyRecord<'a> {
    pin: Cell<PinId>,
    repeat_interval: Cell<u8>,
    counter: Cell<u8>,
    state: Cell<KeyState>,
    previous_state: Cell<KeyState>,
    notify: Cell<Option<SwitchAction<'a>>>,
    on_release: Cell<Option<KeyCallbackFn>>,
}

impl<'a> KeyRecord<'a> {
    fn unused() -> Self {
        Self {
            pin: Cell::new(0),
            repeat_interval: Cell::new(NO_REPEAT),
            counter: Cell::new(0),
            state: Cell::new(KeyState::NotPressed),
            previous_state: Cell::new(KeyState::NotPressed),
            notify: Cell::new(None),
            on_release: Cell::new(None),
        }
    }

    fn assign(&self, pin: PinId, notify: Option<SwitchAction<'a>>, repeat_interval: u8) {
        self.pin.set(pin);
        self.repeat_interval.set(repeat_interval);
        self.counter.set(0);
        self.state.set(KeyState::NotPressed);
        self.previous_state.set(KeyState::NotPressed);
        self.notify.set(notify);
        self.on_release.set(None);
    }

    fn is_debouncing(&self) -> bool {
        matches!(self.state.get(), KeyState::Debouncing1 | KeyState::Debouncing2)
    }

    fn is_pressed(&self) -> bool {
        matches!(self.state.get(), KeyState::Pressed | KeyState::Held)
    }

    fn trigger(&self, held: bool) {
        match self.notify.get() {
            Some(SwitchAction::Callback(cb)) => cb(self.pin.get(), held),
            Some(SwitchAction::Listener(listener)) => listener.on_pressed(self.pin.get(), held),
            None => {}
        }
    }

    fn trigger_release(&self, held: bool) {
        match self.notify.get() {
            Some(SwitchAction::Listener(listener)) => listener.on_released(self.pin.get(), held),
            _ => {
                if let Some(cb) = self.on_release.get() {
                    cb(self.pin.get(), held);
                }
            }
        }
    }

    /// Release notification for leaving via the debounce path, where the
    /// key may or may not ever have reported pressed.
    fn release_if_was_pressed(&self) {
        match self.previous_state.get() {
            KeyState::Pressed => {
                self.previous_state.set(KeyState::NotPressed);
                self.trigger_release(false);
            }
            KeyState::Held => {
                self.previous_state.set(KeyState::NotPressed);
                self.trigger_release(true);
            }
            _ => {}
        }
    }

    /// One tick of the per-key state machine. `active` is the raw sample
    /// with polarity already applied, so "active == pressed" throughout.
    fn check_and_trigger(&self, active: bool) {
        if self.notify.get().is_none() && self.on_release.get().is_none() {
            return;
        }

        match self.state.get() {
            KeyState::NotPressed => {
                if active {
                    self.state.set(KeyState::Debouncing1);
                }
            }
            KeyState::Debouncing1 => {
                if active {
                    self.state.set(KeyState::Pressed);
                    self.previous_state.set(KeyState::Pressed);
                    self.counter.set(0);
                    self.trigger(false);
                } else {
                    self.state.set(KeyState::Debouncing2);
                }
            }
            KeyState::Debouncing2 => {
                self.state.set(KeyState::NotPressed);
                self.release_if_was_pressed();
            }
            KeyState::Pressed => {
                if active {
                    let count = self.counter.get().saturating_add(1);
                    self.counter.set(count);
                    if count > HOLD_THRESHOLD {
                        self.state.set(KeyState::Held);
                        self.previous_state.set(KeyState::Held);
                        self.counter.set(0);
                        self.trigger(true);
                    }
                } else {
                    self.state.set(KeyState::NotPressed);
                    self.previous_state.set(KeyState::NotPressed);
                    self.trigger_release(false);
                }
            }
            KeyState::Held => {
                if active {
                    if self.repeat_interval.get() != NO_REPEAT {
                        let count = self.counter.get().saturating_add(1);
                        self.counter.set(count);
                        if count > self.repeat_interval.get() {
                            self.trigger(true);
                            self.counter.set(0);
                        }
                    }
                } else {
                    self.state.set(KeyState::NotPressed);
                    self.previous_state.set(KeyState::NotPressed);
                    self.trigger_release(true);
                }
            }
        }
    }
}

const SW_FLAG_PULLUP_LOGIC: u8 = 0x01;
const SW_FLAG_INTERRUPT_DRIVEN: u8 = 0x02;
const SW_FLAG_INTERRUPT_DEBOUNCING: u8 = 0x04;

/// Debounced switch and encoder input engine.
///
/// In polling mode the engine schedules itself as a fixed-rate task every
/// [`SWITCH_POLL_INTERVAL`] ms. In interrupt mode nothing runs until a pin
/// interrupt is marshalled to it, at which point it polls in 20 ms bursts
/// until every key has settled, then goes quiet again.
///
/// The engine holds its pin provider and scheduler by non-owning reference
/// and is itself scheduled by reference, so an instance must outlive the
/// scheduling lifetime it is initialised with.
pub struct SwitchInput<'a> {
    io: Cell<Option<&'a dyn IoDevice>>,
    scheduler: Cell<Option<&'a dyn TaskScheduler<'a>>>,
    self_ref: Cell<Option<&'a SwitchInput<'a>>>,
    keys: [KeyRecord<'a>; MAX_KEYS],
    num_keys: Cell<u8>,
    encoders: [Cell<Option<&'a dyn Encoder>>; MAX_ROTARY_ENCODERS],
    flags: Cell<u8>,
    last_sync_ok: Cell<bool>,
}

impl<'a> SwitchInput<'a> {
    pub fn new() -> Self {
        Self {
            io: Cell::new(None),
            scheduler: Cell::new(None),
            self_ref: Cell::new(None),
            keys: core::array::from_fn(|_| KeyRecord::unused()),
            num_keys: Cell::new(0),
            encoders: core::array::from_fn(|_| Cell::new(None)),
            flags: Cell::new(0),
            last_sync_ok: Cell::new(true),
        }
    }

    /// Polling mode: records the provider and polarity, then schedules the
    /// engine as a 20 ms fixed-rate task on `scheduler`.
    pub fn initialise(
        &'a self,
        scheduler: &'a dyn TaskScheduler<'a>,
        io: &'a dyn IoDevice,
        pullup_logic: bool,
    ) {
        self.init(scheduler, io, false, pullup_logic);
    }

    /// Interrupt mode: no periodic task. Keys added afterwards register a
    /// change interrupt, and each marshalled interrupt starts a polling
    /// burst that lasts while anything is debouncing or down.
    pub fn initialise_interrupt(
        &'a self,
        scheduler: &'a dyn TaskScheduler<'a>,
        io: &'a dyn IoDevice,
        pullup_logic: bool,
    ) {
        self.init(scheduler, io, true, pullup_logic);
    }

    fn init(
        &'a self,
        scheduler: &'a dyn TaskScheduler<'a>,
        io: &'a dyn IoDevice,
        interrupt_driven: bool,
        pullup_logic: bool,
    ) {
        self.io.set(Some(io));
        self.scheduler.set(Some(scheduler));
        self.self_ref.set(Some(self));

        let mut flags = 0;
        if pullup_logic {
            flags |= SW_FLAG_PULLUP_LOGIC;
        }
        if interrupt_driven {
            flags |= SW_FLAG_INTERRUPT_DRIVEN;
        }
        self.flags.set(flags);

        if interrupt_driven {
            scheduler.set_interrupt_handler(self);
        } else {
            scheduler.schedule_fixed_rate_exec(SWITCH_POLL_INTERVAL, self, TimeUnit::Millis);
        }
    }

    /// Register a key with a press callback. Returns `false` when the key
    /// table is full or the engine has no provider yet.
    pub fn add_switch(&self, pin: PinId, callback: KeyCallbackFn, repeat: u8) -> bool {
        self.add_key(pin, Some(SwitchAction::Callback(callback)), repeat)
    }

    /// Register a key notified through a listener object.
    pub fn add_switch_listener(
        &self,
        pin: PinId,
        listener: &'a dyn SwitchListener,
        repeat: u8,
    ) -> bool {
        self.add_key(pin, Some(SwitchAction::Listener(listener)), repeat)
    }

    fn add_key(&self, pin: PinId, notify: Option<SwitchAction<'a>>, repeat: u8) -> bool {
        let Some(io) = self.io.get() else {
            return false;
        };
        let slot = self.num_keys.get() as usize;
        if slot >= MAX_KEYS {
            return false;
        }

        io.pin_direction(
            pin,
            if self.is_pullup_logic() {
                PinMode::InputPullup
            } else {
                PinMode::Input
            },
        );

        if self.is_interrupt_driven() {
            if let Some(scheduler) = self.scheduler.get() {
                scheduler.add_interrupt(io, pin, InterruptMode::Change);
            }
        }

        self.keys[slot].assign(pin, notify, repeat);
        self.num_keys.set(slot as u8 + 1);
        true
    }

    /// Attach a release callback to a key. If the pin was never registered
    /// a key is created for it with no press notification.
    pub fn on_release(&self, pin: PinId, callback: KeyCallbackFn) {
        if let Some(key) = self.key_for(pin) {
            key.on_release.set(Some(callback));
            return;
        }
        if self.add_key(pin, None, NO_REPEAT) {
            if let Some(key) = self.key_for(pin) {
                key.on_release.set(Some(callback));
            }
        }
    }

    /// Swap a key's press callback in place, preserving its state.
    pub fn replace_on_pressed(&self, pin: PinId, callback: KeyCallbackFn) {
        if let Some(key) = self.key_for(pin) {
            key.notify.set(Some(SwitchAction::Callback(callback)));
        }
    }

    /// Swap a key's listener in place, preserving its state.
    pub fn replace_switch_listener(&self, pin: PinId, listener: &'a dyn SwitchListener) {
        if let Some(key) = self.key_for(pin) {
            key.notify.set(Some(SwitchAction::Listener(listener)));
        }
    }

    /// Synthesise a press notification for a key, bypassing its state
    /// machine. Useful for tests and programmatic triggering.
    pub fn push_switch(&self, pin: PinId, held: bool) {
        if let Some(key) = self.key_for(pin) {
            key.trigger(held);
        }
    }

    /// Whether a key is currently debounced-down.
    pub fn is_switch_pressed(&self, pin: PinId) -> bool {
        self.key_for(pin).map(|k| k.is_pressed()).unwrap_or(false)
    }

    /// Place an encoder in a slot. Returns `false` for an out-of-range slot.
    pub fn set_encoder(&self, slot: usize, encoder: &'a dyn Encoder) -> bool {
        let Some(cell) = self.encoders.get(slot) else {
            return false;
        };
        cell.set(Some(encoder));
        true
    }

    /// Re-range the encoder in `slot`, which emits one change callback.
    pub fn change_encoder_precision(&self, slot: usize, maximum: u16, current: u16) {
        if let Some(Some(encoder)) = self.encoders.get(slot).map(Cell::get) {
            encoder.change_precision(maximum, current);
        }
    }

    /// Wire a quadrature encoder into a slot: pins go to input-pull-up,
    /// the decoder is seeded from a fresh sync, and change interrupts on
    /// both pins are marshalled back into the engine.
    pub fn set_hardware_encoder(&self, slot: usize, encoder: &'a HardwareRotaryEncoder) -> bool {
        let (Some(io), Some(scheduler)) = (self.io.get(), self.scheduler.get()) else {
            return false;
        };
        io.pin_direction(encoder.pin_a(), PinMode::InputPullup);
        io.pin_direction(encoder.pin_b(), PinMode::InputPullup);
        io.sync();
        encoder.seed_from(io);

        if let Some(this) = self.self_ref.get() {
            scheduler.set_interrupt_handler(this);
        }
        scheduler.add_interrupt(io, encoder.pin_a(), InterruptMode::Change);
        scheduler.add_interrupt(io, encoder.pin_b(), InterruptMode::Change);

        self.set_encoder(slot, encoder)
    }

    /// Wire an up/down-button encoder into a slot. `repeat` is the key
    /// repeat interval in engine ticks and is what makes holding a button
    /// ramp the value.
    pub fn set_up_down_encoder(
        &self,
        slot: usize,
        encoder: &'a EncoderUpDownButtons,
        repeat: u8,
    ) -> bool {
        self.add_switch_listener(encoder.pin_up(), encoder, repeat)
            && self.add_switch_listener(encoder.pin_down(), encoder, repeat)
            && self.set_encoder(slot, encoder)
    }

    /// One sampling pass over every key. Returns `true` while any key is
    /// still debouncing or down, i.e. while polling must continue.
    pub fn run_loop(&self) -> bool {
        let Some(io) = self.io.get() else {
            return false;
        };
        self.last_sync_ok.set(io.sync());

        let mut need_another_go = false;
        for key in &self.keys[..self.num_keys.get() as usize] {
            let raw = io.read_value(key.pin.get());
            let active = if self.is_pullup_logic() { !raw } else { raw };
            key.check_and_trigger(active);
            need_another_go |= key.is_debouncing() || key.is_pressed();
        }
        need_another_go
    }

    /// Drop every key and encoder and detach from the provider. Test aid.
    pub fn reset_all_switches(&self) {
        for key in &self.keys {
            key.assign(0, None, NO_REPEAT);
        }
        self.num_keys.set(0);
        for encoder in &self.encoders {
            encoder.set(None);
        }
        self.io.set(None);
        self.scheduler.set(None);
        self.self_ref.set(None);
        self.flags.set(0);
        self.last_sync_ok.set(true);
    }

    /// Result of the provider sync on the most recent pass. `false` means
    /// the last bus transaction failed; the engine keeps running on cached
    /// samples.
    pub fn was_last_sync_ok(&self) -> bool {
        self.last_sync_ok.get()
    }

    pub fn is_pullup_logic(&self) -> bool {
        self.flags.get() & SW_FLAG_PULLUP_LOGIC != 0
    }

    pub fn is_interrupt_driven(&self) -> bool {
        self.flags.get() & SW_FLAG_INTERRUPT_DRIVEN != 0
    }

    /// True while an interrupt-mode polling burst is in flight.
    pub fn is_interrupt_debouncing(&self) -> bool {
        self.flags.get() & SW_FLAG_INTERRUPT_DEBOUNCING != 0
    }

    fn set_interrupt_debouncing(&self, debouncing: bool) {
        let flags = self.flags.get();
        self.flags.set(if debouncing {
            flags | SW_FLAG_INTERRUPT_DEBOUNCING
        } else {
            flags & !SW_FLAG_INTERRUPT_DEBOUNCING
        });
    }

    /// Number of registered keys.
    pub fn key_count(&self) -> usize {
        self.num_keys.get() as usize
    }

    /// Pin of the key at `index`, in registration order.
    pub fn key_pin(&self, index: usize) -> Option<PinId> {
        self.keys[..self.key_count()].get(index).map(|k| k.pin.get())
    }

    /// Current state of the key at `index`.
    pub fn key_state(&self, index: usize) -> Option<KeyState> {
        self.keys[..self.key_count()].get(index).map(|k| k.state.get())
    }

    fn key_for(&self, pin: PinId) -> Option<&KeyRecord<'a>> {
        self.keys[..self.key_count()].iter().find(|k| k.pin.get() == pin)
    }
}

impl Default for SwitchInput<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Executable for SwitchInput<'a> {
    /// Scheduled entry point. In polling mode this is the repeating 20 ms
    /// task; in interrupt mode it is the transient burst task that keeps
    /// re-arming itself while keys are settling.
    fn exec(&self) {
        let need_another_go = self.run_loop();
        if self.is_interrupt_driven() {
            if need_another_go {
                if let (Some(scheduler), Some(this)) = (self.scheduler.get(), self.self_ref.get())
                {
                    scheduler.schedule_once_exec(SWITCH_POLL_INTERVAL, this, TimeUnit::Millis);
                }
            } else {
                self.set_interrupt_debouncing(false);
            }
        }
    }
}

impl<'a> InterruptHandler for SwitchInput<'a> {
    /// Marshalled-interrupt entry point: start a polling burst unless one
    /// is already running, and give every encoder a chance to decode the
    /// edge. Coalesced interrupts are fine - the burst samples all keys
    /// regardless of which pin fired.
    fn interrupt(&self, _pin: PinId) {
        if self.is_interrupt_driven() && !self.is_interrupt_debouncing() {
            self.set_interrupt_debouncing(true);
            self.exec();
        }
        if let Some(io) = self.io.get() {
            for slot in &self.encoders {
                if let Some(encoder) = slot.get() {
                    encoder.encoder_changed(io);
                }
            }
        }
    }
}
