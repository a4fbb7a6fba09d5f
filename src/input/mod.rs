//! Switch and encoder input
//!
//! [`SwitchInput`] samples keys through a pin provider on a 20 ms tick and
//! drives a small per-key state machine: two-stage debounce, hold
//! detection after [`crate::config::HOLD_THRESHOLD`] ticks, and optional
//! auto-repeat while held. Encoders share the same provider and the same
//! marshalled-interrupt path.

mod encoder;
mod switches;

pub use encoder::{
    Encoder, EncoderCallbackFn, EncoderUpDownButtons, HardwareRotaryEncoder, RotaryEncoder,
};
pub use switches::{KeyCallbackFn, KeyState, SwitchAction, SwitchInput, SwitchListener};
