//! Compile-time configuration constants

/// Number of task slots owned by a task manager
#[cfg(target_arch = "avr")]
pub const DEFAULT_TASK_SIZE: usize = 6;

/// Number of task slots owned by a task manager
#[cfg(not(target_arch = "avr"))]
pub const DEFAULT_TASK_SIZE: usize = 10;

/// Maximum number of switches the input engine can track
pub const MAX_KEYS: usize = 5;

/// Maximum number of encoder slots on the input engine
pub const MAX_ROTARY_ENCODERS: usize = 4;

/// Consecutive active ticks in the pressed state before a key reports held
pub const HOLD_THRESHOLD: u8 = 20;

/// Switch engine polling interval in milliseconds
pub const SWITCH_POLL_INTERVAL: u16 = 20;

/// Repeat-interval sentinel that disables auto-repeat for a key
pub const NO_REPEAT: u8 = 0xff;
