//! Monotonic time sources

/// A monotonic pair of microsecond and millisecond counters.
///
/// Both counters are free-running and wrap at `u32::MAX`. All scheduling
/// arithmetic is done with wrapping subtraction (`now - scheduled_at`),
/// which stays correct across a single wrap provided no scheduled delay
/// exceeds half the counter range. The two counters do not need a shared
/// epoch; each task compares against the counter matching its own unit.
pub trait Clock {
    /// Current value of the microsecond counter.
    fn micros(&self) -> u32;

    /// Current value of the millisecond counter.
    fn millis(&self) -> u32;
}

impl<T: Clock + ?Sized> Clock for &T {
    fn micros(&self) -> u32 {
        (**self).micros()
    }

    fn millis(&self) -> u32 {
        (**self).millis()
    }
}
