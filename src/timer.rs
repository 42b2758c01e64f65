//! The monotonic deadline timer resource used by stage 2 (`frame_fixed_timed`).
//!
//! §9 Design Notes: "In implementations without cheap `timer_gettime`,
//! substitute a monotonic clock read against a stored deadline — semantics
//! are identical." This crate asks the caller for exactly that: a resource
//! that can be armed for `N` milliseconds and then polled for how much of
//! that interval remains, split as whole seconds plus a sub-second remainder
//! in nanoseconds so the upstream termination quirk (Design Notes, Open
//! Questions) can be reproduced verbatim.

/// A monotonic, one-shot countdown owned by the [`crate::panel::Panel`] handle.
///
/// Implementors may back this with a kernel interval timer (`timerfd`,
/// POSIX `timer_gettime`) or with a monotonic clock read compared against a
/// stored deadline; both are explicitly sanctioned by the spec.
pub trait DeadlineTimer {
    /// Error type for arming/querying the timer.
    type Error: core::fmt::Debug;

    /// Arms the timer to expire `millis` milliseconds from now.
    fn arm_ms(&mut self, millis: u32) -> Result<(), Self::Error>;

    /// Returns the time remaining until the armed deadline, split into whole
    /// seconds and a nanosecond remainder. Once the deadline has passed this
    /// must report `(0, 0)`.
    fn remaining(&mut self) -> Result<Remaining, Self::Error>;
}

/// Time remaining until a [`DeadlineTimer`] deadline, split the way the
/// reference implementation's `timer_gettime` result is split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Remaining {
    pub secs: u32,
    pub nanos: u32,
}

impl Remaining {
    pub const ZERO: Remaining = Remaining { secs: 0, nanos: 0 };

    /// Mirrors the reference implementation's loop guard `tv_sec > 0 &&
    /// tv_nsec > 0` read as a termination test: the loop keeps going only
    /// while *both* fields are nonzero, so it exits a tick early whenever
    /// either field happens to land on zero (e.g. exactly `1.0s` remaining
    /// reads as `tv_sec=1, tv_nsec=0` and already terminates). Preserved
    /// verbatim per §9.
    pub fn is_expired(self) -> bool {
        !(self.secs > 0 && self.nanos > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_remaining_is_expired() {
        assert!(Remaining::ZERO.is_expired());
    }

    #[test]
    fn either_field_zero_is_expired() {
        assert!(Remaining { secs: 1, nanos: 0 }.is_expired());
        assert!(Remaining { secs: 0, nanos: 500_000_000 }.is_expired());
    }

    #[test]
    fn both_fields_nonzero_is_not_expired() {
        assert!(!Remaining { secs: 1, nanos: 500_000_000 }.is_expired());
    }
}
