//! Hand-rolled fakes for the hardware collaborator traits, shared by the
//! `#[cfg(test)]` modules in `interface`, `power` and `panel`.
//!
//! This codebase's own tests don't reach for `embedded-hal-mock` in actual
//! `#[test]` functions (only in doc-comment examples), so this mirrors that
//! posture: small, deterministic fakes instead of a mocking crate.

#![cfg(test)]

use core::convert::Infallible;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

use crate::timer::{DeadlineTimer, Remaining};

/// An `OutputPin` fake that records every level it was driven to.
#[derive(Default)]
pub(crate) struct FakePin {
    pub history: heapless_history::History,
    pub level: bool,
}

impl ErrorType for FakePin {
    type Error = Infallible;
}

impl OutputPin for FakePin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.level = false;
        self.history.push(false);
        Ok(())
    }
    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.level = true;
        self.history.push(true);
        Ok(())
    }
}

/// An `InputPin` fake whose level is set by the test driving it.
pub(crate) struct FakeBusy {
    pub level: bool,
}

impl ErrorType for FakeBusy {
    type Error = Infallible;
}

impl InputPin for FakeBusy {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.level)
    }
    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.level)
    }
}

/// A no-op `DelayNs` that just counts total requested nanoseconds, so tests
/// can assert on aggregate sleep time without actually sleeping.
#[derive(Default)]
pub(crate) struct FakeDelay {
    pub total_ns: u64,
}

impl DelayNs for FakeDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += ns as u64;
    }
}

/// A `DeadlineTimer` fake driven by a caller-supplied countdown of `remaining()`
/// answers, one per call, repeating the last answer once exhausted.
pub(crate) struct ScriptedTimer<'a> {
    pub armed_ms: heapless_history::History32,
    answers: &'a [Remaining],
    next: usize,
}

impl<'a> ScriptedTimer<'a> {
    pub(crate) fn new(answers: &'a [Remaining]) -> Self {
        ScriptedTimer { armed_ms: Default::default(), answers, next: 0 }
    }
}

impl<'a> DeadlineTimer for ScriptedTimer<'a> {
    type Error = Infallible;
    fn arm_ms(&mut self, millis: u32) -> Result<(), Self::Error> {
        self.armed_ms.push(millis);
        Ok(())
    }
    fn remaining(&mut self) -> Result<Remaining, Self::Error> {
        let answer = self.answers.get(self.next).copied().unwrap_or(Remaining::ZERO);
        self.next += 1;
        Ok(answer)
    }
}

/// Tiny fixed-capacity push-only histories, standing in for `Vec` in this
/// `no_std` crate's tests.
pub(crate) mod heapless_history {
    #[derive(Default)]
    pub(crate) struct History {
        pub values: [Option<bool>; 64],
        pub len: usize,
    }
    impl History {
        pub fn push(&mut self, value: bool) {
            if self.len < self.values.len() {
                self.values[self.len] = Some(value);
                self.len += 1;
            }
        }
        pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
            self.values[..self.len].iter().map(|v| v.unwrap())
        }
    }

    #[derive(Default)]
    pub(crate) struct History32 {
        pub values: [u32; 32],
        pub len: usize,
    }
    impl History32 {
        pub fn push(&mut self, value: u32) {
            if self.len < self.values.len() {
                self.values[self.len] = value;
                self.len += 1;
            }
        }
        pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
            self.values[..self.len].iter().copied()
        }
    }
}
