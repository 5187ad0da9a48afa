// SPDX-License-Identifier: GPL-3.0-only

//! Bounded retry with exponential backoff and jitter
//!
//! Used for the forced partition-table rescan, which races the kernel's
//! asynchronous device-event processing right after a device was written.

use std::fmt::Display;
use std::thread;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of invocations, including the first
    pub attempts: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            initial_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, initial_delay: Duration) -> Self {
        Self {
            attempts,
            initial_delay,
        }
    }

    /// Base pause after each failed attempt that still has a successor.
    ///
    /// The delay doubles every time; jitter is added on top when sleeping.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + use<> {
        let initial = self.initial_delay;
        (0..self.attempts.max(1) - 1)
            .map(move |retry| initial.saturating_mul(2u32.saturating_pow(retry)))
    }

    /// Invoke `op` until it succeeds or attempts run out, sleeping between tries.
    pub fn run<T, E, F>(&self, op: F) -> Result<T, E>
    where
        E: Display,
        F: FnMut() -> Result<T, E>,
    {
        self.run_with(&mut rand::thread_rng(), thread::sleep, op)
    }

    /// Same as [`RetryPolicy::run`] with the random source and the sleep
    /// supplied by the caller.
    pub fn run_with<T, E, R, S, F>(&self, rng: &mut R, mut sleep: S, mut op: F) -> Result<T, E>
    where
        E: Display,
        R: Rng,
        S: FnMut(Duration),
        F: FnMut() -> Result<T, E>,
    {
        let mut delays = self.delays();
        let mut attempt = 1;
        loop {
            let error = match op() {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            // Exhausted: surface the last failure as is.
            let Some(base) = delays.next() else {
                return Err(error);
            };

            let pause = base + jitter(rng, base);
            warn!(
                "attempt {}/{} failed: {}; retrying in {:?}",
                attempt, self.attempts, error, pause
            );
            sleep(pause);
            attempt += 1;
        }
    }
}

/// Uniform random extra delay in `[0, delay / 2]`.
pub fn jitter<R: Rng>(rng: &mut R, delay: Duration) -> Duration {
    let max = u64::try_from((delay / 2).as_nanos()).unwrap_or(u64::MAX);
    if max == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos(rng.gen_range(0..=max))
}
