// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

use crate::hil::Delay;
use crate::ErrorCode;

/// Evaluate `ready` up to `max_iterations` times, sleeping `interval_ms`
/// after every attempt that is not ready.
///
/// Errors from `ready` end the poll immediately. Predicates that should ride
/// out a flaky bus map those errors to `Ok(false)` themselves.
pub fn poll_until<D, F>(
    delay: &D,
    max_iterations: u32,
    interval_ms: u32,
    mut ready: F,
) -> Result<(), ErrorCode>
where
    D: Delay + ?Sized,
    F: FnMut() -> Result<bool, ErrorCode>,
{
    for _ in 0..max_iterations {
        if ready()? {
            return Ok(());
        }
        delay.delay_ms(interval_ms);
    }
    Err(ErrorCode::TIMEOUT)
}
