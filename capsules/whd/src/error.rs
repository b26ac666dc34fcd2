// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Standard error enum for transport operations

use core::fmt;

use crate::bringup::{BusState, InitStep};

/// Errors returned by the bus transport.
///
/// The first variants keep the meaning (and numbering) of the standard Tock
/// error codes; `TIMEOUT` and `BADTAG` are specific to the SDIO transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(usize)]
pub enum ErrorCode {
    /// Generic failure condition
    FAIL = 0,
    /// Underlying system is busy; retry
    BUSY = 1,
    /// The state requested is already set
    ALREADY = 2,
    /// The component is powered down
    OFF = 3,
    /// Reservation required before use
    RESERVE = 4,
    /// An invalid parameter was passed
    INVAL = 5,
    /// Parameter passed was too large
    SIZE = 6,
    /// Operation canceled by a call
    CANCEL = 7,
    /// Memory required not available
    NOMEM = 8,
    /// Operation or command is unsupported
    NOSUPPORT = 9,
    /// Device does not exist
    NODEVICE = 10,
    /// Device is not physically installed
    UNINSTALLED = 11,
    /// Packet transmission not acknowledged
    NOACK = 12,
    /// A bounded poll ran out of iterations
    TIMEOUT = 13,
    /// The hardware tag length words are not complements of each other
    BADTAG = 14,
}

impl From<ErrorCode> for usize {
    fn from(err: ErrorCode) -> usize {
        err as usize
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A failed bring-up: the stage that failed and the underlying error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InitError {
    pub step: InitStep,
    pub code: ErrorCode,
}

impl InitError {
    pub const fn new(step: InitStep, code: ErrorCode) -> Self {
        Self { step, code }
    }

    /// The resource provider cancelled the firmware or NVRAM download.
    pub fn is_aborted(&self) -> bool {
        self.code == ErrorCode::CANCEL
    }

    /// The bus state the bring-up was trying to reach when it failed.
    pub fn state(&self) -> BusState {
        self.step.target_state()
    }
}

impl From<InitError> for ErrorCode {
    fn from(err: InitError) -> ErrorCode {
        err.code
    }
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} failed: {}", self.step, self.code)
    }
}
