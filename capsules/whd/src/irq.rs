// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Interrupt glue. Both handlers run in interrupt context: they count the
//! interrupt, flag it for the worker and post the wake semaphore. No bus
//! I/O, locking or allocation happens here.

use crate::bus::WhdBus;
use crate::hil::{BufferProvider, HostWakeClient, Rtos, SdioHost, SdioHostClient};
use crate::stats::BusStats;

impl<'a, H: SdioHost<'a>, P: BufferProvider, R: Rtos> SdioHostClient for WhdBus<'a, H, P, R> {
    fn card_interrupt(&self) {
        BusStats::bump(&self.sdio.stats().sdio_intrs);
        self.thread.wake_for_interrupt();
    }
}

impl<'a, H: SdioHost<'a>, P: BufferProvider, R: Rtos> HostWakeClient for WhdBus<'a, H, P, R> {
    fn host_wake(&self) {
        BusStats::bump(&self.sdio.stats().oob_intrs);
        self.thread.wake_for_interrupt();
    }
}
