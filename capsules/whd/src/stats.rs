// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Bus statistics.
//!
//! Counters are only incremented by the worker thread and the interrupt
//! handlers; readers get a best-effort [`StatsSnapshot`].

use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};

macro_rules! bus_stats {
    ($($(#[$attr:meta])* $field:ident),* $(,)?) => {
        #[derive(Default)]
        pub struct BusStats {
            $($(#[$attr])* pub(crate) $field: AtomicU32),*
        }

        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
        pub struct StatsSnapshot {
            $($(#[$attr])* pub $field: u32),*
        }

        impl BusStats {
            pub fn snapshot(&self) -> StatsSnapshot {
                StatsSnapshot {
                    $($field: self.$field.load(Ordering::Relaxed)),*
                }
            }

            pub fn reset(&self) {
                $(self.$field.store(0, Ordering::Relaxed);)*
            }
        }

        impl fmt::Display for StatsSnapshot {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                $(writeln!(f, "{:>16}: {}", stringify!($field), self.$field)?;)*
                Ok(())
            }
        }
    };
}

bus_stats!(
    cmd52,
    cmd52_fail,
    cmd53_read,
    cmd53_read_fail,
    cmd53_write,
    cmd53_write_fail,
    /// In-band SDIO card interrupts
    sdio_intrs,
    /// Out-of-band host wake interrupts
    oob_intrs,
    /// Interrupt status reads with an error bit set
    error_intrs,
    read_aborts,
    tag_mismatches,
    rx_alloc_fails,
    credit_updates,
    frames_received,
    frames_sent,
    send_failures,
    /// Frames read with no client registered to take them
    rx_dropped,
    /// Queued frames released without being sent
    tx_dropped,
);

impl BusStats {
    pub(crate) fn bump(counter: &AtomicU32) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Log the counters, optionally clearing them afterwards.
    pub fn print(&self, reset_after: bool) {
        log::info!("WHD bus statistics:\n{}", self.snapshot());
        if reset_after {
            self.reset();
        }
    }
}
