// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Bus configuration.

use crate::hil::{BusWidth, ThreadParams, Timeout};
use crate::ErrorCode;

/// Out-of-band host wake interrupt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OobConfig {
    /// Chip GPIO that drives the host wake line.
    pub device_gpio: u8,
    pub active_high: bool,
}

/// Core and memory map of a chip.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChipInfo {
    pub name: &'static str,
    pub chipcommon_base: u32,
    pub sdiod_base: u32,
    pub wlan_arm_wrapper: u32,
    pub socsram_wrapper: u32,
    /// SOCSRAM core registers, if the chip needs the bank 3 remap disabled.
    pub socsram_core: Option<u32>,
    pub ram_base: u32,
    pub ram_size: u32,
}

impl ChipInfo {
    pub const CYW43439: ChipInfo = ChipInfo {
        name: "CYW43439",
        chipcommon_base: 0x1800_0000,
        sdiod_base: 0x1800_2000,
        wlan_arm_wrapper: 0x1810_3000,
        socsram_wrapper: 0x1810_4000,
        socsram_core: Some(0x1800_4000),
        ram_base: 0,
        ram_size: 512 * 1024,
    };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThreadConfig {
    pub name: &'static str,
    pub stack_size: usize,
    pub priority: u8,
    /// Frames read per wake before the send queue gets a turn.
    pub rx_limit: usize,
    /// Wake periodically and check for frames, for hosts that cannot
    /// deliver the card interrupt.
    pub poll_interval_ms: Option<u32>,
    /// Idle time after which the chip's HT clock request is dropped.
    pub bus_sleep_delay_ms: Option<u32>,
    /// Longest wait for a credit update after poking the firmware.
    pub poke_timeout_ms: u32,
}

impl ThreadConfig {
    pub fn params(&self) -> ThreadParams {
        ThreadParams {
            name: self.name,
            stack_size: self.stack_size,
            priority: self.priority,
        }
    }
}

impl Default for ThreadConfig {
    fn default() -> Self {
        Self {
            name: "whd",
            stack_size: 4096,
            priority: 7,
            rx_limit: 20,
            poll_interval_ms: None,
            bus_sleep_delay_ms: Some(10),
            poke_timeout_ms: 100,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BusConfig {
    pub bus_width: BusWidth,
    pub clock_hz: u32,
    pub oob: Option<OobConfig>,
    pub chip: ChipInfo,
    pub thread: ThreadConfig,
    /// Upper bound of the transmit credit.
    pub max_credit: u8,
    /// Bytes per firmware download transfer.
    pub download_chunk: usize,
    pub rx_alloc_timeout: Timeout,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            bus_width: BusWidth::FourBit,
            clock_hz: 25_000_000,
            oob: None,
            chip: ChipInfo::CYW43439,
            thread: ThreadConfig::default(),
            max_credit: 0x40,
            download_chunk: 512,
            rx_alloc_timeout: Timeout::Millis(0),
        }
    }
}

impl BusConfig {
    pub(crate) fn validate(&self) -> Result<(), ErrorCode> {
        if self.thread.rx_limit == 0 || self.download_chunk == 0 || self.max_credit == 0 {
            return Err(ErrorCode::INVAL);
        }
        // Downloads pad each chunk to a whole word.
        if self.download_chunk % 4 != 0 {
            return Err(ErrorCode::INVAL);
        }
        if self.chip.ram_size < 4 {
            return Err(ErrorCode::INVAL);
        }
        Ok(())
    }
}
