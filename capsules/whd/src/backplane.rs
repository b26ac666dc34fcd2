// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Backplane window manager.
//!
//! Function 1 only exposes a 32 KiB window of the chip's 32-bit backplane.
//! Each access programs the window base, transfers through the low offset
//! bits and moves the window back to the chipcommon core. The lock is held
//! for that whole sequence so two accesses can never interleave their
//! window updates.

use spin::Mutex;

use crate::command::{SdioTransport, CMD53_MAX_BYTES};
use crate::constants::{
    BACKPLANE_ADDRESS_MASK, BACKPLANE_WINDOW_SIZE, SBSDIO_SB_ACCESS_2_4B_FLAG,
    SDIO_BACKPLANE_ADDRESS_HIGH, SDIO_BACKPLANE_ADDRESS_LOW, SDIO_BACKPLANE_ADDRESS_MID,
};
use crate::hil::{Direction, Function, SdioHost};
use crate::ErrorCode;

/// Window value that never matches a programmed one.
const WINDOW_UNKNOWN: u32 = 0xFFFF_FFFF;

pub struct Backplane {
    /// Base of the window as last written to the chip.
    window: Mutex<u32>,
    canonical_base: u32,
}

impl Backplane {
    pub const fn new(canonical_base: u32) -> Self {
        Self {
            window: Mutex::new(WINDOW_UNKNOWN),
            canonical_base,
        }
    }

    pub fn current_window(&self) -> u32 {
        *self.window.lock()
    }

    /// Forget the cached window, e.g. after the chip was reset.
    pub(crate) fn invalidate(&self) {
        *self.window.lock() = WINDOW_UNKNOWN;
    }

    pub fn read_value<'a, H: SdioHost<'a>>(
        &self,
        sdio: &SdioTransport<'a, H>,
        address: u32,
        size: usize,
    ) -> Result<u32, ErrorCode> {
        if size == 0 || size > 4 {
            return Err(ErrorCode::INVAL);
        }
        let mut buf = [0u8; 4];
        self.access(sdio, Direction::Read, address, &mut buf[..size], size == 4)?;
        Ok(u32::from_le_bytes(buf))
    }

    pub fn write_value<'a, H: SdioHost<'a>>(
        &self,
        sdio: &SdioTransport<'a, H>,
        address: u32,
        size: usize,
        value: u32,
    ) -> Result<(), ErrorCode> {
        if size == 0 || size > 4 {
            return Err(ErrorCode::INVAL);
        }
        let mut buf = value.to_le_bytes();
        self.access(sdio, Direction::Write, address, &mut buf[..size], size == 4)
    }

    /// Read a block of backplane memory, one window at a time.
    pub fn read_bytes<'a, H: SdioHost<'a>>(
        &self,
        sdio: &SdioTransport<'a, H>,
        address: u32,
        data: &mut [u8],
    ) -> Result<(), ErrorCode> {
        self.bulk(sdio, Direction::Read, address, data)
    }

    /// Write a block of backplane memory, one window at a time.
    pub fn write_bytes<'a, H: SdioHost<'a>>(
        &self,
        sdio: &SdioTransport<'a, H>,
        address: u32,
        data: &mut [u8],
    ) -> Result<(), ErrorCode> {
        self.bulk(sdio, Direction::Write, address, data)
    }

    fn bulk<'a, H: SdioHost<'a>>(
        &self,
        sdio: &SdioTransport<'a, H>,
        direction: Direction,
        mut address: u32,
        mut data: &mut [u8],
    ) -> Result<(), ErrorCode> {
        if data.is_empty() {
            return Err(ErrorCode::INVAL);
        }
        while !data.is_empty() {
            let window_offset = address & BACKPLANE_ADDRESS_MASK;
            let window_remaining = (BACKPLANE_WINDOW_SIZE - window_offset) as usize;
            let len = data.len().min(window_remaining).min(CMD53_MAX_BYTES);

            let (chunk, rest) = data.split_at_mut(len);
            self.access(sdio, direction, address, chunk, false)?;

            address += len as u32;
            data = rest;
        }
        Ok(())
    }

    fn access<'a, H: SdioHost<'a>>(
        &self,
        sdio: &SdioTransport<'a, H>,
        direction: Direction,
        address: u32,
        data: &mut [u8],
        four_byte: bool,
    ) -> Result<(), ErrorCode> {
        let mut window = self.window.lock();

        Self::set_window(sdio, &mut window, address)?;
        let mut offset = address & BACKPLANE_ADDRESS_MASK;
        if four_byte {
            offset |= SBSDIO_SB_ACCESS_2_4B_FLAG;
        }
        let result = sdio.transfer(direction, Function::Backplane, offset, data);
        let reset = Self::set_window(sdio, &mut window, self.canonical_base);

        result.and(reset)
    }

    fn set_window<'a, H: SdioHost<'a>>(
        sdio: &SdioTransport<'a, H>,
        current: &mut u32,
        address: u32,
    ) -> Result<(), ErrorCode> {
        let new_window = address & !BACKPLANE_ADDRESS_MASK;
        if new_window == *current {
            return Ok(());
        }

        let registers = [
            (24, SDIO_BACKPLANE_ADDRESS_HIGH),
            (16, SDIO_BACKPLANE_ADDRESS_MID),
            (8, SDIO_BACKPLANE_ADDRESS_LOW),
        ];
        for (shift, register) in registers {
            let byte = (new_window >> shift) as u8;
            if *current == WINDOW_UNKNOWN || byte != (*current >> shift) as u8 {
                if let Err(err) = sdio.write_u8(Function::Backplane, register, byte) {
                    *current = WINDOW_UNKNOWN;
                    return Err(err);
                }
            }
        }
        *current = new_window;
        Ok(())
    }
}
