// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! SDIO command layer.
//!
//! Every access to the card goes through [`SdioTransport::transfer`], which
//! picks between CMD52 (one byte) and CMD53 (byte or block mode) and keeps
//! the attempt and failure counters of the bus. Transfers are never retried
//! here; the caller decides whether to abort the frame in flight.

use core::sync::atomic::{AtomicBool, Ordering};

use tock_registers::{register_bitfields, LocalRegisterCopy};

use crate::constants::SDIO_BLOCK_SIZE;
use crate::hil::{Direction, Function, SdioCommand, SdioHost, TransferMode};
use crate::stats::BusStats;
use crate::ErrorCode;

/// Largest block count a CMD53 argument can carry.
const CMD53_MAX_BLOCKS: usize = 511;

/// Largest transfer a single CMD53 can move.
pub(crate) const CMD53_MAX_BYTES: usize = CMD53_MAX_BLOCKS * SDIO_BLOCK_SIZE as usize;

register_bitfields![u32,
    pub(crate) CMD52 [
        RW_FLAG OFFSET(31) NUMBITS(1) [
            Read = 0,
            Write = 1,
        ],
        FUNCTION OFFSET(28) NUMBITS(3) [],
        RAW OFFSET(27) NUMBITS(1) [],
        ADDRESS OFFSET(9) NUMBITS(17) [],
        DATA OFFSET(0) NUMBITS(8) [],
    ],
    pub(crate) CMD53 [
        RW_FLAG OFFSET(31) NUMBITS(1) [
            Read = 0,
            Write = 1,
        ],
        FUNCTION OFFSET(28) NUMBITS(3) [],
        BLOCK_MODE OFFSET(27) NUMBITS(1) [
            Byte = 0,
            Block = 1,
        ],
        OP_CODE OFFSET(26) NUMBITS(1) [
            FixedAddress = 0,
            IncrementingAddress = 1,
        ],
        ADDRESS OFFSET(9) NUMBITS(17) [],
        COUNT OFFSET(0) NUMBITS(9) [],
    ]
];

/// CMD52 (IO_RW_DIRECT) argument.
pub(crate) struct Cmd52Argument(LocalRegisterCopy<u32, CMD52::Register>);

impl Cmd52Argument {
    pub(crate) fn new(direction: Direction, function: Function, address: u32, data: u8) -> Self {
        let mut local_reg = LocalRegisterCopy::<u32, CMD52::Register>::new(0u32);
        let rw = match direction {
            Direction::Read => CMD52::RW_FLAG::Read,
            Direction::Write => CMD52::RW_FLAG::Write,
        };

        local_reg.modify(
            rw + CMD52::FUNCTION.val(function as u32)
                + CMD52::ADDRESS.val(address)
                + CMD52::DATA.val(data as u32),
        );

        Self(local_reg)
    }

    pub(crate) fn get(&self) -> u32 {
        self.0.get()
    }
}

/// CMD53 (IO_RW_EXTENDED) argument. Addresses always increment.
pub(crate) struct Cmd53Argument(LocalRegisterCopy<u32, CMD53::Register>);

impl Cmd53Argument {
    pub(crate) fn new(
        direction: Direction,
        function: Function,
        block_mode: bool,
        address: u32,
        count: u32,
    ) -> Self {
        let mut local_reg = LocalRegisterCopy::<u32, CMD53::Register>::new(0u32);
        let rw = match direction {
            Direction::Read => CMD53::RW_FLAG::Read,
            Direction::Write => CMD53::RW_FLAG::Write,
        };
        let mode = if block_mode {
            CMD53::BLOCK_MODE::Block
        } else {
            CMD53::BLOCK_MODE::Byte
        };

        local_reg.modify(
            rw + CMD53::FUNCTION.val(function as u32)
                + mode
                + CMD53::OP_CODE::IncrementingAddress
                + CMD53::ADDRESS.val(address)
                + CMD53::COUNT.val(count),
        );

        Self(local_reg)
    }

    pub(crate) fn get(&self) -> u32 {
        self.0.get()
    }
}

/// The command layer on top of an SDIO host, with the bus statistics.
pub struct SdioTransport<'a, H: SdioHost<'a>> {
    host: &'a H,
    /// Set once bring-up completes. Until then unaligned bulk transfers are
    /// split, since the chip rejects them.
    link_up: AtomicBool,
    stats: BusStats,
}

impl<'a, H: SdioHost<'a>> SdioTransport<'a, H> {
    pub fn new(host: &'a H) -> Self {
        Self {
            host,
            link_up: AtomicBool::new(false),
            stats: BusStats::default(),
        }
    }

    pub fn host(&self) -> &'a H {
        self.host
    }

    pub fn stats(&self) -> &BusStats {
        &self.stats
    }

    pub fn is_link_up(&self) -> bool {
        self.link_up.load(Ordering::Acquire)
    }

    pub(crate) fn set_link_up(&self, up: bool) {
        self.link_up.store(up, Ordering::Release);
    }

    /// Move `data` to or from `address` of `function`.
    ///
    /// One byte is a CMD52. Anything longer is a CMD53, in block mode from
    /// one block up. Before the link is up an unaligned block transfer is
    /// issued as a block-aligned prefix followed by a byte-mode remainder.
    pub fn transfer(
        &self,
        direction: Direction,
        function: Function,
        address: u32,
        data: &mut [u8],
    ) -> Result<(), ErrorCode> {
        let block = SDIO_BLOCK_SIZE as usize;
        match data.len() {
            0 => Err(ErrorCode::INVAL),
            1 => self.cmd52(direction, function, address, &mut data[0]),
            len if !self.is_link_up() && len > block && len % block != 0 => {
                let prefix = len - len % block;
                let (head, tail) = data.split_at_mut(prefix);
                self.cmd53(direction, function, address, head)?;
                self.cmd53(direction, function, address + prefix as u32, tail)
            }
            _ => self.cmd53(direction, function, address, data),
        }
    }

    /// Read a 1, 2 or 4 byte little-endian register.
    pub fn read_register(
        &self,
        function: Function,
        address: u32,
        size: usize,
    ) -> Result<u32, ErrorCode> {
        if size == 0 || size > 4 {
            return Err(ErrorCode::INVAL);
        }
        let mut buf = [0u8; 4];
        self.transfer(Direction::Read, function, address, &mut buf[..size])?;
        Ok(u32::from_le_bytes(buf))
    }

    pub fn write_register(
        &self,
        function: Function,
        address: u32,
        size: usize,
        value: u32,
    ) -> Result<(), ErrorCode> {
        if size == 0 || size > 4 {
            return Err(ErrorCode::INVAL);
        }
        let mut buf = value.to_le_bytes();
        self.transfer(Direction::Write, function, address, &mut buf[..size])
    }

    pub(crate) fn read_u8(&self, function: Function, address: u32) -> Result<u8, ErrorCode> {
        let mut byte = 0;
        self.cmd52(Direction::Read, function, address, &mut byte)?;
        Ok(byte)
    }

    pub(crate) fn write_u8(
        &self,
        function: Function,
        address: u32,
        value: u8,
    ) -> Result<(), ErrorCode> {
        let mut byte = value;
        self.cmd52(Direction::Write, function, address, &mut byte)
    }

    fn cmd52(
        &self,
        direction: Direction,
        function: Function,
        address: u32,
        byte: &mut u8,
    ) -> Result<(), ErrorCode> {
        let data = match direction {
            Direction::Write => *byte,
            Direction::Read => 0,
        };
        let argument = Cmd52Argument::new(direction, function, address, data).get();

        BusStats::bump(&self.stats.cmd52);
        match self
            .host
            .send_command(direction, SdioCommand::IoRwDirect, argument)
        {
            Ok(response) => {
                if direction == Direction::Read {
                    *byte = (response & 0xFF) as u8;
                }
                Ok(())
            }
            Err(err) => {
                BusStats::bump(&self.stats.cmd52_fail);
                Err(err)
            }
        }
    }

    fn cmd53(
        &self,
        direction: Direction,
        function: Function,
        address: u32,
        data: &mut [u8],
    ) -> Result<(), ErrorCode> {
        let block = SDIO_BLOCK_SIZE as usize;
        let (mode, count) = if data.len() >= block {
            let blocks = data.len().div_ceil(block);
            if blocks > CMD53_MAX_BLOCKS {
                return Err(ErrorCode::SIZE);
            }
            (
                TransferMode::Block {
                    blocks: blocks as u16,
                    block_size: SDIO_BLOCK_SIZE,
                },
                blocks as u32,
            )
        } else {
            (TransferMode::Byte, data.len() as u32)
        };
        let block_mode = matches!(mode, TransferMode::Block { .. });
        let argument = Cmd53Argument::new(direction, function, block_mode, address, count).get();

        let (attempts, failures) = match direction {
            Direction::Read => (&self.stats.cmd53_read, &self.stats.cmd53_read_fail),
            Direction::Write => (&self.stats.cmd53_write, &self.stats.cmd53_write_fail),
        };
        BusStats::bump(attempts);
        match self.host.bulk_transfer(direction, argument, data, mode) {
            Ok(_) => Ok(()),
            Err(err) => {
                BusStats::bump(failures);
                log::warn!(
                    "whd: CMD53 {:?} F{} {:#x} ({} bytes) failed: {:?}",
                    direction,
                    function as u8,
                    address,
                    data.len(),
                    err
                );
                Err(err)
            }
        }
    }
}
