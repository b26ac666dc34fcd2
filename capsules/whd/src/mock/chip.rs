// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Register level model of the chip behind an SDIO host.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use tock_registers::LocalRegisterCopy;

use crate::command::{CMD52, CMD53};
use crate::constants::*;
use crate::hil::{BusWidth, Direction, SdioCommand, SdioHost, SdioHostClient, TransferMode};
use crate::ErrorCode;

const INT_STATUS_ADDR: u32 = 0x1800_2000 + SDIO_INT_STATUS;
const MAILBOX_ADDR: u32 = 0x1800_2000 + SDIO_TO_SB_MAILBOX;

/// One request seen by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostCall {
    Command {
        direction: Direction,
        command: SdioCommand,
        argument: u32,
    },
    Bulk {
        direction: Direction,
        argument: u32,
        len: usize,
        mode: TransferMode,
    },
}

struct ChipState {
    calls: Vec<HostCall>,

    cccr: HashMap<u32, u8>,
    f1: HashMap<u32, u8>,
    memory: HashMap<u32, u8>,
    window_bytes: [u8; 3],
    window_writes: usize,
    clock_csr: u8,
    csr_reads: usize,
    iordy_reads: usize,

    int_status: u32,
    mailbox: Vec<u32>,
    frame_terminations: usize,
    rx: VecDeque<Vec<u8>>,
    current: Option<(Vec<u8>, usize)>,
    tx: Vec<Vec<u8>>,

    f1_enable: bool,
    alp_ready: bool,
    ht_ready: bool,
    f2_ready: bool,
    high_speed: bool,
    enum_failures: u32,
    command_failures: u32,
    bulk_skip: u32,
    bulk_failures: u32,

    configured: Option<(BusWidth, u32)>,
    card_interrupt: bool,
}

pub struct MockChip<'a> {
    state: Mutex<ChipState>,
    client: Mutex<Option<&'a dyn SdioHostClient>>,
}

impl<'a> MockChip<'a> {
    /// A chip that answers every bring-up poll right away.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ChipState {
                calls: Vec::new(),
                cccr: HashMap::new(),
                f1: HashMap::new(),
                memory: HashMap::new(),
                window_bytes: [0; 3],
                window_writes: 0,
                clock_csr: 0,
                csr_reads: 0,
                iordy_reads: 0,
                int_status: 0,
                mailbox: Vec::new(),
                frame_terminations: 0,
                rx: VecDeque::new(),
                current: None,
                tx: Vec::new(),
                f1_enable: true,
                alp_ready: true,
                ht_ready: true,
                f2_ready: true,
                high_speed: false,
                enum_failures: 0,
                command_failures: 0,
                bulk_skip: 0,
                bulk_failures: 0,
                configured: None,
                card_interrupt: false,
            }),
            client: Mutex::new(None),
        }
    }

    fn with<T>(&self, f: impl FnOnce(&mut ChipState) -> T) -> T {
        f(&mut self.state.lock().unwrap())
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.with(|s| s.calls.clone())
    }

    pub fn clear_calls(&self) {
        self.with(|s| s.calls.clear());
    }

    pub fn command_count(&self, command: SdioCommand) -> usize {
        self.with(|s| {
            s.calls
                .iter()
                .filter(|call| matches!(call, HostCall::Command { command: c, .. } if *c == command))
                .count()
        })
    }

    pub fn f0_register(&self, address: u32) -> u8 {
        self.with(|s| s.cccr.get(&address).copied().unwrap_or(0))
    }

    pub fn f1_register(&self, address: u32) -> u8 {
        self.with(|s| s.f1.get(&address).copied().unwrap_or(0))
    }

    pub fn memory(&self, address: u32, len: usize) -> Vec<u8> {
        self.with(|s| {
            (0..len as u32)
                .map(|i| s.memory.get(&(address + i)).copied().unwrap_or(0))
                .collect()
        })
    }

    pub fn memory_u32(&self, address: u32) -> u32 {
        let bytes = self.memory(address, 4);
        u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    pub fn window(&self) -> u32 {
        self.with(|s| s.window())
    }

    pub fn window_writes(&self) -> usize {
        self.with(|s| s.window_writes)
    }

    /// The chip clock CSR as last written.
    pub fn clock_csr(&self) -> u8 {
        self.with(|s| s.clock_csr)
    }

    pub fn csr_reads(&self) -> usize {
        self.with(|s| s.csr_reads)
    }

    pub fn iordy_reads(&self) -> usize {
        self.with(|s| s.iordy_reads)
    }

    pub fn configured(&self) -> Option<(BusWidth, u32)> {
        self.with(|s| s.configured)
    }

    pub fn card_interrupt_enabled(&self) -> bool {
        self.with(|s| s.card_interrupt)
    }

    pub fn raise_int_status(&self, bits: u32) {
        self.with(|s| s.int_status |= bits);
    }

    pub fn int_status(&self) -> u32 {
        self.with(|s| s.int_status)
    }

    pub fn naks(&self) -> usize {
        self.with(|s| s.mailbox.iter().filter(|&&m| m & SMB_NAK != 0).count())
    }

    pub fn pokes(&self) -> usize {
        self.with(|s| s.mailbox.iter().filter(|&&m| m & SMB_DEV_INT != 0).count())
    }

    pub fn frame_terminations(&self) -> usize {
        self.with(|s| s.frame_terminations)
    }

    pub fn push_rx_frame(&self, frame: Vec<u8>) {
        self.with(|s| s.rx.push_back(frame));
    }

    /// Frames not yet completely read, the one in progress included.
    pub fn rx_pending(&self) -> usize {
        self.with(|s| s.rx.len() + usize::from(s.current.is_some()))
    }

    pub fn tx_frames(&self) -> Vec<Vec<u8>> {
        self.with(|s| s.tx.clone())
    }

    pub fn set_f1_enable(&self, ready: bool) {
        self.with(|s| s.f1_enable = ready);
    }

    pub fn set_alp_ready(&self, ready: bool) {
        self.with(|s| s.alp_ready = ready);
    }

    pub fn set_ht_ready(&self, ready: bool) {
        self.with(|s| s.ht_ready = ready);
    }

    pub fn set_f2_ready(&self, ready: bool) {
        self.with(|s| s.f2_ready = ready);
    }

    pub fn set_high_speed(&self, supported: bool) {
        self.with(|s| s.high_speed = supported);
    }

    /// Fail the next `count` CMD5s.
    pub fn fail_enumeration(&self, count: u32) {
        self.with(|s| s.enum_failures = count);
    }

    pub fn fail_next_commands(&self, count: u32) {
        self.with(|s| s.command_failures = count);
    }

    pub fn fail_next_bulk(&self, count: u32) {
        self.with(|s| {
            s.bulk_skip = 0;
            s.bulk_failures = count;
        });
    }

    /// Let `skip` bulk transfers through, then fail one.
    pub fn fail_next_bulk_after(&self, skip: u32) {
        self.with(|s| {
            s.bulk_skip = skip;
            s.bulk_failures = 1;
        });
    }

    pub fn fire_card_interrupt(&self) {
        let client = *self.client.lock().unwrap();
        if let Some(client) = client {
            client.card_interrupt();
        }
    }
}

impl ChipState {
    fn window(&self) -> u32 {
        let [low, mid, high] = self.window_bytes;
        (u32::from(high) << 24) | (u32::from(mid) << 16) | (u32::from(low) << 8)
    }

    fn backplane_address(&self, offset: u32) -> u32 {
        self.window() | (offset & BACKPLANE_ADDRESS_MASK)
    }

    fn terminate_frame(&mut self) {
        self.current = None;
    }

    fn read_f0(&mut self, address: u32) -> u8 {
        let value = self.cccr.get(&address).copied().unwrap_or(0);
        match address {
            SDIOD_CCCR_IOEN if !self.f1_enable => value & !SDIO_FUNC_ENABLE_1,
            SDIOD_CCCR_IORDY => {
                self.iordy_reads += 1;
                let ioen = self.cccr.get(&SDIOD_CCCR_IOEN).copied().unwrap_or(0);
                let mut ready = ioen & SDIO_FUNC_ENABLE_1;
                if self.f2_ready && ioen & SDIO_FUNC_ENABLE_2 != 0 {
                    ready |= SDIO_FUNC_READY_2;
                }
                ready
            }
            SDIOD_CCCR_SPEED_CONTROL if self.high_speed => value | SPEED_SUPPORT_HIGH,
            _ => value,
        }
    }

    fn write_f0(&mut self, address: u32, value: u8) {
        if address == SDIOD_CCCR_IOABORT {
            self.terminate_frame();
        }
        self.cccr.insert(address, value);
    }

    fn read_f1(&mut self, address: u32) -> u8 {
        match address {
            SDIO_CHIP_CLOCK_CSR => {
                self.csr_reads += 1;
                let mut csr = self.clock_csr;
                if self.alp_ready && csr & SBSDIO_ALP_AVAIL_REQ != 0 {
                    csr |= SBSDIO_ALP_AVAIL;
                }
                if self.ht_ready && csr & SBSDIO_HT_AVAIL_REQ != 0 {
                    csr |= SBSDIO_HT_AVAIL;
                }
                csr
            }
            SDIO_BACKPLANE_ADDRESS_LOW => self.window_bytes[0],
            SDIO_BACKPLANE_ADDRESS_MID => self.window_bytes[1],
            SDIO_BACKPLANE_ADDRESS_HIGH => self.window_bytes[2],
            0x10000..=u32::MAX => self.f1.get(&address).copied().unwrap_or(0),
            _ => {
                let address = self.backplane_address(address);
                self.memory.get(&address).copied().unwrap_or(0)
            }
        }
    }

    fn write_f1(&mut self, address: u32, value: u8) {
        match address {
            SDIO_CHIP_CLOCK_CSR => self.clock_csr = value,
            SDIO_BACKPLANE_ADDRESS_LOW | SDIO_BACKPLANE_ADDRESS_MID | SDIO_BACKPLANE_ADDRESS_HIGH => {
                self.window_bytes[(address - SDIO_BACKPLANE_ADDRESS_LOW) as usize] = value;
                self.window_writes += 1;
            }
            SDIO_FRAME_CONTROL if value & SFC_RF_TERM != 0 => {
                self.frame_terminations += 1;
                self.terminate_frame();
            }
            0x10000..=u32::MAX => {
                self.f1.insert(address, value);
            }
            _ => {
                let address = self.backplane_address(address);
                self.memory.insert(address, value);
            }
        }
    }

    fn backplane_bulk(&mut self, direction: Direction, offset: u32, data: &mut [u8]) {
        let address = self.backplane_address(offset);
        match (direction, address, data.len()) {
            (Direction::Read, INT_STATUS_ADDR, 4) => {
                let mut status = self.int_status;
                if !self.rx.is_empty() || self.current.is_some() {
                    status |= I_HMB_FRAME_IND;
                }
                data.copy_from_slice(&status.to_le_bytes());
            }
            (Direction::Write, INT_STATUS_ADDR, 4) => {
                let bits = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
                self.int_status &= !bits;
            }
            (Direction::Write, MAILBOX_ADDR, 4) => {
                let value = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
                self.mailbox.push(value);
            }
            (Direction::Read, _, _) => {
                for (i, byte) in data.iter_mut().enumerate() {
                    *byte = self
                        .memory
                        .get(&(address + i as u32))
                        .copied()
                        .unwrap_or(0);
                }
            }
            (Direction::Write, _, _) => {
                for (i, byte) in data.iter().enumerate() {
                    self.memory.insert(address + i as u32, *byte);
                }
            }
        }
    }

    fn read_f2(&mut self, data: &mut [u8]) {
        data.fill(0);
        if self.current.is_none() {
            self.current = self.rx.pop_front().map(|frame| (frame, 0));
        }
        let Some((frame, pos)) = self.current.as_mut() else {
            return;
        };
        let n = data.len().min(frame.len() - *pos);
        data[..n].copy_from_slice(&frame[*pos..*pos + n]);
        *pos += n;
        if *pos >= frame.len() {
            self.current = None;
        }
    }

    fn take_bulk_failure(&mut self) -> bool {
        if self.bulk_skip > 0 {
            self.bulk_skip -= 1;
            return false;
        }
        if self.bulk_failures > 0 {
            self.bulk_failures -= 1;
            return true;
        }
        false
    }
}

impl<'a> SdioHost<'a> for MockChip<'a> {
    fn send_command(
        &self,
        direction: Direction,
        command: SdioCommand,
        argument: u32,
    ) -> Result<u32, ErrorCode> {
        self.with(|s| {
            s.calls.push(HostCall::Command {
                direction,
                command,
                argument,
            });
            if s.command_failures > 0 {
                s.command_failures -= 1;
                return Err(ErrorCode::FAIL);
            }

            match command {
                SdioCommand::IoSendOpCond if s.enum_failures > 0 => {
                    s.enum_failures -= 1;
                    Err(ErrorCode::NOACK)
                }
                SdioCommand::SendRelativeAddr => Ok(0x0001 << 16),
                SdioCommand::IoRwDirect => {
                    let arg = LocalRegisterCopy::<u32, CMD52::Register>::new(argument);
                    let address = arg.read(CMD52::ADDRESS);
                    let value = arg.read(CMD52::DATA) as u8;
                    let write = arg.read(CMD52::RW_FLAG) == 1;
                    let byte = match (arg.read(CMD52::FUNCTION), write) {
                        (0, false) => s.read_f0(address),
                        (0, true) => {
                            s.write_f0(address, value);
                            value
                        }
                        (1, false) => s.read_f1(address),
                        (1, true) => {
                            s.write_f1(address, value);
                            value
                        }
                        _ => return Err(ErrorCode::NOSUPPORT),
                    };
                    Ok(u32::from(byte))
                }
                _ => Ok(0),
            }
        })
    }

    fn bulk_transfer(
        &self,
        direction: Direction,
        argument: u32,
        data: &mut [u8],
        mode: TransferMode,
    ) -> Result<u32, ErrorCode> {
        self.with(|s| {
            s.calls.push(HostCall::Bulk {
                direction,
                argument,
                len: data.len(),
                mode,
            });
            if s.take_bulk_failure() {
                return Err(ErrorCode::FAIL);
            }

            let arg = LocalRegisterCopy::<u32, CMD53::Register>::new(argument);
            let address = arg.read(CMD53::ADDRESS);
            match (arg.read(CMD53::FUNCTION), direction) {
                (1, _) => s.backplane_bulk(direction, address, data),
                (2, Direction::Read) => s.read_f2(data),
                (2, Direction::Write) => s.tx.push(data.to_vec()),
                _ => return Err(ErrorCode::NOSUPPORT),
            }
            Ok(0)
        })
    }

    fn configure(&self, width: BusWidth, clock_hz: u32) -> Result<(), ErrorCode> {
        self.with(|s| s.configured = Some((width, clock_hz)));
        Ok(())
    }

    fn enable_card_interrupt(&self, enable: bool) {
        self.with(|s| s.card_interrupt = enable);
    }

    fn set_client(&self, client: &'a dyn SdioHostClient) {
        *self.client.lock().unwrap() = Some(client);
    }
}
