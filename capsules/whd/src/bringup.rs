// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Bus bring-up and bring-down.
//!
//! Bring-up walks the chip from power-on to a running firmware with armed
//! interrupts. Every polling stage is bounded and every stage reports its
//! own [`InitStep`] on failure. A failed bring-up leaves the bus in
//! [`BusState::Reset`]; retrying means running `init` again from scratch.

use alloc::vec;

use crate::bus::{BusPower, WhdBus};
use crate::constants::*;
use crate::hil::{
    BufferProvider, BusWidth, Direction, Edge, Function, Resource, Rtos, SdioCommand, SdioHost,
};
use crate::poll::poll_until;
use crate::{ErrorCode, InitError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum BusState {
    Reset,
    BackplaneEnumerated,
    WidthNegotiated,
    BlockSizeSet,
    AlpClockReady,
    FirmwareDownloaded,
    ArmClockReady,
    InterruptsArmed,
    Up,
}

/// Bring-up stages, in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InitStep {
    Attach,
    Enumerate,
    EnableBackplane,
    BusWidth,
    BlockSize,
    OobInterrupt,
    AlpClock,
    Download,
    CoreUp,
    HtClock,
    Interrupts,
    F2Ready,
    WorkerThread,
}

impl InitStep {
    /// The state the bus is in once this stage has completed.
    pub const fn target_state(self) -> BusState {
        match self {
            InitStep::Attach => BusState::Reset,
            InitStep::Enumerate | InitStep::EnableBackplane => BusState::BackplaneEnumerated,
            InitStep::BusWidth => BusState::WidthNegotiated,
            InitStep::BlockSize | InitStep::OobInterrupt => BusState::BlockSizeSet,
            InitStep::AlpClock => BusState::AlpClockReady,
            InitStep::Download => BusState::FirmwareDownloaded,
            InitStep::CoreUp | InitStep::HtClock => BusState::ArmClockReady,
            InitStep::Interrupts => BusState::InterruptsArmed,
            InitStep::F2Ready | InitStep::WorkerThread => BusState::Up,
        }
    }
}

impl<'a, H: SdioHost<'a>, P: BufferProvider, R: Rtos> WhdBus<'a, H, P, R> {
    /// Bring the chip up. On success the bus is [`BusState::Up`] and ready
    /// for the worker thread.
    pub fn init(&self) -> Result<(), InitError> {
        if self.state() != BusState::Reset {
            return Err(InitError::new(InitStep::Enumerate, ErrorCode::ALREADY));
        }

        let result = self.bring_up();
        if let Err(err) = result {
            log::error!("whd: bring-up failed: {}", err);
            self.set_state(BusState::Reset);
            self.sdio.set_link_up(false);
            self.backplane.invalidate();
            *self.power.lock() = BusPower::default();
        }
        result
    }

    fn bring_up(&self) -> Result<(), InitError> {
        self.step(InitStep::Enumerate, || self.enumerate())?;
        self.step(InitStep::EnableBackplane, || self.enable_backplane())?;
        self.step(InitStep::BusWidth, || self.negotiate_width())?;
        self.step(InitStep::BlockSize, || self.set_block_size())?;
        self.step(InitStep::OobInterrupt, || self.configure_oob())?;
        self.step(InitStep::AlpClock, || self.request_alp())?;
        self.step(InitStep::Download, || self.download())?;
        self.step(InitStep::CoreUp, || self.start_arm_core())?;
        self.step(InitStep::HtClock, || self.request_ht())?;
        self.step(InitStep::Interrupts, || self.arm_interrupts())?;
        self.step(InitStep::F2Ready, || self.wait_f2_ready())?;

        self.sdio.set_link_up(true);
        *self.power.lock() = BusPower {
            awake: true,
            release_at: None,
        };
        self.credits.reset();
        if self.config.oob.is_none() {
            self.sdio.host().enable_card_interrupt(true);
        }
        log::info!("whd: {} up", self.config.chip.name);
        Ok(())
    }

    fn step<F: FnOnce() -> Result<(), ErrorCode>>(
        &self,
        step: InitStep,
        stage: F,
    ) -> Result<(), InitError> {
        stage().map_err(|code| InitError::new(step, code))?;
        self.set_state(step.target_state());
        log::debug!("whd: {:?} done", step);
        Ok(())
    }

    /// CMD0, CMD5 and CMD3 until the card answers, then select it.
    fn enumerate(&self) -> Result<(), ErrorCode> {
        let mut rca = 0;
        poll_until(self.rtos, ENUMERATION_POLLS, POLL_INTERVAL_MS, || {
            match self.try_enumerate() {
                Ok(addr) => {
                    rca = addr;
                    Ok(true)
                }
                Err(_) => Ok(false),
            }
        })?;
        self.sdio
            .host()
            .send_command(Direction::Write, SdioCommand::SelectCard, rca << 16)?;
        Ok(())
    }

    fn try_enumerate(&self) -> Result<u32, ErrorCode> {
        let host = self.sdio.host();
        host.send_command(Direction::Write, SdioCommand::GoIdleState, 0)?;
        host.send_command(Direction::Read, SdioCommand::IoSendOpCond, 0)?;
        let response = host.send_command(Direction::Read, SdioCommand::SendRelativeAddr, 0)?;
        Ok(response >> 16)
    }

    fn enable_backplane(&self) -> Result<(), ErrorCode> {
        poll_until(self.rtos, F1_ENABLE_POLLS, POLL_INTERVAL_MS, || {
            let enabled = self
                .sdio
                .write_u8(Function::Bus, SDIOD_CCCR_IOEN, SDIO_FUNC_ENABLE_1)
                .and_then(|()| self.sdio.read_u8(Function::Bus, SDIOD_CCCR_IOEN));
            Ok(matches!(enabled, Ok(ioen) if ioen & SDIO_FUNC_ENABLE_1 != 0))
        })
    }

    fn negotiate_width(&self) -> Result<(), ErrorCode> {
        let sdio = &self.sdio;
        let width = match self.config.bus_width {
            BusWidth::FourBit => BUS_SD_DATA_WIDTH_4BIT,
            BusWidth::OneBit => 0,
        };
        let bictrl = sdio.read_u8(Function::Bus, SDIOD_CCCR_BICTRL)?;
        sdio.write_u8(
            Function::Bus,
            SDIOD_CCCR_BICTRL,
            (bictrl & !BUS_SD_DATA_WIDTH_MASK) | width,
        )?;

        let mut clock_hz = self.config.clock_hz;
        if clock_hz > HIGH_SPEED_MIN_HZ {
            let speed = sdio.read_u8(Function::Bus, SDIOD_CCCR_SPEED_CONTROL)?;
            if speed & SPEED_SUPPORT_HIGH != 0 {
                sdio.write_u8(
                    Function::Bus,
                    SDIOD_CCCR_SPEED_CONTROL,
                    speed | SPEED_ENABLE_HIGH,
                )?;
            } else {
                log::warn!("whd: no high speed support, clock limited");
                clock_hz = HIGH_SPEED_MIN_HZ;
            }
        }
        sdio.host().configure(self.config.bus_width, clock_hz)
    }

    fn set_block_size(&self) -> Result<(), ErrorCode> {
        let sdio = &self.sdio;
        let [size_lo, size_hi] = SDIO_BLOCK_SIZE.to_le_bytes();
        poll_until(self.rtos, BLOCK_SIZE_POLLS, POLL_INTERVAL_MS, || {
            let size = sdio
                .write_u8(Function::Bus, SDIOD_CCCR_BLKSIZE_0, size_lo)
                .and_then(|()| sdio.read_u8(Function::Bus, SDIOD_CCCR_BLKSIZE_0));
            Ok(size == Ok(size_lo))
        })?;

        sdio.write_u8(Function::Bus, SDIOD_CCCR_BLKSIZE_0 + 1, size_hi)?;
        for register in [SDIOD_CCCR_F1BLKSIZE_0, SDIOD_CCCR_F2BLKSIZE_0] {
            sdio.write_u8(Function::Bus, register, size_lo)?;
            sdio.write_u8(Function::Bus, register + 1, size_hi)?;
        }
        Ok(())
    }

    fn configure_oob(&self) -> Result<(), ErrorCode> {
        let Some(oob) = self.config.oob else {
            return Ok(());
        };
        let pin = self.host_wake.ok_or(ErrorCode::INVAL)?;
        if pin.is_reserved() {
            pin.release();
        }

        if oob.device_gpio != 0 {
            let bit = 1u32
                .checked_shl(u32::from(oob.device_gpio))
                .ok_or(ErrorCode::INVAL)?;
            let chipcommon = self.config.chip.chipcommon_base;
            let output_en = chipcommon + CHIPCOMMON_GPIO_OUTPUT_EN;
            let control = chipcommon + CHIPCOMMON_GPIO_CONTROL;

            let value = self.backplane.read_value(&self.sdio, output_en, 4)?;
            self.backplane
                .write_value(&self.sdio, output_en, 4, value | bit)?;
            let value = self.backplane.read_value(&self.sdio, control, 4)?;
            self.backplane
                .write_value(&self.sdio, control, 4, value & !bit)?;
        }

        let mut sep = SEP_INTR_CTL_MASK | SEP_INTR_CTL_EN;
        if oob.active_high {
            sep |= SEP_INTR_CTL_POL;
        }
        self.sdio.write_u8(Function::Bus, SDIOD_SEP_INT_CTL, sep)?;

        let edge = if oob.active_high {
            Edge::Rising
        } else {
            Edge::Falling
        };
        pin.enable_interrupt(edge)
    }

    fn request_alp(&self) -> Result<(), ErrorCode> {
        let sdio = &self.sdio;
        sdio.write_u8(
            Function::Backplane,
            SDIO_CHIP_CLOCK_CSR,
            SBSDIO_FORCE_HW_CLKREQ_OFF | SBSDIO_ALP_AVAIL_REQ | SBSDIO_FORCE_ALP,
        )?;
        self.poll_clock(ALP_AVAIL_POLLS, SBSDIO_ALP_AVAIL)?;
        sdio.write_u8(Function::Backplane, SDIO_CHIP_CLOCK_CSR, 0)?;

        sdio.write_u8(
            Function::Bus,
            SDIOD_CCCR_IOEN,
            SDIO_FUNC_ENABLE_1 | SDIO_FUNC_ENABLE_2,
        )?;
        sdio.write_u8(Function::Backplane, SDIO_PULL_UP, 0)
    }

    fn request_ht(&self) -> Result<(), ErrorCode> {
        self.sdio
            .write_u8(Function::Backplane, SDIO_CHIP_CLOCK_CSR, SBSDIO_HT_AVAIL_REQ)?;
        self.poll_clock(HT_AVAIL_POLLS, SBSDIO_HT_AVAIL)
    }

    fn poll_clock(&self, polls: u32, available: u8) -> Result<(), ErrorCode> {
        poll_until(self.rtos, polls, POLL_INTERVAL_MS, || {
            let csr = self
                .sdio
                .read_u8(Function::Backplane, SDIO_CHIP_CLOCK_CSR)?;
            Ok(csr & available != 0)
        })
    }

    fn download(&self) -> Result<(), ErrorCode> {
        let chip = &self.config.chip;
        self.core_disable(chip.wlan_arm_wrapper)?;
        self.core_disable(chip.socsram_wrapper)?;
        self.core_reset(chip.socsram_wrapper)?;
        if let Some(socsram) = chip.socsram_core {
            // Disable remap of SRAM bank 3
            self.backplane
                .write_value(&self.sdio, socsram + SOCSRAM_BANKX_INDEX, 4, 3)?;
            self.backplane
                .write_value(&self.sdio, socsram + SOCSRAM_BANKX_PDA, 4, 0)?;
        }

        let firmware_len = self.resources.size(Resource::Firmware)?;
        if firmware_len == 0 {
            return Err(ErrorCode::INVAL);
        }
        self.download_resource(Resource::Firmware, firmware_len, chip.ram_base)?;
        log::debug!("whd: firmware loaded, {} bytes", firmware_len);

        let nvram_len = self.resources.size(Resource::Nvram)?;
        let padded = nvram_len.next_multiple_of(4);
        let nvram_top = chip.ram_base + chip.ram_size - 4;
        let padded_u32 = u32::try_from(padded).map_err(|_| ErrorCode::SIZE)?;
        if padded_u32 > nvram_top - chip.ram_base {
            return Err(ErrorCode::SIZE);
        }
        if padded > 0 {
            self.download_resource(Resource::Nvram, nvram_len, nvram_top - padded_u32)?;
        }

        // Size in words in the low half, its complement in the high half
        let words = padded_u32 / 4;
        let magic = (!words << 16) | (words & 0xFFFF);
        self.backplane.write_value(&self.sdio, nvram_top, 4, magic)
    }

    /// Copy a resource to backplane memory at `address`, chunk by chunk.
    /// Every chunk is filled completely before it is written, so only the
    /// last one is zero padded to a whole word.
    fn download_resource(
        &self,
        resource: Resource,
        len: usize,
        mut address: u32,
    ) -> Result<(), ErrorCode> {
        let mut chunk = vec![0u8; self.config.download_chunk];
        let mut offset = 0;
        while offset < len {
            let want = chunk.len().min(len - offset);
            let mut filled = 0;
            while filled < want {
                let read =
                    self.resources
                        .read(resource, offset + filled, &mut chunk[filled..want])?;
                if read == 0 || read > want - filled {
                    return Err(ErrorCode::FAIL);
                }
                filled += read;
            }
            let padded = want.next_multiple_of(4);
            chunk[want..padded].fill(0);
            self.backplane
                .write_bytes(&self.sdio, address, &mut chunk[..padded])?;

            offset += want;
            address += padded as u32;
        }
        Ok(())
    }

    fn start_arm_core(&self) -> Result<(), ErrorCode> {
        let arm = self.config.chip.wlan_arm_wrapper;
        self.core_reset(arm)?;
        poll_until(self.rtos, CORE_UP_POLLS, POLL_INTERVAL_MS, || {
            self.core_is_up(arm)
        })
    }

    fn arm_interrupts(&self) -> Result<(), ErrorCode> {
        self.backplane.write_value(
            &self.sdio,
            self.sdiod_register(SDIO_INT_HOST_MASK),
            4,
            I_HMB_SW_MASK,
        )?;
        self.sdio.write_u8(
            Function::Bus,
            SDIOD_CCCR_INTEN,
            INTR_CTL_MASTER_EN | INTR_CTL_FUNC1_EN | INTR_CTL_FUNC2_EN,
        )?;
        // A low watermark keeps F2 from stalling once the bus clock is gated.
        self.sdio.write_u8(
            Function::Backplane,
            SDIO_FUNCTION2_WATERMARK,
            SDIO_F2_WATERMARK,
        )
    }

    fn wait_f2_ready(&self) -> Result<(), ErrorCode> {
        poll_until(self.rtos, F2_READY_POLLS, POLL_INTERVAL_MS, || {
            let ready = self.sdio.read_u8(Function::Bus, SDIOD_CCCR_IORDY)?;
            Ok(ready & SDIO_FUNC_READY_2 != 0)
        })
    }

    fn core_disable(&self, wrapper: u32) -> Result<(), ErrorCode> {
        let resetctrl = wrapper + AI_RESETCTRL_OFFSET;
        let ioctrl = wrapper + AI_IOCTRL_OFFSET;

        if self.backplane.read_value(&self.sdio, resetctrl, 1)? & AI_RESETCTRL_BIT_RESET != 0 {
            return Ok(());
        }
        self.backplane.write_value(&self.sdio, ioctrl, 1, 0)?;
        self.backplane.read_value(&self.sdio, ioctrl, 1)?;
        self.rtos.delay_ms(1);

        self.backplane
            .write_value(&self.sdio, resetctrl, 1, AI_RESETCTRL_BIT_RESET)?;
        self.rtos.delay_ms(1);
        Ok(())
    }

    fn core_reset(&self, wrapper: u32) -> Result<(), ErrorCode> {
        let resetctrl = wrapper + AI_RESETCTRL_OFFSET;
        let ioctrl = wrapper + AI_IOCTRL_OFFSET;

        self.core_disable(wrapper)?;
        self.backplane.write_value(
            &self.sdio,
            ioctrl,
            1,
            AI_IOCTRL_BIT_FGC | AI_IOCTRL_BIT_CLOCK_EN,
        )?;
        self.backplane.read_value(&self.sdio, ioctrl, 1)?;

        self.backplane.write_value(&self.sdio, resetctrl, 1, 0)?;
        self.rtos.delay_ms(1);

        self.backplane
            .write_value(&self.sdio, ioctrl, 1, AI_IOCTRL_BIT_CLOCK_EN)?;
        self.backplane.read_value(&self.sdio, ioctrl, 1)?;
        self.rtos.delay_ms(1);
        Ok(())
    }

    fn core_is_up(&self, wrapper: u32) -> Result<bool, ErrorCode> {
        let io = self
            .backplane
            .read_value(&self.sdio, wrapper + AI_IOCTRL_OFFSET, 1)?;
        if io & (AI_IOCTRL_BIT_FGC | AI_IOCTRL_BIT_CLOCK_EN) != AI_IOCTRL_BIT_CLOCK_EN {
            return Ok(false);
        }
        let reset = self
            .backplane
            .read_value(&self.sdio, wrapper + AI_RESETCTRL_OFFSET, 1)?;
        Ok(reset & AI_RESETCTRL_BIT_RESET == 0)
    }

    /// Take the bus down. The worker thread has to be stopped first.
    ///
    /// Queued frames are released. Register writes are best effort: the
    /// chip may already be unreachable.
    pub fn deinit(&self) -> Result<(), ErrorCode> {
        if self.thread.is_running() {
            return Err(ErrorCode::BUSY);
        }
        if self.state() == BusState::Reset {
            return Err(ErrorCode::ALREADY);
        }

        self.set_state(BusState::Reset);
        self.sdio.set_link_up(false);
        self.sdio.host().enable_card_interrupt(false);
        if let (Some(_), Some(pin)) = (self.config.oob, self.host_wake) {
            pin.disable_interrupt();
        }
        self.release_queued();
        self.credits.reset();

        let sdio = &self.sdio;
        let mut result = sdio.write_u8(Function::Bus, SDIOD_CCCR_INTEN, 0);
        if self.config.oob.is_some() {
            result = result.and(sdio.write_u8(Function::Bus, SDIOD_SEP_INT_CTL, 0));
        }
        result = result
            .and(sdio.write_u8(Function::Backplane, SDIO_CHIP_CLOCK_CSR, 0))
            .and(sdio.write_u8(Function::Bus, SDIOD_CCCR_IOEN, 0));
        if let Err(err) = result {
            log::warn!("whd: bus shutdown incomplete: {:?}", err);
        }

        self.backplane.invalidate();
        *self.power.lock() = BusPower::default();
        log::debug!("whd: bus down");
        Ok(())
    }
}
