// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

// SDIO card common control registers (function 0)
pub(crate) const SDIOD_CCCR_IOEN: u32 = 0x02;
pub(crate) const SDIOD_CCCR_IORDY: u32 = 0x03;
pub(crate) const SDIOD_CCCR_INTEN: u32 = 0x04;
pub(crate) const SDIOD_CCCR_IOABORT: u32 = 0x06;
pub(crate) const SDIOD_CCCR_BICTRL: u32 = 0x07;
pub(crate) const SDIOD_CCCR_SPEED_CONTROL: u32 = 0x13;
pub(crate) const SDIOD_SEP_INT_CTL: u32 = 0xF2;

pub(crate) const SDIOD_CCCR_BLKSIZE_0: u32 = 0x10;
pub(crate) const SDIOD_CCCR_F1BLKSIZE_0: u32 = 0x110;
pub(crate) const SDIOD_CCCR_F2BLKSIZE_0: u32 = 0x210;

pub(crate) const SDIO_FUNC_ENABLE_1: u8 = 0x02;
pub(crate) const SDIO_FUNC_ENABLE_2: u8 = 0x04;
pub(crate) const SDIO_FUNC_READY_2: u8 = 0x04;

pub(crate) const INTR_CTL_MASTER_EN: u8 = 0x01;
pub(crate) const INTR_CTL_FUNC1_EN: u8 = 0x02;
pub(crate) const INTR_CTL_FUNC2_EN: u8 = 0x04;

pub(crate) const BUS_SD_DATA_WIDTH_MASK: u8 = 0x03;
pub(crate) const BUS_SD_DATA_WIDTH_4BIT: u8 = 0x02;

pub(crate) const SPEED_SUPPORT_HIGH: u8 = 0x01; // SHS
pub(crate) const SPEED_ENABLE_HIGH: u8 = 0x02; // EHS
pub(crate) const HIGH_SPEED_MIN_HZ: u32 = 25_000_000;

pub(crate) const SEP_INTR_CTL_MASK: u8 = 0x01;
pub(crate) const SEP_INTR_CTL_EN: u8 = 0x02;
pub(crate) const SEP_INTR_CTL_POL: u8 = 0x04;

pub(crate) const SDIO_BLOCK_SIZE: u16 = 64;

// Function 1 registers
pub(crate) const SDIO_FUNCTION2_WATERMARK: u32 = 0x10008;
pub(crate) const SDIO_BACKPLANE_ADDRESS_LOW: u32 = 0x1000A;
pub(crate) const SDIO_BACKPLANE_ADDRESS_MID: u32 = 0x1000B;
pub(crate) const SDIO_BACKPLANE_ADDRESS_HIGH: u32 = 0x1000C;
pub(crate) const SDIO_FRAME_CONTROL: u32 = 0x1000D;
pub(crate) const SDIO_CHIP_CLOCK_CSR: u32 = 0x1000E;
pub(crate) const SDIO_PULL_UP: u32 = 0x1000F;

pub(crate) const SDIO_F2_WATERMARK: u8 = 8;
pub(crate) const SFC_RF_TERM: u8 = 0x01;

// Chip clock control and status bits
pub(crate) const SBSDIO_FORCE_ALP: u8 = 0x01;
pub(crate) const SBSDIO_ALP_AVAIL_REQ: u8 = 0x08;
pub(crate) const SBSDIO_HT_AVAIL_REQ: u8 = 0x10;
pub(crate) const SBSDIO_FORCE_HW_CLKREQ_OFF: u8 = 0x20;
pub(crate) const SBSDIO_ALP_AVAIL: u8 = 0x40;
pub(crate) const SBSDIO_HT_AVAIL: u8 = 0x80;

// Backplane window
pub(crate) const BACKPLANE_ADDRESS_MASK: u32 = 0x7FFF;
pub(crate) const BACKPLANE_WINDOW_SIZE: u32 = BACKPLANE_ADDRESS_MASK + 1;
pub(crate) const SBSDIO_SB_ACCESS_2_4B_FLAG: u32 = 0x8000;

// Chipcommon core, relative to the core base
pub(crate) const CHIPCOMMON_GPIO_OUTPUT_EN: u32 = 0x68;
pub(crate) const CHIPCOMMON_GPIO_CONTROL: u32 = 0x6C;

// SDIO device core, relative to the core base
pub(crate) const SDIO_INT_STATUS: u32 = 0x20;
pub(crate) const SDIO_INT_HOST_MASK: u32 = 0x24;
pub(crate) const SDIO_TO_SB_MAILBOX: u32 = 0x40;

pub(crate) const SMB_NAK: u32 = 1 << 0;
pub(crate) const SMB_DEV_INT: u32 = 1 << 3;

// Interrupt status bits
pub(crate) const I_HMB_FC_STATE: u32 = 1 << 4;
pub(crate) const I_HMB_FC_CHANGE: u32 = 1 << 5;
pub(crate) const I_HMB_FRAME_IND: u32 = 1 << 6;
pub(crate) const I_HMB_HOST_INT: u32 = 1 << 7;
pub(crate) const I_HMB_SW_MASK: u32 =
    I_HMB_FC_STATE | I_HMB_FC_CHANGE | I_HMB_FRAME_IND | I_HMB_HOST_INT;
pub(crate) const I_PC: u32 = 1 << 10;
pub(crate) const I_PD: u32 = 1 << 11;
pub(crate) const I_DE: u32 = 1 << 12;
pub(crate) const I_RU: u32 = 1 << 13;
pub(crate) const I_RO: u32 = 1 << 14;
pub(crate) const I_XU: u32 = 1 << 15;
pub(crate) const I_ERRORS: u32 = I_PC | I_PD | I_DE | I_RU | I_RO | I_XU;

pub(crate) const FRAME_AVAILABLE_MASK: u32 = I_HMB_SW_MASK;

// AMBA interconnect wrapper
pub(crate) const AI_IOCTRL_OFFSET: u32 = 0x408;
pub(crate) const AI_IOCTRL_BIT_FGC: u32 = 0x0002;
pub(crate) const AI_IOCTRL_BIT_CLOCK_EN: u32 = 0x0001;

pub(crate) const AI_RESETCTRL_OFFSET: u32 = 0x800;
pub(crate) const AI_RESETCTRL_BIT_RESET: u32 = 0x01;

// SOCSRAM bank registers
pub(crate) const SOCSRAM_BANKX_INDEX: u32 = 0x10;
pub(crate) const SOCSRAM_BANKX_PDA: u32 = 0x44;

// Bring-up poll bounds, one millisecond per iteration
pub(crate) const ENUMERATION_POLLS: u32 = 500;
pub(crate) const F1_ENABLE_POLLS: u32 = 500;
pub(crate) const BLOCK_SIZE_POLLS: u32 = 500;
pub(crate) const ALP_AVAIL_POLLS: u32 = 100;
pub(crate) const CORE_UP_POLLS: u32 = 100;
pub(crate) const HT_AVAIL_POLLS: u32 = 500;
pub(crate) const F2_READY_POLLS: u32 = 1000;
pub(crate) const POLL_INTERVAL_MS: u32 = 1;
