// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! WHD (Wi-Fi Host Driver) SDIO bus transport
//!
//! Infineon's WHD documentation: <https://infineon.github.io/wifi-host-driver/html/index.html>
//!
//! The transport turns an SDIO host controller and one dedicated worker
//! thread into a flow-controlled packet channel to the wireless chip's
//! firmware. It is layered as:
//! - command: CMD52/CMD53 dispatch and argument encoding
//! - backplane: the movable window onto the chip's 32-bit backplane
//! - bringup: card enumeration, clocking, firmware download, interrupt arming
//! - sdpcm: hardware tag, SDPCM header and the transmit credit controller
//! - thread: the worker loop that performs all bus I/O after bring-up
//! - irq: interrupt-context glue that only flags work and wakes the worker
//!
//! [`WhdBus`] ties the layers together and is normally created through
//! [`WhdBusComponent`].

#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]

extern crate alloc;

pub mod backplane;
pub mod bringup;
pub mod bus;
pub mod command;
pub mod component;
pub mod config;
mod constants;
pub mod error;
pub mod hil;
mod irq;
pub mod poll;
pub mod queue;
pub mod sdpcm;
pub mod stats;
pub mod thread;


pub use bringup::{BusState, InitStep};
pub use bus::WhdBus;
pub use component::{Component, WhdBusComponent};
pub use config::{BusConfig, ChipInfo, OobConfig, ThreadConfig};
pub use error::{ErrorCode, InitError};
pub use stats::StatsSnapshot;
