// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Interfaces to the collaborators the transport is built on.
//!
//! The transport does not own any hardware directly. It drives an SDIO host
//! controller through [`SdioHost`], takes packet memory from a
//! [`BufferProvider`], runs its worker through [`Rtos`] and reads the
//! firmware and NVRAM images from a [`ResourceProvider`]. The optional
//! out-of-band wake line is a [`HostWakePin`].
//!
//! Everything here is shared between the worker thread and interrupt
//! context, hence the `Sync` bounds.

use alloc::boxed::Box;

use crate::ErrorCode;

/// Direction of a bus transfer, seen from the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Read = 0,
    Write = 1,
}

/// SDIO function numbers used by the WLAN chip.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Function {
    /// Function 0: card common control registers
    Bus = 0,
    /// Function 1: backplane access and SDIO core registers
    Backplane = 1,
    /// Function 2: WLAN data frames
    Wlan = 2,
}

/// SDIO commands issued by the transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SdioCommand {
    GoIdleState = 0,
    SendRelativeAddr = 3,
    IoSendOpCond = 5,
    SelectCard = 7,
    IoRwDirect = 52,
    IoRwExtended = 53,
}

/// Data lines used on the bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BusWidth {
    OneBit,
    FourBit,
}

/// How the host controller should move the data of a CMD53.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferMode {
    /// `blocks` transfers of `block_size` bytes
    Block { blocks: u16, block_size: u16 },
    /// A single transfer of the slice length
    Byte,
}

/// SDIO host controller.
///
/// Calls block until the controller reports completion; the worker thread is
/// the only caller once the bus is up.
pub trait SdioHost<'a>: Sync {
    /// Send a command that carries no data phase and return its response.
    fn send_command(
        &self,
        direction: Direction,
        command: SdioCommand,
        argument: u32,
    ) -> Result<u32, ErrorCode>;

    /// Issue a CMD53 with `argument` and move `data`.
    ///
    /// In block mode `data` may be shorter than `blocks * block_size`: the
    /// host pads a write and discards the excess of a read.
    fn bulk_transfer(
        &self,
        direction: Direction,
        argument: u32,
        data: &mut [u8],
        mode: TransferMode,
    ) -> Result<u32, ErrorCode>;

    /// Change the bus width and clock once the card has been configured.
    fn configure(&self, width: BusWidth, clock_hz: u32) -> Result<(), ErrorCode>;

    fn enable_card_interrupt(&self, enable: bool);

    fn set_client(&self, client: &'a dyn SdioHostClient);
}

pub trait SdioHostClient: Sync {
    /// Called from interrupt context when the card raises its interrupt.
    fn card_interrupt(&self);
}

/// Outcome of asking a buffer for header room at its front.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrontSpace {
    Done,
    /// The buffer has no headroom left; a separate buffer has to be chained
    /// in front of it.
    NeedsChainedBuffer,
}

/// A packet buffer with a movable start of data.
pub trait PacketBuffer: Send {
    /// The current data, from the current start up to the current size.
    fn data(&self) -> &[u8];

    fn data_mut(&mut self) -> &mut [u8];

    fn len(&self) -> usize {
        self.data().len()
    }

    /// Change the current size, keeping the start of data.
    fn set_len(&mut self, len: usize) -> Result<(), ErrorCode>;

    /// Check that `bytes` of headroom are available in front of the data.
    fn reserve_front(&mut self, bytes: usize) -> FrontSpace;

    /// Move the start of data back by `bytes`, growing the data at the
    /// front. Only valid after a successful `reserve_front`.
    fn commit_front(&mut self, bytes: usize) -> Result<(), ErrorCode>;
}

/// Source of packet buffers, shared with the network stack.
pub trait BufferProvider: Sync {
    type Buffer: PacketBuffer;

    fn allocate(
        &self,
        direction: Direction,
        size: usize,
        timeout: Timeout,
    ) -> Result<Self::Buffer, ErrorCode>;

    fn release(&self, buffer: Self::Buffer, direction: Direction);
}

/// Upper bound of a blocking wait.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Timeout {
    Never,
    Millis(u32),
}

impl Timeout {
    /// The shorter of `self` and `ms` milliseconds.
    pub fn at_most(self, ms: u32) -> Timeout {
        match self {
            Timeout::Never => Timeout::Millis(ms),
            Timeout::Millis(current) => Timeout::Millis(current.min(ms)),
        }
    }
}

/// Counting semaphore that can be posted from interrupt context.
pub trait Semaphore: Sync {
    fn post(&self);

    /// Returns `false` if the wait ended because of the timeout.
    fn wait(&self, timeout: Timeout) -> bool;
}

pub trait Delay {
    fn delay_ms(&self, ms: u32);
}

/// Parameters for the worker thread.
#[derive(Clone, Copy, Debug)]
pub struct ThreadParams {
    pub name: &'static str,
    pub stack_size: usize,
    pub priority: u8,
}

/// The RTOS services the transport needs.
pub trait Rtos: Delay + Sync {
    type Semaphore: Semaphore;
    type Thread: Send;

    fn create_semaphore(&self, max_count: u32) -> Result<Self::Semaphore, ErrorCode>;

    fn spawn(
        &self,
        params: &ThreadParams,
        entry: Box<dyn FnOnce() + Send + 'static>,
    ) -> Result<Self::Thread, ErrorCode>;

    fn join(&self, thread: Self::Thread) -> Result<(), ErrorCode>;

    /// Free running millisecond tick.
    fn now_ms(&self) -> u32;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resource {
    Firmware,
    Nvram,
}

/// Byte-range access to the images downloaded during bring-up.
pub trait ResourceProvider: Sync {
    fn size(&self, resource: Resource) -> Result<usize, ErrorCode>;

    /// Copy bytes starting at `offset` into `buf`, returning how many were
    /// copied. `Err(ErrorCode::CANCEL)` aborts the bring-up.
    fn read(&self, resource: Resource, offset: usize, buf: &mut [u8]) -> Result<usize, ErrorCode>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
}

/// Host GPIO wired to the chip's out-of-band interrupt output.
pub trait HostWakePin<'a>: Sync {
    /// Whether board configuration still holds a reservation on the pin.
    fn is_reserved(&self) -> bool;

    fn release(&self);

    fn enable_interrupt(&self, edge: Edge) -> Result<(), ErrorCode>;

    fn disable_interrupt(&self);

    fn set_client(&self, client: &'a dyn HostWakeClient);
}

pub trait HostWakeClient: Sync {
    /// Called from interrupt context on the configured edge.
    fn host_wake(&self);
}

/// Receiver of frames read from the chip.
pub trait WhdBusClient<B>: Sync {
    /// Ownership of `buffer` moves to the client.
    fn frame_received(&self, buffer: B);
}
