// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! The bus handle.
//!
//! A [`WhdBus`] owns the transport state of one chip: command layer and
//! statistics, backplane window, credit state, send queue and worker thread
//! bookkeeping. Producers only call [`WhdBus::send_buffer`]; every other
//! operation that touches the bus runs on the worker thread (or on the
//! caller during bring-up, before the worker exists).

use spin::Mutex;

use crate::backplane::Backplane;
use crate::bringup::BusState;
use crate::command::SdioTransport;
use crate::config::BusConfig;
use crate::constants::{
    FRAME_AVAILABLE_MASK, HT_AVAIL_POLLS, I_ERRORS, I_HMB_FC_CHANGE, I_HMB_HOST_INT,
    POLL_INTERVAL_MS, SBSDIO_HT_AVAIL, SBSDIO_HT_AVAIL_REQ, SDIOD_CCCR_IOABORT,
    SDIO_CHIP_CLOCK_CSR, SDIO_FRAME_CONTROL, SDIO_INT_STATUS, SDIO_TO_SB_MAILBOX, SFC_RF_TERM,
    SMB_DEV_INT, SMB_NAK,
};
use crate::hil::{
    BufferProvider, Direction, Function, HostWakePin, PacketBuffer, ResourceProvider, Rtos,
    SdioHost, Semaphore, Timeout, WhdBusClient,
};
use crate::poll::poll_until;
use crate::queue::SendQueue;
use crate::sdpcm::{CreditState, Credits, HwTag, SdpcmHeader};
use crate::stats::{BusStats, StatsSnapshot};
use crate::thread::ThreadInfo;
use crate::ErrorCode;

/// HT clock request and the pending delayed release.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct BusPower {
    pub(crate) awake: bool,
    /// Tick at which the HT request may be dropped.
    pub(crate) release_at: Option<u32>,
}

/// Outcome of one receive attempt.
pub(crate) enum Received<B> {
    Frame(B),
    /// Header-only frame carrying a credit update.
    CreditOnly,
    /// All-zero tag: the FIFO holds nothing.
    Empty,
}

pub struct WhdBus<'a, H: SdioHost<'a>, P: BufferProvider, R: Rtos> {
    pub(crate) config: BusConfig,
    pub(crate) sdio: SdioTransport<'a, H>,
    pub(crate) backplane: Backplane,
    pub(crate) buffers: &'a P,
    pub(crate) rtos: &'a R,
    pub(crate) resources: &'a dyn ResourceProvider,
    pub(crate) host_wake: Option<&'a dyn HostWakePin<'a>>,
    client: Mutex<Option<&'a dyn WhdBusClient<P::Buffer>>>,
    pub(crate) state: Mutex<BusState>,
    pub(crate) credits: Credits,
    pub(crate) queue: SendQueue<P::Buffer>,
    pub(crate) power: Mutex<BusPower>,
    pub(crate) thread: ThreadInfo<R>,
}

impl<'a, H: SdioHost<'a>, P: BufferProvider, R: Rtos> WhdBus<'a, H, P, R> {
    /// Create the bus handle. Nothing is sent to the chip until `init`.
    pub fn attach(
        config: BusConfig,
        host: &'a H,
        buffers: &'a P,
        rtos: &'a R,
        resources: &'a dyn ResourceProvider,
        host_wake: Option<&'a dyn HostWakePin<'a>>,
    ) -> Result<Self, ErrorCode> {
        config.validate()?;
        if config.oob.is_some() && host_wake.is_none() {
            return Err(ErrorCode::INVAL);
        }
        let semaphore = rtos.create_semaphore(1)?;

        Ok(Self {
            config,
            sdio: SdioTransport::new(host),
            backplane: Backplane::new(config.chip.chipcommon_base),
            buffers,
            rtos,
            resources,
            host_wake,
            client: Mutex::new(None),
            state: Mutex::new(BusState::Reset),
            credits: Credits::new(config.max_credit),
            queue: SendQueue::new(),
            power: Mutex::new(BusPower::default()),
            thread: ThreadInfo::new(semaphore),
        })
    }

    /// Stop the worker, bring the chip down and drop everything queued.
    pub fn detach(&self) -> Result<(), ErrorCode> {
        if self.thread.is_running() {
            self.stop_thread()?;
        }
        if self.state() != BusState::Reset {
            self.deinit()?;
        }
        self.release_queued();
        *self.client.lock() = None;
        self.sdio.stats().reset();
        Ok(())
    }

    pub fn set_client(&self, client: &'a dyn WhdBusClient<P::Buffer>) {
        *self.client.lock() = Some(client);
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    pub fn state(&self) -> BusState {
        *self.state.lock()
    }

    pub(crate) fn set_state(&self, state: BusState) {
        *self.state.lock() = state;
    }

    pub fn available_credits(&self) -> u8 {
        self.credits.available()
    }

    pub fn credit_state(&self) -> CreditState {
        self.credits.state()
    }

    pub fn queued_frames(&self) -> usize {
        self.queue.len()
    }

    pub fn interrupt_pending(&self) -> bool {
        self.thread.interrupt_pending()
    }

    /// Wake the worker without flagging an interrupt.
    pub fn notify(&self) {
        self.thread.notify();
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.sdio.stats().snapshot()
    }

    pub fn print_stats(&self, reset_after: bool) {
        self.sdio.stats().print(reset_after);
    }

    pub fn reset_stats(&self) {
        self.sdio.stats().reset();
    }

    /// Queue an SDPCM framed buffer for transmission.
    ///
    /// The buffer belongs to the transport from here on and is released
    /// exactly once: right away if it is rejected, otherwise after it was
    /// sent or dropped.
    pub fn send_buffer(&self, buffer: P::Buffer) -> Result<(), ErrorCode> {
        if buffer.len() < SdpcmHeader::SIZE {
            self.buffers.release(buffer, Direction::Write);
            return Err(ErrorCode::INVAL);
        }
        if self.state() != BusState::Up {
            self.buffers.release(buffer, Direction::Write);
            return Err(ErrorCode::OFF);
        }
        self.queue.enqueue(buffer);
        self.thread.notify();
        Ok(())
    }

    /// Read one frame from function 2.
    ///
    /// Returns `Ok(None)` for a credit-only update and `BADTAG` when the
    /// tag is invalid, an empty FIFO included. Any failure after the tag
    /// was read leaves the bus aborted and terminated, never mid-frame.
    /// Worker context only.
    pub fn read_frame(&self) -> Result<Option<P::Buffer>, ErrorCode> {
        match self.receive()? {
            Received::Frame(buffer) => Ok(Some(buffer)),
            Received::CreditOnly => Ok(None),
            Received::Empty => Err(ErrorCode::BADTAG),
        }
    }

    pub(crate) fn receive(&self) -> Result<Received<P::Buffer>, ErrorCode> {
        let stats = self.sdio.stats();
        let mut tag_bytes = [0u8; HwTag::SIZE];
        if let Err(err) = self
            .sdio
            .transfer(Direction::Read, Function::Wlan, 0, &mut tag_bytes)
        {
            self.abort_read(false);
            return Err(err);
        }

        let tag = HwTag::from_bytes(&tag_bytes);
        if tag.is_empty() {
            self.abort_read(false);
            return Ok(Received::Empty);
        }
        if !tag.is_valid() {
            BusStats::bump(&stats.tag_mismatches);
            log::warn!("whd: hardware tag mismatch {:04x}/{:04x}", tag.len, tag.len_inv);
            self.abort_read(false);
            return Err(ErrorCode::BADTAG);
        }

        let len = tag.len as usize;
        if len < SdpcmHeader::SIZE {
            self.abort_read(false);
            return Err(ErrorCode::SIZE);
        }
        if len == SdpcmHeader::SIZE && self.sdio.is_link_up() {
            return self
                .read_credit_update(&tag_bytes)
                .map(|()| Received::CreditOnly);
        }

        let mut buffer =
            match self
                .buffers
                .allocate(Direction::Read, len, self.config.rx_alloc_timeout)
            {
                Ok(buffer) => buffer,
                Err(_) => {
                    BusStats::bump(&stats.rx_alloc_fails);
                    // Credit bookkeeping has to see this header even though
                    // the frame is dropped.
                    self.read_credit_update(&tag_bytes)?;
                    self.abort_read(false);
                    return Err(ErrorCode::NOMEM);
                }
            };

        let data = buffer.data_mut();
        if data.len() < len {
            self.buffers.release(buffer, Direction::Read);
            self.abort_read(false);
            return Err(ErrorCode::SIZE);
        }
        data[..HwTag::SIZE].copy_from_slice(&tag_bytes);
        if let Err(err) =
            self.sdio
                .transfer(Direction::Read, Function::Wlan, 0, &mut data[HwTag::SIZE..len])
        {
            self.buffers.release(buffer, Direction::Read);
            self.abort_read(true);
            return Err(err);
        }

        let header = SdpcmHeader::from_bytes(&buffer.data()[..SdpcmHeader::SIZE]);
        self.apply_credit(&header);
        BusStats::bump(&stats.frames_received);
        Ok(Received::Frame(buffer))
    }

    /// Read the rest of a header whose tag is already in `tag_bytes` and
    /// apply its credit.
    fn read_credit_update(&self, tag_bytes: &[u8; HwTag::SIZE]) -> Result<(), ErrorCode> {
        let mut header = [0u8; SdpcmHeader::SIZE];
        header[..HwTag::SIZE].copy_from_slice(tag_bytes);
        if let Err(err) =
            self.sdio
                .transfer(Direction::Read, Function::Wlan, 0, &mut header[HwTag::SIZE..])
        {
            self.abort_read(false);
            return Err(err);
        }
        self.apply_credit(&SdpcmHeader::from_bytes(&header));
        Ok(())
    }

    fn apply_credit(&self, header: &SdpcmHeader) {
        if self.credits.update(header) {
            BusStats::bump(&self.sdio.stats().credit_updates);
        }
    }

    /// Abort the function 2 read in flight and terminate the frame. With
    /// `retry` the firmware is asked to send the frame again.
    pub fn abort_read(&self, retry: bool) {
        BusStats::bump(&self.sdio.stats().read_aborts);

        let result = self
            .sdio
            .write_u8(Function::Bus, SDIOD_CCCR_IOABORT, Function::Wlan as u8)
            .and_then(|()| {
                self.sdio
                    .write_u8(Function::Backplane, SDIO_FRAME_CONTROL, SFC_RF_TERM)
            })
            .and_then(|()| {
                if retry {
                    self.backplane.write_value(
                        &self.sdio,
                        self.sdiod_register(SDIO_TO_SB_MAILBOX),
                        4,
                        SMB_NAK,
                    )
                } else {
                    Ok(())
                }
            });
        if let Err(err) = result {
            log::warn!("whd: read abort failed: {:?}", err);
        }
    }

    /// Read and acknowledge the SDIO core interrupt status. True if the
    /// chip has frames for the host.
    pub fn packet_available_to_read(&self) -> Result<bool, ErrorCode> {
        let status = self
            .backplane
            .read_value(&self.sdio, self.sdiod_register(SDIO_INT_STATUS), 4)?;

        if status & I_ERRORS != 0 {
            BusStats::bump(&self.sdio.stats().error_intrs);
            log::warn!("whd: SDIO error interrupt {:#x}", status & I_ERRORS);
        }
        if status & I_HMB_FC_CHANGE != 0 {
            log::debug!("whd: flow control changed");
        }
        if status != 0 {
            self.ack_interrupt(status)?;
        }
        Ok(status & FRAME_AVAILABLE_MASK != 0)
    }

    /// Clear interrupt status bits (write one to clear).
    pub fn ack_interrupt(&self, status: u32) -> Result<(), ErrorCode> {
        self.backplane
            .write_value(&self.sdio, self.sdiod_register(SDIO_INT_STATUS), 4, status)
    }

    /// Check and clear a host wake indication from the chip.
    pub fn wake_interrupt_present(&self) -> bool {
        if self.ensure_bus_up().is_err() {
            return false;
        }
        match self
            .backplane
            .read_value(&self.sdio, self.sdiod_register(SDIO_INT_STATUS), 4)
        {
            Ok(status) if status & I_HMB_HOST_INT != 0 => {
                self.ack_interrupt(I_HMB_HOST_INT).is_ok()
            }
            _ => false,
        }
    }

    /// Block on `semaphore` for as long as the current bus state allows.
    ///
    /// A pending delayed release bounds the wait, and lets the bus sleep
    /// once it is due. Frames held back for credit poke the firmware and
    /// bound the wait by the poke timeout. Polling mode bounds every wait.
    pub fn wait_for_event(&self, semaphore: &R::Semaphore) -> Result<(), ErrorCode> {
        let thread_config = &self.config.thread;
        let mut timeout = Timeout::Never;

        let tx_blocked = !self.queue.is_empty() && self.credits.available() == 0;
        if tx_blocked {
            self.poke_wlan()?;
            timeout = timeout.at_most(thread_config.poke_timeout_ms);
        } else if let Some(remaining) = self.release_countdown() {
            if remaining == 0 {
                self.allow_bus_sleep()?;
            } else {
                timeout = timeout.at_most(remaining);
            }
        }
        if let Some(interval) = thread_config.poll_interval_ms {
            timeout = timeout.at_most(interval);
        }

        let posted = semaphore.wait(timeout);
        if !posted && (tx_blocked || thread_config.poll_interval_ms.is_some()) {
            // Check the chip even though it did not interrupt.
            self.thread.flag_interrupt();
        }
        Ok(())
    }

    /// Request the HT clock if the bus was allowed to sleep.
    /// The power lock is only held to read or update the flags, never
    /// across the clock request itself.
    pub(crate) fn ensure_bus_up(&self) -> Result<(), ErrorCode> {
        {
            let mut power = self.power.lock();
            power.release_at = None;
            if power.awake {
                return Ok(());
            }
        }
        self.sdio
            .write_u8(Function::Backplane, SDIO_CHIP_CLOCK_CSR, SBSDIO_HT_AVAIL_REQ)?;
        poll_until(self.rtos, HT_AVAIL_POLLS, POLL_INTERVAL_MS, || {
            let csr = self.sdio.read_u8(Function::Backplane, SDIO_CHIP_CLOCK_CSR)?;
            Ok(csr & SBSDIO_HT_AVAIL != 0)
        })?;
        self.power.lock().awake = true;
        Ok(())
    }

    /// Drop the HT clock request.
    pub(crate) fn allow_bus_sleep(&self) -> Result<(), ErrorCode> {
        {
            let mut power = self.power.lock();
            power.release_at = None;
            if !power.awake {
                return Ok(());
            }
        }
        self.sdio
            .write_u8(Function::Backplane, SDIO_CHIP_CLOCK_CSR, 0)?;
        self.power.lock().awake = false;
        log::debug!("whd: bus sleeping");
        Ok(())
    }

    pub(crate) fn schedule_bus_release(&self) {
        if let Some(delay) = self.config.thread.bus_sleep_delay_ms {
            let mut power = self.power.lock();
            if power.awake {
                power.release_at = Some(self.rtos.now_ms().wrapping_add(delay));
            }
        }
    }

    /// Milliseconds until the delayed release is due, if one is pending.
    fn release_countdown(&self) -> Option<u32> {
        let release_at = self.power.lock().release_at?;
        let remaining = release_at.wrapping_sub(self.rtos.now_ms()) as i32;
        Some(remaining.max(0) as u32)
    }

    /// Ask the firmware for a credit update.
    fn poke_wlan(&self) -> Result<(), ErrorCode> {
        self.backplane.write_value(
            &self.sdio,
            self.sdiod_register(SDIO_TO_SB_MAILBOX),
            4,
            SMB_DEV_INT,
        )
    }

    pub(crate) fn deliver(&self, buffer: P::Buffer) {
        let client = *self.client.lock();
        match client {
            Some(client) => client.frame_received(buffer),
            None => {
                BusStats::bump(&self.sdio.stats().rx_dropped);
                self.buffers.release(buffer, Direction::Read);
            }
        }
    }

    /// Release every queued frame unsent.
    pub(crate) fn release_queued(&self) -> usize {
        self.queue.drain_with(|buffer| {
            BusStats::bump(&self.sdio.stats().tx_dropped);
            self.buffers.release(buffer, Direction::Write);
        })
    }

    pub(crate) fn sdiod_register(&self, offset: u32) -> u32 {
        self.config.chip.sdiod_base + offset
    }
}
