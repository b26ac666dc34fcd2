// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Worker thread.
//!
//! After bring-up every bus transaction happens on this thread. Each pass
//! of the loop drains a bounded number of received frames, then sends queued
//! frames for as long as there is credit, then sleeps on the wake semaphore
//! unless an interrupt is already pending.

use alloc::boxed::Box;
use core::sync::atomic::{AtomicBool, Ordering};

use spin::Mutex;

use crate::bringup::BusState;
use crate::bus::{Received, WhdBus};
use crate::hil::{
    BufferProvider, Direction, Function, PacketBuffer, Rtos, SdioHost, Semaphore,
};
use crate::sdpcm::SDPCM_SEQ_OFFSET;
use crate::stats::BusStats;
use crate::ErrorCode;

/// Worker bookkeeping shared with producers and interrupt handlers.
pub struct ThreadInfo<R: Rtos> {
    handle: Mutex<Option<R::Thread>>,
    quit: AtomicBool,
    interrupt_pending: AtomicBool,
    semaphore: R::Semaphore,
}

impl<R: Rtos> ThreadInfo<R> {
    pub fn new(semaphore: R::Semaphore) -> Self {
        Self {
            handle: Mutex::new(None),
            quit: AtomicBool::new(false),
            interrupt_pending: AtomicBool::new(false),
            semaphore,
        }
    }

    pub fn semaphore(&self) -> &R::Semaphore {
        &self.semaphore
    }

    pub fn is_running(&self) -> bool {
        self.handle.lock().is_some()
    }

    pub fn quit_requested(&self) -> bool {
        self.quit.load(Ordering::Acquire)
    }

    pub fn interrupt_pending(&self) -> bool {
        self.interrupt_pending.load(Ordering::Acquire)
    }

    /// Wake the worker. Safe from interrupt context.
    pub fn notify(&self) {
        self.semaphore.post();
    }

    /// Record a bus interrupt and wake the worker. Safe from interrupt
    /// context.
    pub fn wake_for_interrupt(&self) {
        self.flag_interrupt();
        self.semaphore.post();
    }

    pub(crate) fn flag_interrupt(&self) {
        self.interrupt_pending.store(true, Ordering::Release);
    }

    pub(crate) fn take_interrupt(&self) -> bool {
        self.interrupt_pending.swap(false, Ordering::AcqRel)
    }

    fn request_quit(&self) {
        self.quit.store(true, Ordering::Release);
        self.semaphore.post();
    }
}

/// What one pass of the worker loop did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Activity {
    /// Frames read, credit-only updates included.
    pub received: usize,
    /// Frames dropped because reading them failed.
    pub dropped: usize,
    pub sent: usize,
    /// The receive bound was hit and the interrupt re-flagged.
    pub rx_limited: bool,
}

impl<H: SdioHost<'static> + 'static, P: BufferProvider + 'static, R: Rtos + 'static>
    WhdBus<'static, H, P, R>
{
    /// Spawn the worker thread. The bus has to be up.
    pub fn start_thread(&'static self) -> Result<(), ErrorCode> {
        if self.state() != BusState::Up {
            return Err(ErrorCode::OFF);
        }
        let mut handle = self.thread.handle.lock();
        if handle.is_some() {
            return Err(ErrorCode::ALREADY);
        }
        self.thread.quit.store(false, Ordering::Release);

        let bus: &'static Self = self;
        let thread = self
            .rtos
            .spawn(&self.config.thread.params(), Box::new(move || bus.run()))?;
        *handle = Some(thread);
        Ok(())
    }
}

impl<'a, H: SdioHost<'a>, P: BufferProvider, R: Rtos> WhdBus<'a, H, P, R> {
    /// Ask the worker to quit and wait for it to exit.
    pub fn stop_thread(&self) -> Result<(), ErrorCode> {
        let thread = self.thread.handle.lock().take().ok_or(ErrorCode::OFF)?;
        self.thread.request_quit();
        self.rtos.join(thread)
    }

    pub(crate) fn run(&self) {
        log::debug!("whd: worker started");
        while !self.thread.quit_requested() {
            if !self.thread.interrupt_pending() {
                if let Err(err) = self.wait_for_event(self.thread.semaphore()) {
                    log::warn!("whd: preparing to sleep failed: {:?}", err);
                }
                if self.thread.quit_requested() {
                    break;
                }
            }
            self.process_events();
        }
        self.teardown();
        log::debug!("whd: worker stopped");
    }

    /// One pass of the worker loop: receive, then send.
    pub fn process_events(&self) -> Activity {
        if let Err(err) = self.ensure_bus_up() {
            log::warn!("whd: bus wake failed: {:?}", err);
            // The chip raises its interrupt again while frames are pending.
            self.thread.take_interrupt();
            return Activity::default();
        }

        let mut activity = self.drain_receive();
        activity.sent = self.drain_send();
        self.schedule_bus_release();
        activity
    }

    /// Read frames until the FIFO is empty or `rx_limit` attempts were
    /// made. A frame that fails to read is dropped on its own.
    fn drain_receive(&self) -> Activity {
        let mut activity = Activity::default();
        if !self.thread.take_interrupt() {
            return activity;
        }
        match self.packet_available_to_read() {
            Ok(true) => {}
            Ok(false) => return activity,
            Err(err) => {
                log::warn!("whd: interrupt status read failed: {:?}", err);
                return activity;
            }
        }

        let limit = self.config.thread.rx_limit;
        let mut handled = 0;
        while handled < limit {
            match self.receive() {
                Ok(Received::Frame(buffer)) => {
                    self.deliver(buffer);
                    activity.received += 1;
                }
                Ok(Received::CreditOnly) => activity.received += 1,
                Ok(Received::Empty) => break,
                Err(err) => {
                    log::warn!("whd: dropping received frame: {:?}", err);
                    activity.dropped += 1;
                }
            }
            handled += 1;
        }

        if handled == limit {
            self.thread.flag_interrupt();
            activity.rx_limited = true;
        }
        activity
    }

    fn drain_send(&self) -> usize {
        let mut sent = 0;
        while !self.queue.is_empty() {
            let Some(seq) = self.credits.consume() else {
                break;
            };
            let Some(buffer) = self.queue.dequeue() else {
                break;
            };
            self.transmit(buffer, seq);
            sent += 1;
        }
        sent
    }

    /// Send one frame and release it, whatever the outcome.
    fn transmit(&self, mut buffer: P::Buffer, seq: u8) {
        let data = buffer.data_mut();
        data[SDPCM_SEQ_OFFSET] = seq;
        let result = self.sdio.transfer(Direction::Write, Function::Wlan, 0, data);
        self.buffers.release(buffer, Direction::Write);

        let stats = self.sdio.stats();
        match result {
            Ok(()) => BusStats::bump(&stats.frames_sent),
            Err(err) => {
                BusStats::bump(&stats.send_failures);
                log::warn!("whd: dropping frame {}: {:?}", seq, err);
            }
        }
    }

    fn teardown(&self) {
        let dropped = self.release_queued();
        if dropped > 0 {
            log::debug!("whd: released {} unsent frames", dropped);
        }
    }
}
