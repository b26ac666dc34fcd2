// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! FIFO of frames waiting for transmit credit.

use alloc::collections::VecDeque;

use spin::Mutex;

/// Unbounded send queue shared by every producer and the worker.
///
/// The lock only covers the queue update itself.
pub struct SendQueue<B> {
    frames: Mutex<VecDeque<B>>,
}

impl<B> SendQueue<B> {
    pub const fn new() -> Self {
        Self {
            frames: Mutex::new(VecDeque::new()),
        }
    }

    pub fn enqueue(&self, buffer: B) {
        self.frames.lock().push_back(buffer);
    }

    pub fn dequeue(&self) -> Option<B> {
        self.frames.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.lock().is_empty()
    }

    /// Remove every queued frame, handing each one to `f` in order.
    pub fn drain_with<F: FnMut(B)>(&self, mut f: F) -> usize {
        let mut drained = 0;
        while let Some(buffer) = self.dequeue() {
            f(buffer);
            drained += 1;
        }
        drained
    }
}
