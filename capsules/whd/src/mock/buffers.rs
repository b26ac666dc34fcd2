// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Buffer provider that tracks every buffer it hands out.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::hil::{BufferProvider, Direction, FrontSpace, PacketBuffer, Timeout};
use crate::ErrorCode;

#[derive(Debug)]
pub struct TestBuffer {
    id: usize,
    storage: Vec<u8>,
    start: usize,
    len: usize,
}

impl PacketBuffer for TestBuffer {
    fn data(&self) -> &[u8] {
        &self.storage[self.start..self.start + self.len]
    }

    fn data_mut(&mut self) -> &mut [u8] {
        &mut self.storage[self.start..self.start + self.len]
    }

    fn set_len(&mut self, len: usize) -> Result<(), ErrorCode> {
        if self.start + len > self.storage.len() {
            return Err(ErrorCode::SIZE);
        }
        self.len = len;
        Ok(())
    }

    fn reserve_front(&mut self, bytes: usize) -> FrontSpace {
        if self.start >= bytes {
            FrontSpace::Done
        } else {
            FrontSpace::NeedsChainedBuffer
        }
    }

    fn commit_front(&mut self, bytes: usize) -> Result<(), ErrorCode> {
        if self.start < bytes {
            return Err(ErrorCode::SIZE);
        }
        self.start -= bytes;
        self.len += bytes;
        Ok(())
    }
}

/// Hands out buffers with `headroom` spare bytes in front of the data.
/// Panics if a buffer is released twice.
pub struct TestBuffers {
    headroom: usize,
    next_id: AtomicUsize,
    outstanding: Mutex<HashSet<usize>>,
    allocations: AtomicUsize,
    released: AtomicUsize,
    fail: AtomicBool,
}

impl TestBuffers {
    pub fn new(headroom: usize) -> Self {
        Self {
            headroom,
            next_id: AtomicUsize::new(0),
            outstanding: Mutex::new(HashSet::new()),
            allocations: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        }
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.lock().unwrap().len()
    }

    pub fn allocations(&self) -> usize {
        self.allocations.load(Ordering::Relaxed)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::Relaxed)
    }

    pub fn fail_allocations(&self, fail: bool) {
        self.fail.store(fail, Ordering::Relaxed);
    }
}

impl BufferProvider for TestBuffers {
    type Buffer = TestBuffer;

    fn allocate(
        &self,
        _direction: Direction,
        size: usize,
        _timeout: Timeout,
    ) -> Result<TestBuffer, ErrorCode> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(ErrorCode::NOMEM);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.outstanding.lock().unwrap().insert(id);
        self.allocations.fetch_add(1, Ordering::Relaxed);
        Ok(TestBuffer {
            id,
            storage: vec![0; self.headroom + size],
            start: self.headroom,
            len: size,
        })
    }

    fn release(&self, buffer: TestBuffer, _direction: Direction) {
        assert!(
            self.outstanding.lock().unwrap().remove(&buffer.id),
            "buffer {} released twice",
            buffer.id
        );
        self.released.fetch_add(1, Ordering::Relaxed);
    }
}
