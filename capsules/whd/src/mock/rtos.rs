// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Std-thread backed RTOS services. Delays only count, they never sleep.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Condvar, Mutex};
use std::thread::{Builder, JoinHandle};
use std::time::{Duration, Instant};

use crate::hil::{Delay, Rtos, Semaphore, ThreadParams, Timeout};
use crate::ErrorCode;

pub struct TestSemaphore {
    count: Mutex<u32>,
    max: u32,
    posted: Condvar,
}

impl Semaphore for TestSemaphore {
    fn post(&self) {
        let mut count = self.count.lock().unwrap();
        *count = (*count + 1).min(self.max);
        self.posted.notify_one();
    }

    fn wait(&self, timeout: Timeout) -> bool {
        let mut count = self.count.lock().unwrap();
        let deadline = match timeout {
            Timeout::Never => None,
            Timeout::Millis(ms) => Some(Instant::now() + Duration::from_millis(u64::from(ms))),
        };
        while *count == 0 {
            match deadline {
                None => count = self.posted.wait(count).unwrap(),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    count = self.posted.wait_timeout(count, deadline - now).unwrap().0;
                }
            }
        }
        *count -= 1;
        true
    }
}

type DelayHook = Box<dyn Fn() + Send + Sync>;

pub struct TestRtos {
    start: Instant,
    delays: AtomicU32,
    on_delay: Mutex<Option<DelayHook>>,
}

impl TestRtos {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            delays: AtomicU32::new(0),
            on_delay: Mutex::new(None),
        }
    }

    /// Run `hook` on every `delay_ms`.
    pub fn on_delay(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.on_delay.lock().unwrap() = Some(Box::new(hook));
    }

    /// Total milliseconds requested through `delay_ms`.
    pub fn delayed_ms(&self) -> u32 {
        self.delays.load(Ordering::Relaxed)
    }
}

impl Delay for TestRtos {
    fn delay_ms(&self, ms: u32) {
        self.delays.fetch_add(ms, Ordering::Relaxed);
        if let Some(hook) = self.on_delay.lock().unwrap().as_ref() {
            hook();
        }
    }
}

impl Rtos for TestRtos {
    type Semaphore = TestSemaphore;
    type Thread = JoinHandle<()>;

    fn create_semaphore(&self, max_count: u32) -> Result<TestSemaphore, ErrorCode> {
        if max_count == 0 {
            return Err(ErrorCode::INVAL);
        }
        Ok(TestSemaphore {
            count: Mutex::new(0),
            max: max_count,
            posted: Condvar::new(),
        })
    }

    fn spawn(
        &self,
        params: &ThreadParams,
        entry: Box<dyn FnOnce() + Send + 'static>,
    ) -> Result<JoinHandle<()>, ErrorCode> {
        Builder::new()
            .name(params.name.into())
            .spawn(entry)
            .map_err(|_| ErrorCode::NOMEM)
    }

    fn join(&self, thread: JoinHandle<()>) -> Result<(), ErrorCode> {
        thread.join().map_err(|_| ErrorCode::FAIL)
    }

    fn now_ms(&self) -> u32 {
        self.start.elapsed().as_millis() as u32
    }
}
