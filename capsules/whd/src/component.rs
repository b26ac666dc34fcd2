// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Component for the WHD SDIO bus.
//!
//! Usage
//! -----
//! ```rust,ignore
//! static mut WHD_BUS: MaybeUninit<WhdBus<'static, Host, Buffers, Rtos>> = MaybeUninit::uninit();
//!
//! let whd = WhdBusComponent::new(&SDIO, &BUFFERS, &RTOS, &RESOURCES, None, BusConfig::default())
//!     .finalize(unsafe { &mut *addr_of_mut!(WHD_BUS) })?;
//! whd.set_client(&NETWORK);
//! ```

use core::mem::MaybeUninit;

use crate::bus::WhdBus;
use crate::config::BusConfig;
use crate::hil::{BufferProvider, HostWakePin, ResourceProvider, Rtos, SdioHost};
use crate::{InitError, InitStep};

/// Factory interface for board setup code.
pub trait Component {
    /// Static memory the output is written into.
    type StaticInput;

    type Output;

    /// Build the output. May only be called once per component.
    fn finalize(self, static_memory: Self::StaticInput) -> Self::Output;
}

/// Attaches the bus, registers it for both interrupts, brings the chip up
/// and starts the worker thread.
pub struct WhdBusComponent<H: SdioHost<'static> + 'static, P: BufferProvider + 'static, R: Rtos + 'static>
{
    host: &'static H,
    buffers: &'static P,
    rtos: &'static R,
    resources: &'static dyn ResourceProvider,
    host_wake: Option<&'static dyn HostWakePin<'static>>,
    config: BusConfig,
}

impl<H: SdioHost<'static> + 'static, P: BufferProvider + 'static, R: Rtos + 'static>
    WhdBusComponent<H, P, R>
{
    pub fn new(
        host: &'static H,
        buffers: &'static P,
        rtos: &'static R,
        resources: &'static dyn ResourceProvider,
        host_wake: Option<&'static dyn HostWakePin<'static>>,
        config: BusConfig,
    ) -> Self {
        Self {
            host,
            buffers,
            rtos,
            resources,
            host_wake,
            config,
        }
    }
}

impl<H: SdioHost<'static> + 'static, P: BufferProvider + 'static, R: Rtos + 'static> Component
    for WhdBusComponent<H, P, R>
{
    type StaticInput = &'static mut MaybeUninit<WhdBus<'static, H, P, R>>;
    type Output = Result<&'static WhdBus<'static, H, P, R>, InitError>;

    fn finalize(self, static_memory: Self::StaticInput) -> Self::Output {
        let bus = WhdBus::attach(
            self.config,
            self.host,
            self.buffers,
            self.rtos,
            self.resources,
            self.host_wake,
        )
        .map_err(|code| InitError::new(InitStep::Attach, code))?;
        let bus: &'static WhdBus<'static, H, P, R> = static_memory.write(bus);

        self.host.set_client(bus);
        if let Some(pin) = self.host_wake {
            pin.set_client(bus);
        }

        bus.init()?;
        bus.start_thread()
            .map_err(|code| InitError::new(InitStep::WorkerThread, code))?;
        Ok(bus)
    }
}
