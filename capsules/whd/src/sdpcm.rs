// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! SDPCM framing and transmit credit accounting.
//!
//! Every frame on function 2 starts with a hardware tag (the frame length
//! and its complement) followed by the rest of the SDPCM header. The header
//! of every received frame carries the firmware's current transmit credit.

use spin::Mutex;

use crate::hil::{FrontSpace, PacketBuffer};
use crate::ErrorCode;

macro_rules! parse {
    (
        $(#[$attr_struct:meta])* $vis_struct:vis struct $name:ident { $($(#[$attr_field:meta])* $vis_field:vis $field:ident : $field_ty:tt),* $(,)? }
        ) => {
        $(#[$attr_struct])*
        $vis_struct struct $name {
            $($(#[$attr_field])* $vis_field $field : $field_ty),*,
        }
        impl $name {
            #![allow(unused)]
            pub const SIZE: usize = core::mem::size_of::<Self>();
            pub const fn into_bytes(self) -> [u8; Self::SIZE] {
                let mut __bytes = [0u8; Self::SIZE];
                let mut __len = 0;
                $(
                    parse!(@f __len, __bytes, self.$field, $field_ty);
                )*
                __bytes
            }
            pub const fn from_bytes(__bytes: &[u8]) -> Self {
                let mut __len = 0;
                $(
                    parse!(@from_f __len, __bytes, $field, $field_ty);
                )*
                Self {
                    $($field),*
                }
            }
        }
    };

    (@from_f $len: ident, $bytes:ident, $field:ident, u8) => {
        let $field = $bytes[$len];
        $len += 1;
    };
    (@from_f $len: ident, $bytes:ident, $field:ident, u16) => {
        let $field = u16::from_le_bytes([$bytes[$len], $bytes[$len + 1]]);
        $len += 2;
    };

    (@f $len:ident, $bytes:ident, $field:expr, u8) => {
        $bytes[$len] = $field;
        $len += 1;
    };
    (@f $len:ident, $bytes: ident, $field: expr, u16) => {
        let __field_le_bytes = $field.to_le_bytes();
        $bytes[$len] = __field_le_bytes[0];
        $bytes[$len + 1] = __field_le_bytes[1];
        $len += 2;
    };
}

parse!(
    /// Hardware tag: the first four bytes of every frame.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct HwTag {
        pub len: u16,
        pub len_inv: u16,
    }
);

impl HwTag {
    pub const fn new(len: u16) -> Self {
        Self { len, len_inv: !len }
    }

    pub const fn is_valid(&self) -> bool {
        (self.len ^ self.len_inv) == 0xFFFF
    }

    /// An all-zero tag is what the chip returns when no frame is pending.
    pub const fn is_empty(&self) -> bool {
        self.len == 0 && self.len_inv == 0
    }
}

parse!(
    /// SDPCM header
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct SdpcmHeader {
        pub len: u16,
        pub len_inv: u16,
        pub seq: u8,
        pub flags: u8,
        pub next_len: u8,
        pub data_offset: u8,
        pub flow_ctrl: u8,
        pub data_credit: u8,
        pub reserved: u16,
    }
);

/// Offset of the sequence number inside [`SdpcmHeader`].
pub(crate) const SDPCM_SEQ_OFFSET: usize = 4;
const SDPCM_CHANNEL_MASK: u8 = 0x0F;

impl SdpcmHeader {
    pub fn channel(&self) -> Result<ChannelType, ErrorCode> {
        ChannelType::try_from(self.flags & SDPCM_CHANNEL_MASK)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChannelType {
    Control = 0,
    Event = 1,
    Data = 2,
}

impl TryFrom<u8> for ChannelType {
    type Error = ErrorCode;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ChannelType::Control),
            1 => Ok(ChannelType::Event),
            2 => Ok(ChannelType::Data),
            _ => Err(ErrorCode::INVAL),
        }
    }
}

/// Transmit credit as last advertised by the firmware.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CreditState {
    /// Frames that may still be sent.
    pub available: u8,
    pub max: u8,
    /// `data_credit` of the last header applied.
    pub advertised: u8,
    pub last_rx_seq: u8,
    /// Sequence number for the next transmitted frame.
    pub tx_seq: u8,
    pub flow_control: u8,
}

impl CreditState {
    pub const fn new(max: u8) -> Self {
        Self {
            available: 0,
            max,
            advertised: 0,
            last_rx_seq: 0,
            tx_seq: 0,
            flow_control: 0,
        }
    }

    /// Add `delta` to the available credit, clamped to `[0, max]`.
    pub fn apply_delta(&mut self, delta: i8) {
        let credit = self.available as i16 + delta as i16;
        self.available = credit.clamp(0, self.max as i16) as u8;
    }

    /// Apply the credit of a received header.
    ///
    /// Headers of unknown channels carry no credit and are ignored. Returns
    /// whether the header was applied.
    pub fn update(&mut self, header: &SdpcmHeader) -> bool {
        if header.channel().is_err() {
            return false;
        }
        let delta = header.data_credit.wrapping_sub(self.advertised) as i8;
        self.apply_delta(delta);
        self.advertised = header.data_credit;
        self.last_rx_seq = header.seq;
        self.flow_control = header.flow_ctrl;
        true
    }

    /// Take one credit, returning the sequence number for the frame.
    pub fn consume(&mut self) -> Option<u8> {
        if self.available == 0 {
            return None;
        }
        self.available -= 1;
        let seq = self.tx_seq;
        self.tx_seq = self.tx_seq.wrapping_add(1);
        Some(seq)
    }
}

/// Credit state shared between the worker and producers.
pub struct Credits(Mutex<CreditState>);

impl Credits {
    pub const fn new(max: u8) -> Self {
        Self(Mutex::new(CreditState::new(max)))
    }

    pub fn available(&self) -> u8 {
        self.0.lock().available
    }

    pub fn state(&self) -> CreditState {
        *self.0.lock()
    }

    pub(crate) fn update(&self, header: &SdpcmHeader) -> bool {
        self.0.lock().update(header)
    }

    pub(crate) fn consume(&self) -> Option<u8> {
        self.0.lock().consume()
    }

    pub(crate) fn reset(&self) {
        let mut state = self.0.lock();
        *state = CreditState::new(state.max);
    }
}

/// Put an SDPCM header for `channel` in front of the buffer's data.
///
/// The sequence number is left at zero; the worker fills it in when the
/// frame is sent.
pub fn prepend_header<B: PacketBuffer>(
    buffer: &mut B,
    channel: ChannelType,
) -> Result<FrontSpace, ErrorCode> {
    if buffer.reserve_front(SdpcmHeader::SIZE) == FrontSpace::NeedsChainedBuffer {
        return Ok(FrontSpace::NeedsChainedBuffer);
    }
    buffer.commit_front(SdpcmHeader::SIZE)?;

    let len = u16::try_from(buffer.len()).map_err(|_| ErrorCode::SIZE)?;
    let header = SdpcmHeader {
        len,
        len_inv: !len,
        seq: 0,
        flags: channel as u8,
        next_len: 0,
        data_offset: SdpcmHeader::SIZE as u8,
        flow_ctrl: 0,
        data_credit: 0,
        reserved: 0,
    };
    buffer.data_mut()[..SdpcmHeader::SIZE].copy_from_slice(&header.into_bytes());
    Ok(FrontSpace::Done)
}
