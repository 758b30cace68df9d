//! Common types for the NuPRISM wire protocol

use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::data::DataRecord;
use super::trigger::TriggerRecord;

/// Wire constants (header fields Big Endian, samples Little Endian)
pub mod constants {
    /// Fixed header present on every datagram
    pub const HEADER_SIZE: usize = 42;
    /// Bytes skipped between `trigger_count` and the user words
    pub const HEADER_RESERVED_SIZE: usize = 4;
    pub const NUM_USER_WORDS: usize = 4;

    // Data packet
    pub const DATA_PAYLOAD_SIZE: usize = 1024;
    pub const DATA_PACKET_SIZE: usize = HEADER_SIZE + DATA_PAYLOAD_SIZE;
    /// One sample per channel, 4 x i16
    pub const QUADRUPLE_SIZE: usize = 8;
    /// Payload stride used by the device reader
    pub const PAYLOAD_STRIDE: usize = 64;
    pub const ADC_ID_SHIFT: u32 = 24;

    // Trigger packet
    pub const TRIGGER_TAIL_SIZE: usize = 16;
    pub const TRIGGER_PACKET_SIZE: usize = HEADER_SIZE + TRIGGER_TAIL_SIZE;
    pub const TRIGGER_TYPE_MASK: u32 = 0xF;
    pub const TRIGGERED_ADC_SHIFT: u32 = 4;
    pub const TRIGGERED_ADC_MASK: u32 = 0xF;
    pub const TRIGGER_CH_MASK_SHIFT: u32 = 9;
    pub const TRIGGER_CH_MASK_MASK: u32 = 0xFFFFF;

    // Device geometry
    pub const NUM_ADC: usize = 5;
    pub const NUM_CH_PER_ADC: usize = 4;

    // Full-scale range in raw units
    pub const VOLT_MIN: i32 = -32768;
    pub const VOLT_MAX: i32 = 32767;
}

use constants::*;

/// Per-datagram decode failures. None of these are fatal to ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("datagram truncated: {len} bytes, header needs {}", HEADER_SIZE)]
    Truncated { len: usize },

    #[error("invalid ADC id {0} (device has {} ADCs)", NUM_ADC)]
    InvalidAdcId(u8),

    #[error("unclassified datagram length {len}")]
    Unclassified { len: usize },
}

/// Datagram classification by total length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    /// Shorter than the header
    Truncated,
    /// 1066-byte sample packet
    Data,
    /// 58-byte trigger packet
    Trigger,
    /// Valid header but unknown total length
    Unknown,
}

/// How the 1024-byte data payload is walked
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum PayloadLayout {
    /// Every 8-byte quadruple in the payload (128 per packet)
    #[default]
    Dense,
    /// First quadruple of each 64-byte stride (16 per packet)
    Strided,
}

impl PayloadLayout {
    /// Distance in bytes between consecutive decoded quadruples
    pub fn stride(self) -> usize {
        match self {
            PayloadLayout::Dense => QUADRUPLE_SIZE,
            PayloadLayout::Strided => PAYLOAD_STRIDE,
        }
    }

    pub fn quadruples_per_packet(self) -> usize {
        DATA_PAYLOAD_SIZE / self.stride()
    }
}

impl std::fmt::Display for PayloadLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayloadLayout::Dense => write!(f, "dense"),
            PayloadLayout::Strided => write!(f, "strided"),
        }
    }
}

/// Fixed 42-byte prefix of every datagram
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceHeader {
    pub num_words: u16,
    pub packet_id: u32,
    pub frame_id: u32,
    pub timestamp: u64,
    pub trigger_count: u32,
    pub user_words: [u32; NUM_USER_WORDS],
}

impl DeviceHeader {
    /// Parse the header from the start of a datagram
    pub fn parse(datagram: &[u8]) -> Result<Self, DecodeError> {
        if datagram.len() < HEADER_SIZE {
            return Err(DecodeError::Truncated {
                len: datagram.len(),
            });
        }

        let mut cur = &datagram[..HEADER_SIZE];
        let num_words = cur.get_u16();
        let packet_id = cur.get_u32();
        let frame_id = cur.get_u32();
        let timestamp = cur.get_u64();
        let trigger_count = cur.get_u32();
        cur.advance(HEADER_RESERVED_SIZE);
        let user_words = [cur.get_u32(), cur.get_u32(), cur.get_u32(), cur.get_u32()];

        Ok(Self {
            num_words,
            packet_id,
            frame_id,
            timestamp,
            trigger_count,
            user_words,
        })
    }

    /// Serialize the header (reserved bytes are written as zero)
    pub fn write_to<B: BufMut>(&self, buf: &mut B) {
        buf.put_u16(self.num_words);
        buf.put_u32(self.packet_id);
        buf.put_u32(self.frame_id);
        buf.put_u64(self.timestamp);
        buf.put_u32(self.trigger_count);
        buf.put_bytes(0, HEADER_RESERVED_SIZE);
        for word in self.user_words {
            buf.put_u32(word);
        }
    }

    /// ADC index carried in the top byte of user word 3
    pub fn adc_id(&self) -> u8 {
        (self.user_words[3] >> ADC_ID_SHIFT) as u8
    }

    /// Replace the top byte of user word 3 with `adc_id`
    pub fn set_adc_id(&mut self, adc_id: u8) {
        let low = self.user_words[3] & ((1 << ADC_ID_SHIFT) - 1);
        self.user_words[3] = ((adc_id as u32) << ADC_ID_SHIFT) | low;
    }
}

/// A decoded datagram
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Data(DataRecord),
    Trigger(TriggerRecord),
}

impl Record {
    pub fn header(&self) -> &DeviceHeader {
        match self {
            Record::Data(data) => &data.header,
            Record::Trigger(trigger) => &trigger.header,
        }
    }
}

/// Map a raw sample to a fraction of the full-scale range, in [-1, 1)
pub fn sample_to_full_scale(sample: i16) -> f64 {
    sample as f64 / -(VOLT_MIN as f64)
}
