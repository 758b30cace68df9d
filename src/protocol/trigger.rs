//! Trigger packet decoder
//!
//! The 16-byte tail is eight big-endian `u16` halves, low half first:
//! trigger count (2), global timestamp (4), trigger info (2).

use bytes::Buf;
use serde::Serialize;

use super::common::constants::*;
use super::common::{DecodeError, DeviceHeader};

/// Decoded trigger packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TriggerRecord {
    pub header: DeviceHeader,
    pub trigger_count: u32,
    pub global_ts: u64,
    /// Raw info word, decomposed below
    pub trigger_info: u32,
    pub trigger_type: u8,
    pub triggered_adc: u8,
    pub trigger_ch_mask: u32,
}

impl TriggerRecord {
    /// Build a record, deriving the info sub-fields from `trigger_info`
    pub fn new(
        header: DeviceHeader,
        trigger_count: u32,
        global_ts: u64,
        trigger_info: u32,
    ) -> Self {
        Self {
            header,
            trigger_count,
            global_ts,
            trigger_info,
            trigger_type: (trigger_info & TRIGGER_TYPE_MASK) as u8,
            triggered_adc: ((trigger_info >> TRIGGERED_ADC_SHIFT) & TRIGGERED_ADC_MASK) as u8,
            trigger_ch_mask: (trigger_info >> TRIGGER_CH_MASK_SHIFT) & TRIGGER_CH_MASK_MASK,
        }
    }

    /// Decode a 58-byte datagram
    pub fn decode(datagram: &[u8]) -> Result<Self, DecodeError> {
        let header = DeviceHeader::parse(datagram)?;
        if datagram.len() != TRIGGER_PACKET_SIZE {
            return Err(DecodeError::Unclassified {
                len: datagram.len(),
            });
        }

        let mut tail = &datagram[HEADER_SIZE..];
        let mut halves = [0u32; 8];
        for half in halves.iter_mut() {
            *half = tail.get_u16() as u32;
        }
        let [count0, count1, ts0, ts1, ts2, ts3, info0, info1] = halves;

        let trigger_count = (count1 << 16) | count0;
        let global_ts =
            ((ts3 as u64) << 48) | ((ts2 as u64) << 32) | ((ts1 as u64) << 16) | ts0 as u64;
        let trigger_info = (info1 << 16) | info0;

        Ok(Self::new(header, trigger_count, global_ts, trigger_info))
    }

    /// Whether channel `index` (0..20) is set in the channel mask
    pub fn channel_triggered(&self, index: u32) -> bool {
        index < 20 && (self.trigger_ch_mask >> index) & 1 == 1
    }
}
