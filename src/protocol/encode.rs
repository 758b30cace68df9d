//! Datagram encoder, the inverse of the decoders
//!
//! Used by the emulator to synthesize device traffic and by tests.

use bytes::{BufMut, BytesMut};
use thiserror::Error;

use super::common::constants::*;
use super::common::PayloadLayout;
use super::data::DataRecord;
use super::trigger::TriggerRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("invalid ADC id {0}")]
    InvalidAdcId(u8),

    #[error("channel {channel} has {actual} samples, layout needs {expected}")]
    SampleCount {
        channel: usize,
        expected: usize,
        actual: usize,
    },
}

/// Encode a data packet. `record.adc_id` overrides the top byte of user word 3.
///
/// Bytes the layout does not read (the rest of each stride for `Strided`)
/// are zero.
pub fn encode_data_packet(
    record: &DataRecord,
    layout: PayloadLayout,
) -> Result<BytesMut, EncodeError> {
    if record.adc_id as usize >= NUM_ADC {
        return Err(EncodeError::InvalidAdcId(record.adc_id));
    }
    let expected = layout.quadruples_per_packet();
    for (channel, samples) in record.channels.iter().enumerate() {
        if samples.len() != expected {
            return Err(EncodeError::SampleCount {
                channel,
                expected,
                actual: samples.len(),
            });
        }
    }

    let mut header = record.header;
    header.set_adc_id(record.adc_id);

    let mut buf = BytesMut::with_capacity(DATA_PACKET_SIZE);
    header.write_to(&mut buf);
    for k in 0..expected {
        for samples in &record.channels {
            buf.put_i16_le(samples[k]);
        }
        buf.put_bytes(0, layout.stride() - QUADRUPLE_SIZE);
    }
    debug_assert_eq!(buf.len(), DATA_PACKET_SIZE);
    Ok(buf)
}

/// Encode a trigger packet from the record's count, timestamp and info word
pub fn encode_trigger_packet(record: &TriggerRecord) -> BytesMut {
    let mut buf = BytesMut::with_capacity(TRIGGER_PACKET_SIZE);
    record.header.write_to(&mut buf);

    buf.put_u16(record.trigger_count as u16);
    buf.put_u16((record.trigger_count >> 16) as u16);
    for shift in [0, 16, 32, 48] {
        buf.put_u16((record.global_ts >> shift) as u16);
    }
    buf.put_u16(record.trigger_info as u16);
    buf.put_u16((record.trigger_info >> 16) as u16);
    buf
}
