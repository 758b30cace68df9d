//! NuPRISM UDP wire protocol
//!
//! Every datagram starts with a 42-byte big-endian header. The packet kind is
//! determined by total length: 1066 bytes is a data packet, 58 bytes a
//! trigger packet. Anything else is dropped by the caller.

pub mod common;
pub mod data;
pub mod encode;
pub mod trigger;

pub use common::constants;
pub use common::{
    sample_to_full_scale, DecodeError, DeviceHeader, PacketKind, PayloadLayout, Record,
};
pub use data::DataRecord;
pub use encode::{encode_data_packet, encode_trigger_packet, EncodeError};
pub use trigger::TriggerRecord;

use constants::{DATA_PACKET_SIZE, HEADER_SIZE, TRIGGER_PACKET_SIZE};

/// Classify a datagram by its length
pub fn classify(datagram: &[u8]) -> PacketKind {
    match datagram.len() {
        len if len < HEADER_SIZE => PacketKind::Truncated,
        DATA_PACKET_SIZE => PacketKind::Data,
        TRIGGER_PACKET_SIZE => PacketKind::Trigger,
        _ => PacketKind::Unknown,
    }
}

/// Decode a datagram with the default payload layout
pub fn decode(datagram: &[u8]) -> Result<Record, DecodeError> {
    decode_with(datagram, PayloadLayout::default())
}

/// Decode a datagram, walking data payloads with `layout`
pub fn decode_with(datagram: &[u8], layout: PayloadLayout) -> Result<Record, DecodeError> {
    match classify(datagram) {
        PacketKind::Truncated => Err(DecodeError::Truncated {
            len: datagram.len(),
        }),
        PacketKind::Data => DataRecord::decode(datagram, layout).map(Record::Data),
        PacketKind::Trigger => TriggerRecord::decode(datagram).map(Record::Trigger),
        PacketKind::Unknown => Err(DecodeError::Unclassified {
            len: datagram.len(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_length() {
        assert_eq!(classify(&[]), PacketKind::Truncated);
        assert_eq!(classify(&[0; 41]), PacketKind::Truncated);
        assert_eq!(classify(&[0; 42]), PacketKind::Unknown);
        assert_eq!(classify(&[0; 58]), PacketKind::Trigger);
        assert_eq!(classify(&[0; 1066]), PacketKind::Data);
        assert_eq!(classify(&[0; 1500]), PacketKind::Unknown);
    }

    #[test]
    fn test_decode_short_is_truncated() {
        for len in 0..HEADER_SIZE {
            assert_eq!(
                decode(&vec![0xFF; len]),
                Err(DecodeError::Truncated { len })
            );
        }
    }

    #[test]
    fn test_decode_other_lengths_unclassified() {
        for len in [42, 43, 57, 59, 100, 1024, 1065, 1067, 1500, 9000] {
            assert_eq!(
                decode(&vec![0u8; len]),
                Err(DecodeError::Unclassified { len })
            );
        }
    }

    #[test]
    fn test_decode_dispatch() {
        assert!(matches!(decode(&[0; 1066]), Ok(Record::Data(_))));
        assert!(matches!(decode(&[0; 58]), Ok(Record::Trigger(_))));
    }

    #[test]
    fn test_decode_default_layout_is_dense() {
        match decode(&[0; 1066]).unwrap() {
            Record::Data(record) => assert_eq!(record.num_quadruples(), 128),
            other => panic!("expected data record, got {:?}", other),
        }
        match decode_with(&[0; 1066], PayloadLayout::Strided).unwrap() {
            Record::Data(record) => assert_eq!(record.num_quadruples(), 16),
            other => panic!("expected data record, got {:?}", other),
        }
    }

    #[test]
    fn test_record_header_accessor() {
        let mut data = vec![0u8; 58];
        data[2..6].copy_from_slice(&99u32.to_be_bytes());
        let record = decode(&data).unwrap();
        assert_eq!(record.header().packet_id, 99);
    }
}
