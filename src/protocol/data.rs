//! Data packet decoder
//!
//! A data packet is the 42-byte header followed by a 1024-byte payload of
//! little-endian `i16` quadruples, one sample for each of the 4 channels of
//! the ADC named in user word 3.

use bytes::Buf;

use super::common::constants::*;
use super::common::{DecodeError, DeviceHeader, PayloadLayout};

/// Samples of one data packet, split per channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRecord {
    pub header: DeviceHeader,
    /// Source ADC, always < `NUM_ADC`
    pub adc_id: u8,
    /// Channels "0".."3", samples in payload order
    pub channels: [Vec<i16>; NUM_CH_PER_ADC],
}

impl DataRecord {
    /// Decode a 1066-byte datagram
    pub fn decode(datagram: &[u8], layout: PayloadLayout) -> Result<Self, DecodeError> {
        let header = DeviceHeader::parse(datagram)?;
        if datagram.len() != DATA_PACKET_SIZE {
            return Err(DecodeError::Unclassified {
                len: datagram.len(),
            });
        }

        let adc_id = header.adc_id();
        if adc_id as usize >= NUM_ADC {
            return Err(DecodeError::InvalidAdcId(adc_id));
        }

        let payload = &datagram[HEADER_SIZE..];
        let n = layout.quadruples_per_packet();
        let mut channels: [Vec<i16>; NUM_CH_PER_ADC] =
            std::array::from_fn(|_| Vec::with_capacity(n));

        for offset in (0..DATA_PAYLOAD_SIZE).step_by(layout.stride()) {
            let mut quad = &payload[offset..offset + QUADRUPLE_SIZE];
            for channel in channels.iter_mut() {
                channel.push(quad.get_i16_le());
            }
        }

        Ok(Self {
            header,
            adc_id,
            channels,
        })
    }

    /// Number of sample instants in this packet
    pub fn num_quadruples(&self) -> usize {
        self.channels[0].len()
    }

    /// Total samples over all channels
    pub fn num_samples(&self) -> usize {
        self.channels.iter().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_packet(adc_id: u8) -> Vec<u8> {
        let mut data = vec![0u8; DATA_PACKET_SIZE];
        data[38] = adc_id;
        // Quadruple k holds (k, -k, 1000 + k, i16::MIN + k)
        for k in 0..(DATA_PAYLOAD_SIZE / QUADRUPLE_SIZE) {
            let base = HEADER_SIZE + k * QUADRUPLE_SIZE;
            let k = k as i16;
            data[base..base + 2].copy_from_slice(&k.to_le_bytes());
            data[base + 2..base + 4].copy_from_slice(&(-k).to_le_bytes());
            data[base + 4..base + 6].copy_from_slice(&(1000 + k).to_le_bytes());
            data[base + 6..base + 8].copy_from_slice(&(i16::MIN + k).to_le_bytes());
        }
        data
    }

    #[test]
    fn test_decode_dense_yields_128_quadruples() {
        let record = DataRecord::decode(&data_packet(2), PayloadLayout::Dense).unwrap();
        assert_eq!(record.adc_id, 2);
        assert_eq!(record.num_quadruples(), 128);
        assert_eq!(record.num_samples(), 512);

        for k in 0..128i16 {
            let i = k as usize;
            assert_eq!(record.channels[0][i], k);
            assert_eq!(record.channels[1][i], -k);
            assert_eq!(record.channels[2][i], 1000 + k);
            assert_eq!(record.channels[3][i], i16::MIN + k);
        }
    }

    #[test]
    fn test_decode_strided_takes_first_quadruple_of_each_stride() {
        let record = DataRecord::decode(&data_packet(0), PayloadLayout::Strided).unwrap();
        assert_eq!(record.num_quadruples(), 16);
        // Every 8th quadruple of the dense walk
        let expected: Vec<i16> = (0..16).map(|s| s * 8).collect();
        assert_eq!(record.channels[0], expected);
    }

    #[test]
    fn test_decode_invalid_adc() {
        let err = DataRecord::decode(&data_packet(5), PayloadLayout::Dense).unwrap_err();
        assert_eq!(err, DecodeError::InvalidAdcId(5));

        let err = DataRecord::decode(&data_packet(0xFF), PayloadLayout::Dense).unwrap_err();
        assert_eq!(err, DecodeError::InvalidAdcId(0xFF));
    }

    #[test]
    fn test_decode_wrong_length() {
        let mut data = data_packet(1);
        data.pop();
        assert_eq!(
            DataRecord::decode(&data, PayloadLayout::Dense),
            Err(DecodeError::Unclassified { len: 1065 })
        );
        assert_eq!(
            DataRecord::decode(&data[..10], PayloadLayout::Dense),
            Err(DecodeError::Truncated { len: 10 })
        );
    }

    #[test]
    fn test_samples_are_little_endian() {
        let mut data = vec![0u8; DATA_PACKET_SIZE];
        data[HEADER_SIZE] = 0x34;
        data[HEADER_SIZE + 1] = 0x12;
        data[HEADER_SIZE + 2] = 0xFF;
        data[HEADER_SIZE + 3] = 0xFF;
        let record = DataRecord::decode(&data, PayloadLayout::Dense).unwrap();
        assert_eq!(record.channels[0][0], 0x1234);
        assert_eq!(record.channels[1][0], -1);
    }
}
