//! Rolling per-channel sample buffers
//!
//! One fixed-capacity ring per (ADC, channel). Rings start full of `None`
//! placeholders so readers can render a full window before data arrives.
//! A push overwrites the oldest entries in place, so the steady-state cost
//! is proportional to the number of samples appended.
//!
//! Locking is per ADC: a push updates all four channels of one ADC under a
//! single write lock, so readers see either the whole push or none of it.

use parking_lot::RwLock;
use thiserror::Error;

use crate::protocol::constants::{NUM_ADC, NUM_CH_PER_ADC};
use crate::protocol::DataRecord;

/// Default number of samples kept per channel
pub const DEFAULT_MAX_SAMPLES: usize = 1024;

/// Store errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("max_samples must be at least 1")]
    ZeroCapacity,

    #[error("ADC index {0} out of range")]
    InvalidAdc(usize),

    #[error("channel index {0} out of range")]
    InvalidChannel(usize),
}

/// Fixed-capacity ring that is always full; `head` is the oldest slot
#[derive(Debug, Clone)]
struct ChannelRing {
    slots: Vec<Option<i16>>,
    head: usize,
}

impl ChannelRing {
    fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
            head: 0,
        }
    }

    fn extend(&mut self, samples: &[i16]) {
        let capacity = self.slots.len();
        // Only the newest `capacity` samples can survive
        let samples = &samples[samples.len().saturating_sub(capacity)..];
        for &sample in samples {
            self.slots[self.head] = Some(sample);
            self.head += 1;
            if self.head == capacity {
                self.head = 0;
            }
        }
    }

    /// Oldest-first copy
    fn to_vec(&self) -> Vec<Option<i16>> {
        let mut out = Vec::with_capacity(self.slots.len());
        out.extend_from_slice(&self.slots[self.head..]);
        out.extend_from_slice(&self.slots[..self.head]);
        out
    }

    fn clear(&mut self) {
        self.slots.fill(None);
        self.head = 0;
    }
}

#[derive(Debug, Clone)]
struct AdcBuffers {
    channels: [ChannelRing; NUM_CH_PER_ADC],
    /// Samples pushed per channel since creation or last clear
    pushed: u64,
}

impl AdcBuffers {
    fn new(capacity: usize) -> Self {
        Self {
            channels: std::array::from_fn(|_| ChannelRing::new(capacity)),
            pushed: 0,
        }
    }

    fn filled(&self, capacity: usize) -> usize {
        self.pushed.min(capacity as u64) as usize
    }
}

/// Per-ADC, per-channel rolling sample store
///
/// Single writer (the ingestion loop), any number of readers. Share it
/// behind an `Arc`.
#[derive(Debug)]
pub struct SampleStore {
    max_samples: usize,
    adcs: [RwLock<AdcBuffers>; NUM_ADC],
}

impl SampleStore {
    /// Create a store holding `max_samples` placeholders per channel
    pub fn new(max_samples: usize) -> Result<Self, StoreError> {
        if max_samples == 0 {
            return Err(StoreError::ZeroCapacity);
        }
        Ok(Self {
            max_samples,
            adcs: std::array::from_fn(|_| RwLock::new(AdcBuffers::new(max_samples))),
        })
    }

    pub fn max_samples(&self) -> usize {
        self.max_samples
    }

    fn adc(&self, adc_id: usize) -> Result<&RwLock<AdcBuffers>, StoreError> {
        self.adcs.get(adc_id).ok_or(StoreError::InvalidAdc(adc_id))
    }

    fn check_channel(channel: usize) -> Result<(), StoreError> {
        if channel < NUM_CH_PER_ADC {
            Ok(())
        } else {
            Err(StoreError::InvalidChannel(channel))
        }
    }

    /// Append each channel's samples, evicting the oldest beyond capacity
    pub fn push(
        &self,
        adc_id: usize,
        channel_samples: &[Vec<i16>; NUM_CH_PER_ADC],
    ) -> Result<(), StoreError> {
        let mut adc = self.adc(adc_id)?.write();
        for (ring, samples) in adc.channels.iter_mut().zip(channel_samples) {
            ring.extend(samples);
        }
        let appended = channel_samples.iter().map(Vec::len).max().unwrap_or(0);
        adc.pushed += appended as u64;
        Ok(())
    }

    /// Push a decoded data packet
    pub fn push_record(&self, record: &DataRecord) -> Result<(), StoreError> {
        self.push(record.adc_id as usize, &record.channels)
    }

    /// Oldest-first copy of one channel, placeholders included
    pub fn snapshot(
        &self,
        adc_id: usize,
        channel: usize,
    ) -> Result<Vec<Option<i16>>, StoreError> {
        Self::check_channel(channel)?;
        let adc = self.adc(adc_id)?.read();
        Ok(adc.channels[channel].to_vec())
    }

    /// Consistent oldest-first copy of all four channels of one ADC
    pub fn snapshot_adc(
        &self,
        adc_id: usize,
    ) -> Result<[Vec<Option<i16>>; NUM_CH_PER_ADC], StoreError> {
        let adc = self.adc(adc_id)?.read();
        Ok(std::array::from_fn(|ch| adc.channels[ch].to_vec()))
    }

    /// Real samples of one channel only, oldest-first
    pub fn recent(&self, adc_id: usize, channel: usize) -> Result<Vec<i16>, StoreError> {
        Ok(self.snapshot(adc_id, channel)?.into_iter().flatten().collect())
    }

    /// Number of non-placeholder entries per channel of an ADC
    pub fn filled(&self, adc_id: usize) -> Result<usize, StoreError> {
        Ok(self.adc(adc_id)?.read().filled(self.max_samples))
    }

    /// Samples pushed per channel since creation or the last clear
    pub fn total_pushed(&self, adc_id: usize) -> Result<u64, StoreError> {
        Ok(self.adc(adc_id)?.read().pushed)
    }

    /// Reset every channel back to placeholders
    pub fn clear(&self) {
        for adc in &self.adcs {
            let mut adc = adc.write();
            adc.channels.iter_mut().for_each(ChannelRing::clear);
            adc.pushed = 0;
        }
    }
}

impl Default for SampleStore {
    fn default() -> Self {
        Self {
            max_samples: DEFAULT_MAX_SAMPLES,
            adcs: std::array::from_fn(|_| RwLock::new(AdcBuffers::new(DEFAULT_MAX_SAMPLES))),
        }
    }
}
