//! Ingestion metrics
//!
//! # Design Principles (KISS)
//! - Lock-free atomic counters for totals (readable from any thread)
//! - A plain rolling window owned by the ingestion loop for per-interval rates
//! - Reports are value types, handed to an event sink

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::protocol::constants::NUM_ADC;
use crate::protocol::DecodeError;

/// Cumulative counters since the ingestion loop started
///
/// All operations use Relaxed ordering. Statistics are eventually
/// consistent, which is acceptable for monitoring.
#[derive(Debug, Default)]
pub struct IngestMetrics {
    /// Datagrams received (any kind)
    pub datagrams: AtomicU64,
    /// Bytes received
    pub bytes: AtomicU64,
    pub data_packets: AtomicU64,
    pub trigger_packets: AtomicU64,
    /// Samples stored, summed over channels
    pub samples: AtomicU64,
    pub truncated: AtomicU64,
    pub invalid_adc: AtomicU64,
    pub unclassified: AtomicU64,
    /// Receive errors other than would-block
    pub socket_errors: AtomicU64,
}

impl IngestMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn add_datagram(&self, len: usize) {
        self.datagrams.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(len as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_data_packet(&self, samples: usize) {
        self.data_packets.fetch_add(1, Ordering::Relaxed);
        self.samples.fetch_add(samples as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_trigger_packet(&self) {
        self.trigger_packets.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_socket_error(&self) {
        self.socket_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a dropped datagram under its decode error
    #[inline]
    pub fn record_decode_error(&self, err: &DecodeError) {
        let counter = match err {
            DecodeError::Truncated { .. } => &self.truncated,
            DecodeError::InvalidAdcId(_) => &self.invalid_adc,
            DecodeError::Unclassified { .. } => &self.unclassified,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a snapshot of current values
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            datagrams: self.datagrams.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            data_packets: self.data_packets.load(Ordering::Relaxed),
            trigger_packets: self.trigger_packets.load(Ordering::Relaxed),
            samples: self.samples.load(Ordering::Relaxed),
            truncated: self.truncated.load(Ordering::Relaxed),
            invalid_adc: self.invalid_adc.load(Ordering::Relaxed),
            unclassified: self.unclassified.load(Ordering::Relaxed),
            socket_errors: self.socket_errors.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of counter values at a point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub datagrams: u64,
    pub bytes: u64,
    pub data_packets: u64,
    pub trigger_packets: u64,
    pub samples: u64,
    pub truncated: u64,
    pub invalid_adc: u64,
    pub unclassified: u64,
    pub socket_errors: u64,
}

impl MetricsSnapshot {
    /// Datagrams dropped by the decoder
    pub fn decode_errors(&self) -> u64 {
        self.truncated + self.invalid_adc + self.unclassified
    }
}

/// Per-interval counters, reset each time a report is taken
#[derive(Debug, Clone)]
pub struct ThroughputWindow {
    started: Instant,
    bytes: u64,
    data_packets: u64,
    trigger_packets: u64,
    errors: u64,
    samples_per_adc: [u64; NUM_ADC],
}

impl ThroughputWindow {
    pub fn new(now: Instant) -> Self {
        Self {
            started: now,
            bytes: 0,
            data_packets: 0,
            trigger_packets: 0,
            errors: 0,
            samples_per_adc: [0; NUM_ADC],
        }
    }

    #[inline]
    pub fn record_bytes(&mut self, len: usize) {
        self.bytes += len as u64;
    }

    #[inline]
    pub fn record_data(&mut self, adc_id: u8, samples: usize) {
        self.data_packets += 1;
        if let Some(count) = self.samples_per_adc.get_mut(adc_id as usize) {
            *count += samples as u64;
        }
    }

    #[inline]
    pub fn record_trigger(&mut self) {
        self.trigger_packets += 1;
    }

    #[inline]
    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    /// Whether `interval` has elapsed since the window started
    pub fn is_due(&self, now: Instant, interval: Duration) -> bool {
        now.saturating_duration_since(self.started) > interval
    }

    /// Produce a report for the elapsed window and start a new one at `now`
    pub fn take_report(&mut self, now: Instant) -> ThroughputReport {
        let elapsed_secs = now.saturating_duration_since(self.started).as_secs_f64();
        let bytes_rate = if elapsed_secs > 0.0 {
            self.bytes as f64 / elapsed_secs
        } else {
            0.0
        };

        let report = ThroughputReport {
            elapsed_secs,
            bytes: self.bytes,
            bytes_rate,
            data_packets: self.data_packets,
            trigger_packets: self.trigger_packets,
            errors: self.errors,
            samples_per_adc: self.samples_per_adc,
        };
        *self = Self::new(now);
        report
    }
}

/// Throughput over one reporting interval
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThroughputReport {
    pub elapsed_secs: f64,
    pub bytes: u64,
    /// Bytes per second
    pub bytes_rate: f64,
    pub data_packets: u64,
    pub trigger_packets: u64,
    /// Datagrams dropped by the decoder
    pub errors: u64,
    pub samples_per_adc: [u64; NUM_ADC],
}

impl ThroughputReport {
    /// Format bytes rate as human-readable string (KB/s, MB/s, etc.)
    pub fn format_bytes_rate(&self) -> String {
        if self.bytes_rate >= 1_000_000_000.0 {
            format!("{:.2} GB/s", self.bytes_rate / 1_000_000_000.0)
        } else if self.bytes_rate >= 1_000_000.0 {
            format!("{:.2} MB/s", self.bytes_rate / 1_000_000.0)
        } else if self.bytes_rate >= 1_000.0 {
            format!("{:.2} KB/s", self.bytes_rate / 1_000.0)
        } else {
            format!("{:.0} B/s", self.bytes_rate)
        }
    }

    pub fn total_samples(&self) -> u64 {
        self.samples_per_adc.iter().sum()
    }
}

impl fmt::Display for ThroughputReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rate: {}  Samples per ADC: {:?}  Triggers: {}  Dropped: {}",
            self.format_bytes_rate(),
            self.samples_per_adc,
            self.trigger_packets,
            self.errors
        )
    }
}
