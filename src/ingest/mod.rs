//! Ingestion loop
//!
//! Pulls datagrams from a non-blocking source, decodes them and feeds data
//! packets into the sample store. Trigger records and periodic throughput
//! reports go to an [`EventSink`].
//!
//! The loop is synchronous and meant to own a thread (a `std::thread` or
//! `tokio::task::spawn_blocking`). It is the only writer of the store.

pub mod sink;
pub mod source;

pub use sink::{EventSink, IngestEvent, LogSink};
pub use source::{DatagramSource, ReplaySource, UdpDatagramSource};

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::common::{IngestMetrics, MetricsSnapshot, StopFlag, ThroughputWindow};
use crate::config::Config;
use crate::protocol::constants::DATA_PACKET_SIZE;
use crate::protocol::{decode_with, PayloadLayout, Record};
use crate::store::SampleStore;

/// Ingestion loop configuration
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Sleep after an empty receive
    pub poll_interval: Duration,
    /// Throughput report period
    pub report_interval: Duration,
    /// Receive buffer per datagram, raised to one byte over a data packet
    pub recv_buffer_size: usize,
    pub layout: PayloadLayout,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1),
            report_interval: Duration::from_secs(2),
            recv_buffer_size: 1500,
            layout: PayloadLayout::default(),
        }
    }
}

impl IngestConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            poll_interval: config.ingest.poll_interval(),
            report_interval: config.ingest.report_interval(),
            recv_buffer_size: config.network.recv_buffer_size,
            layout: config.ingest.payload_layout,
        }
    }
}

/// Decodes datagrams into a shared [`SampleStore`]
pub struct Ingestor {
    config: IngestConfig,
    store: Arc<SampleStore>,
    metrics: Arc<IngestMetrics>,
}

impl Ingestor {
    pub fn new(config: IngestConfig, store: Arc<SampleStore>) -> Self {
        Self {
            config,
            store,
            metrics: Arc::new(IngestMetrics::new()),
        }
    }

    pub fn store(&self) -> &Arc<SampleStore> {
        &self.store
    }

    /// Cumulative counters, readable while the loop runs
    pub fn metrics(&self) -> &Arc<IngestMetrics> {
        &self.metrics
    }

    /// Run until `stop` is set. Returns the final counters.
    ///
    /// Malformed datagrams and socket errors are counted and skipped; nothing
    /// but the stop flag ends the loop.
    pub fn run<S, K>(&self, source: &mut S, sink: &mut K, stop: &StopFlag) -> MetricsSnapshot
    where
        S: DatagramSource + ?Sized,
        K: EventSink + ?Sized,
    {
        info!(
            layout = %self.config.layout,
            max_samples = self.store.max_samples(),
            "Ingestion loop starting"
        );

        // Truncated datagrams must never reach a valid packet length
        let mut buf = vec![0u8; self.config.recv_buffer_size.max(DATA_PACKET_SIZE + 1)];
        let mut window = ThroughputWindow::new(Instant::now());
        let mut last_error_kind: Option<io::ErrorKind> = None;

        while !stop.should_stop() {
            let now = Instant::now();
            if window.is_due(now, self.config.report_interval) {
                sink.on_report(&window.take_report(now));
            }

            match source.receive(&mut buf) {
                Ok(Some(len)) => {
                    last_error_kind = None;
                    self.handle_datagram(&buf[..len], &mut window, sink);
                }
                Ok(None) => {
                    // Nothing pending, yield the CPU
                    std::thread::sleep(self.config.poll_interval);
                }
                Err(e) => {
                    self.metrics.inc_socket_error();
                    // Repeats of the same error are only logged at debug
                    if last_error_kind != Some(e.kind()) {
                        warn!(error = %e, "Receive error, continuing");
                        last_error_kind = Some(e.kind());
                    } else {
                        debug!(error = %e, "Receive error repeated");
                    }
                    std::thread::sleep(self.config.poll_interval);
                }
            }
        }

        let summary = self.metrics.snapshot();
        info!(
            datagrams = summary.datagrams,
            bytes = summary.bytes,
            data_packets = summary.data_packets,
            trigger_packets = summary.trigger_packets,
            dropped = summary.decode_errors(),
            socket_errors = summary.socket_errors,
            "Ingestion loop stopped"
        );
        summary
    }

    /// Decode one datagram and route the result
    pub fn handle_datagram<K>(&self, datagram: &[u8], window: &mut ThroughputWindow, sink: &mut K)
    where
        K: EventSink + ?Sized,
    {
        self.metrics.add_datagram(datagram.len());
        window.record_bytes(datagram.len());

        match decode_with(datagram, self.config.layout) {
            Ok(Record::Data(record)) => {
                if let Err(e) = self.store.push_record(&record) {
                    warn!(error = %e, adc_id = record.adc_id, "Store rejected data packet");
                    window.record_error();
                    return;
                }
                let samples = record.num_samples();
                self.metrics.add_data_packet(samples);
                window.record_data(record.adc_id, samples);
            }
            Ok(Record::Trigger(trigger)) => {
                self.metrics.inc_trigger_packet();
                window.record_trigger();
                sink.on_trigger(&trigger);
            }
            Err(e) => {
                self.metrics.record_decode_error(&e);
                window.record_error();
                debug!(error = %e, len = datagram.len(), "Dropped datagram");
            }
        }
    }
}
