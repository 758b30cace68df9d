//! Event sinks: where trigger records and throughput reports go

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::common::ThroughputReport;
use crate::protocol::TriggerRecord;

/// Events emitted by the ingestion loop besides store updates
#[derive(Debug, Clone, PartialEq)]
pub enum IngestEvent {
    Trigger(TriggerRecord),
    Report(ThroughputReport),
}

/// Receiver of trigger records and periodic throughput reports
///
/// Called on the ingestion thread; implementations must not block.
pub trait EventSink {
    fn on_trigger(&mut self, trigger: &TriggerRecord);
    fn on_report(&mut self, report: &ThroughputReport);
}

/// Writes events to the tracing log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn on_trigger(&mut self, trigger: &TriggerRecord) {
        debug!(
            trigger_count = trigger.trigger_count,
            global_ts = trigger.global_ts,
            trigger_type = trigger.trigger_type,
            triggered_adc = trigger.triggered_adc,
            mask = %format!("0x{:05X}", trigger.trigger_ch_mask),
            channels = ?(0..20)
                .filter(|&i| trigger.channel_triggered(i))
                .collect::<Vec<u32>>(),
            "Trigger"
        );
    }

    fn on_report(&mut self, report: &ThroughputReport) {
        info!(
            rate = %report.format_bytes_rate(),
            samples_per_adc = ?report.samples_per_adc,
            triggers = report.trigger_packets,
            dropped = report.errors,
            "Throughput"
        );
    }
}

/// Forward events to an async consumer. A closed receiver drops events.
impl EventSink for mpsc::UnboundedSender<IngestEvent> {
    fn on_trigger(&mut self, trigger: &TriggerRecord) {
        let _ = self.send(IngestEvent::Trigger(*trigger));
    }

    fn on_report(&mut self, report: &ThroughputReport) {
        let _ = self.send(IngestEvent::Report(*report));
    }
}

/// Collect events in memory
impl EventSink for Vec<IngestEvent> {
    fn on_trigger(&mut self, trigger: &TriggerRecord) {
        self.push(IngestEvent::Trigger(*trigger));
    }

    fn on_report(&mut self, report: &ThroughputReport) {
        self.push(IngestEvent::Report(*report));
    }
}
