//! Monitor binary - receives NuPRISM datagrams and displays live samples
//!
//! Usage:
//!   nuprism-monitor                          # All ADCs, port 1500
//!   nuprism-monitor 192.168.0.10 -a 2 -v     # Only ADC 2, accept one host
//!   nuprism-monitor -f nuprism.toml --json   # Config file, JSON reports

use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use nuprism_rs::common::{init_tracing, setup_shutdown, MonitorArgs, PipelineError};
use nuprism_rs::config::Config;
use nuprism_rs::ingest::{IngestConfig, IngestEvent, Ingestor, UdpDatagramSource};
use nuprism_rs::monitor::render;
use nuprism_rs::store::SampleStore;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = MonitorArgs::parse();
    init_tracing(args.verbose, args.log_file.as_deref())?;

    let mut config = match &args.config_file {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };
    args.apply_to(&mut config);
    config.validate()?;

    let bind_addr = config.network.bind_address()?;
    let mut source = UdpDatagramSource::bind(bind_addr, config.network.module_ip)
        .with_context(|| format!("binding UDP {}", bind_addr))?;

    let store = Arc::new(SampleStore::new(config.store.max_samples)?);
    let ingestor = Ingestor::new(IngestConfig::from_config(&config), store.clone());
    let stop = setup_shutdown();

    info!(
        %bind_addr,
        module_ip = ?config.network.module_ip,
        adc = %args.adc,
        max_samples = config.store.max_samples,
        "Monitor starting"
    );

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<IngestEvent>();
    let ingest_stop = stop.clone();
    let ingest_handle = tokio::task::spawn_blocking(move || {
        let mut sink = event_tx;
        ingestor.run(&mut source, &mut sink, &ingest_stop)
    });

    let mut ticker = interval(args.refresh_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_report = String::new();

    while !stop.should_stop() {
        tokio::select! {
            _ = ticker.tick() => {
                if args.json {
                    continue;
                }
                match render(&store, args.adc) {
                    Ok(text) => {
                        // Clear screen, home cursor
                        println!("\x1b[2J\x1b[H{}{}", text, last_report);
                    }
                    Err(e) => warn!(error = %e, "Render failed"),
                }
            }
            event = event_rx.recv() => match event {
                Some(IngestEvent::Report(report)) => {
                    if args.json {
                        println!("{}", serde_json::to_string(&report)?);
                    } else {
                        last_report = report.to_string();
                    }
                    info!(rate = %report.format_bytes_rate(), "Throughput");
                }
                Some(IngestEvent::Trigger(trigger)) => {
                    debug!(
                        trigger_count = trigger.trigger_count,
                        triggered_adc = trigger.triggered_adc,
                        "Trigger received"
                    );
                }
                // Ingestion thread has exited
                None => break,
            },
        }
    }

    stop.request_stop();
    let summary = ingest_handle
        .await
        .map_err(|e| PipelineError::other(format!("ingestion task failed: {}", e)))?;

    println!(
        "Received {} datagrams ({} bytes): {} data, {} trigger, {} dropped, {} socket errors",
        summary.datagrams,
        summary.bytes,
        summary.data_packets,
        summary.trigger_packets,
        summary.decode_errors(),
        summary.socket_errors
    );
    Ok(())
}
