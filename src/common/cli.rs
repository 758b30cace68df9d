//! CLI argument parsing for the NuPRISM binaries
//!
//! # Design Principles (KISS)
//! - Use clap's derive macro for declarative argument definition
//! - Every monitor flag is optional and only overrides the config file
//!   when given; defaults live in [`crate::config`]

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};

use crate::config::Config;
use crate::monitor::AdcSelection;
use crate::protocol::PayloadLayout;

/// Arguments for the monitor (UDP ingest + terminal display)
#[derive(Parser, Debug, Clone)]
#[command(name = "nuprism-monitor", about = "NuPRISM ADC UDP monitor")]
pub struct MonitorArgs {
    /// NuPRISM module address; datagrams from other hosts are dropped
    pub ip: Option<IpAddr>,

    /// ADC to display: 'all' or 1..5 (out-of-range numbers are clamped)
    #[arg(short = 'a', long = "adc", default_value = "all")]
    pub adc: AdcSelection,

    /// UDP port to listen on [default: 1500]
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Write logs to this file instead of stderr
    #[arg(short = 'l', long = "log")]
    pub log_file: Option<PathBuf>,

    /// Samples kept per channel [default: 1024]
    #[arg(short = 's', long = "samples")]
    pub samples: Option<usize>,

    /// Verbosity (-v info, -vv debug)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// Path to TOML configuration file
    #[arg(short = 'f', long = "config", env = "NUPRISM_CONFIG")]
    pub config_file: Option<PathBuf>,

    /// Data payload layout
    #[arg(long, value_enum)]
    pub layout: Option<PayloadLayout>,

    /// Display refresh in milliseconds [default: 200 for all ADCs, 50 for one]
    #[arg(long = "refresh-ms")]
    pub refresh_ms: Option<u64>,

    /// Print throughput reports as JSON lines instead of the display
    #[arg(long)]
    pub json: bool,
}

impl MonitorArgs {
    /// Overlay the flags that were given onto a loaded configuration
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(ip) = self.ip {
            config.network.module_ip = Some(ip);
        }
        if let Some(port) = self.port {
            config.network.port = port;
        }
        if let Some(samples) = self.samples {
            config.store.max_samples = samples;
        }
        if let Some(layout) = self.layout {
            config.ingest.payload_layout = layout;
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        match self.refresh_ms {
            Some(ms) => Duration::from_millis(ms.max(1)),
            None => self.adc.default_refresh(),
        }
    }
}

/// Arguments for the emulator (synthetic UDP traffic)
#[derive(Parser, Debug, Clone)]
#[command(name = "nuprism-emulator", about = "NuPRISM ADC module emulator")]
pub struct EmulatorArgs {
    /// Where to send datagrams
    #[arg(long, default_value = "127.0.0.1:1500")]
    pub target: SocketAddr,

    /// Frames per second (one data packet per ADC per frame); 0 = unthrottled
    #[arg(long, default_value_t = 100.0)]
    pub rate: f64,

    /// Number of ADCs to emulate
    #[arg(long, default_value_t = 5)]
    pub adcs: u8,

    /// Send a trigger packet every N frames (0 = never)
    #[arg(long = "trigger-every", default_value_t = 10)]
    pub trigger_every: u64,

    /// Data payload layout
    #[arg(long, value_enum, default_value_t = PayloadLayout::Dense)]
    pub layout: PayloadLayout,

    /// Stop after N frames
    #[arg(long)]
    pub count: Option<u64>,

    /// Seed for reproducible waveforms
    #[arg(long)]
    pub seed: Option<u64>,

    /// Verbosity (-v info, -vv debug)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,
}
