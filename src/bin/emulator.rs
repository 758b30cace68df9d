//! Emulator binary - sends synthetic NuPRISM datagrams over UDP
//!
//! Usage:
//!   nuprism-emulator                                  # 100 frames/s to 127.0.0.1:1500
//!   nuprism-emulator --target 10.0.0.2:1500 --adcs 2  # Two ADCs to a remote monitor
//!   nuprism-emulator --count 1000 --rate 0            # 1000 frames, unthrottled

use clap::Parser;
use nuprism_rs::common::{init_tracing, setup_shutdown, EmulatorArgs};
use nuprism_rs::emulator::{DeviceEmulator, EmulatorConfig};
use tokio::net::UdpSocket;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = EmulatorArgs::parse();
    init_tracing(args.verbose, None)?;

    let config = EmulatorConfig {
        num_adcs: args.adcs,
        layout: args.layout,
        trigger_every: args.trigger_every,
        seed: args.seed,
        ..Default::default()
    };
    let mut emulator = DeviceEmulator::new(config)?;

    let bind = if args.target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
    let socket = UdpSocket::bind(bind).await?;
    let stop = setup_shutdown();

    println!(
        "Emulator sending to {} ({} ADCs, {} layout). Press Ctrl+C to stop.",
        args.target,
        emulator.config().num_adcs,
        emulator.config().layout
    );

    let stats = emulator
        .run(&socket, args.target, args.rate, args.count, &stop)
        .await?;

    println!(
        "Sent {} frames: {} data packets, {} trigger packets, {} bytes",
        stats.frames, stats.data_packets, stats.trigger_packets, stats.bytes
    );
    Ok(())
}
