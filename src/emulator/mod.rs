//! Device emulator - synthesizes NuPRISM datagrams for testing
//!
//! Each frame carries one data packet per enabled ADC: a sine wave per
//! channel (phase-shifted by channel) with Gaussian noise. A trigger packet
//! follows every `trigger_every` frames. Frames are sent over UDP at a fixed
//! rate until stopped or until a frame count is reached.

use std::f64::consts::TAU;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::BytesMut;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::Deserialize;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::common::StopFlag;
use crate::protocol::constants::{
    DATA_PAYLOAD_SIZE, NUM_ADC, NUM_CH_PER_ADC, TRIGGER_PACKET_SIZE,
};
use crate::protocol::{
    encode_data_packet, encode_trigger_packet, DataRecord, DeviceHeader, EncodeError,
    PayloadLayout, TriggerRecord,
};

/// Emulator configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmulatorConfig {
    /// Number of ADCs to emit, starting at ADC 0
    pub num_adcs: u8,
    pub layout: PayloadLayout,
    /// Emit a trigger packet every N frames (0 = never)
    pub trigger_every: u64,
    /// Sine amplitude in ADC counts
    pub amplitude: f64,
    /// Noise sigma in ADC counts
    pub noise_sigma: f64,
    /// Sine period in samples
    pub period_samples: f64,
    /// RNG seed; `None` seeds from entropy
    pub seed: Option<u64>,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            num_adcs: NUM_ADC as u8,
            layout: PayloadLayout::default(),
            trigger_every: 10,
            amplitude: 8000.0,
            noise_sigma: 50.0,
            period_samples: 256.0,
            seed: None,
        }
    }
}

/// Emulator errors
#[derive(Error, Debug)]
pub enum EmulatorError {
    #[error("Socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Totals for one emulator run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmulatorStats {
    pub frames: u64,
    pub data_packets: u64,
    pub trigger_packets: u64,
    pub bytes: u64,
}

/// Packet generator with its own header counters and RNG
pub struct DeviceEmulator {
    config: EmulatorConfig,
    rng: StdRng,
    noise: Normal<f64>,
    packet_id: u32,
    frame_id: u32,
    timestamp: u64,
    trigger_count: u32,
    /// Sample index reached per ADC, drives the sine phase
    sample_index: [u64; NUM_ADC],
}

impl DeviceEmulator {
    pub fn new(config: EmulatorConfig) -> Result<Self, EmulatorError> {
        if config.num_adcs == 0 || config.num_adcs as usize > NUM_ADC {
            return Err(EmulatorError::Config(format!(
                "num_adcs must be 1..={}, got {}",
                NUM_ADC, config.num_adcs
            )));
        }
        if config.period_samples <= 0.0 {
            return Err(EmulatorError::Config("period_samples must be > 0".into()));
        }
        let noise = Normal::new(0.0, config.noise_sigma)
            .map_err(|e| EmulatorError::Config(format!("noise_sigma: {}", e)))?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            config,
            rng,
            noise,
            packet_id: 0,
            frame_id: 0,
            timestamp: 0,
            trigger_count: 0,
            sample_index: [0; NUM_ADC],
        })
    }

    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    fn next_header(&mut self) -> DeviceHeader {
        let header = DeviceHeader {
            num_words: 0,
            packet_id: self.packet_id,
            frame_id: self.frame_id,
            timestamp: self.timestamp,
            trigger_count: self.trigger_count,
            user_words: [0; 4],
        };
        self.packet_id = self.packet_id.wrapping_add(1);
        header
    }

    /// Generate the next data record for `adc_id` without encoding it
    pub fn next_data_record(&mut self, adc_id: u8) -> DataRecord {
        let n = self.config.layout.quadruples_per_packet();
        let start = self.sample_index[adc_id as usize % NUM_ADC];
        let period = self.config.period_samples;
        let amplitude = self.config.amplitude;
        let noise = self.noise;
        let rng = &mut self.rng;

        let channels: [Vec<i16>; NUM_CH_PER_ADC] = std::array::from_fn(|ch| {
            let phase = ch as f64 * TAU / NUM_CH_PER_ADC as f64;
            (0..n as u64)
                .map(|i| {
                    let t = (start + i) as f64;
                    let value = amplitude * (TAU * t / period + phase).sin()
                        + noise.sample(rng);
                    value.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16
                })
                .collect()
        });

        self.sample_index[adc_id as usize % NUM_ADC] = start + n as u64;
        let mut header = self.next_header();
        header.set_adc_id(adc_id);
        header.num_words = (DATA_PAYLOAD_SIZE / 4) as u16;

        DataRecord {
            header,
            adc_id,
            channels,
        }
    }

    /// Encoded data packet for `adc_id`
    pub fn next_data_packet(&mut self, adc_id: u8) -> Result<BytesMut, EmulatorError> {
        let record = self.next_data_record(adc_id);
        Ok(encode_data_packet(&record, self.config.layout)?)
    }

    /// Generate the next trigger record
    ///
    /// The info word names a random ADC and a random non-empty channel mask.
    pub fn next_trigger_record(&mut self) -> TriggerRecord {
        self.trigger_count = self.trigger_count.wrapping_add(1);
        let trigger_type: u32 = self.rng.gen_range(0..4);
        let adc: u32 = self.rng.gen_range(0..self.config.num_adcs as u32);
        let mask: u32 = self.rng.gen_range(1..=0xFFFFF);
        let info = trigger_type | (adc << 4) | (mask << 9);

        let header = self.next_header();
        TriggerRecord::new(header, self.trigger_count, self.timestamp, info)
    }

    /// Encoded trigger packet
    pub fn next_trigger_packet(&mut self) -> BytesMut {
        let record = self.next_trigger_record();
        encode_trigger_packet(&record)
    }

    /// One frame: a data packet per ADC, plus a trigger packet when due
    pub fn next_frame(&mut self) -> Result<Vec<BytesMut>, EmulatorError> {
        let mut packets = Vec::with_capacity(self.config.num_adcs as usize + 1);
        for adc_id in 0..self.config.num_adcs {
            packets.push(self.next_data_packet(adc_id)?);
        }

        self.frame_id = self.frame_id.wrapping_add(1);
        self.timestamp += self.config.layout.quadruples_per_packet() as u64;

        let every = self.config.trigger_every;
        if every > 0 && self.frame_id as u64 % every == 0 {
            packets.push(self.next_trigger_packet());
        }
        Ok(packets)
    }

    /// Send frames to `target` at `frames_per_sec` until `stop` is set or
    /// `max_frames` frames have been sent.
    ///
    /// A rate of 0, or one too high for the timer to resolve, sends as fast
    /// as possible. Negative or non-finite rates are rejected.
    pub async fn run(
        &mut self,
        socket: &UdpSocket,
        target: SocketAddr,
        frames_per_sec: f64,
        max_frames: Option<u64>,
        stop: &StopFlag,
    ) -> Result<EmulatorStats, EmulatorError> {
        let period = frame_period(frames_per_sec)?;
        let use_ticker = period.is_some();
        let mut ticker = interval(period.unwrap_or(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            %target,
            rate = frames_per_sec,
            adcs = self.config.num_adcs,
            layout = %self.config.layout,
            "Emulator sending"
        );

        let mut stats = EmulatorStats::default();
        while !stop.should_stop() {
            if max_frames.is_some_and(|max| stats.frames >= max) {
                break;
            }
            if use_ticker {
                ticker.tick().await;
            } else {
                tokio::task::yield_now().await;
            }

            for packet in self.next_frame()? {
                let sent = socket.send_to(&packet, target).await?;
                stats.bytes += sent as u64;
                if packet.len() == TRIGGER_PACKET_SIZE {
                    stats.trigger_packets += 1;
                } else {
                    stats.data_packets += 1;
                }
            }
            stats.frames += 1;
            if stats.frames % 1000 == 0 {
                debug!(frames = stats.frames, bytes = stats.bytes, "Emulator progress");
            }
        }

        info!(
            frames = stats.frames,
            data_packets = stats.data_packets,
            trigger_packets = stats.trigger_packets,
            "Emulator stopped"
        );
        Ok(stats)
    }
}

/// Tick period for a frame rate; `None` means unthrottled
fn frame_period(frames_per_sec: f64) -> Result<Option<Duration>, EmulatorError> {
    if !frames_per_sec.is_finite() || frames_per_sec < 0.0 {
        return Err(EmulatorError::Config(format!(
            "rate must be finite and >= 0, got {}",
            frames_per_sec
        )));
    }
    if frames_per_sec == 0.0 {
        return Ok(None);
    }
    let period = Duration::try_from_secs_f64(1.0 / frames_per_sec)
        .map_err(|e| EmulatorError::Config(format!("rate {}: {}", frames_per_sec, e)))?;
    Ok((!period.is_zero()).then_some(period))
}
