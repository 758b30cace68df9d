//! nuprism-rs: UDP telemetry ingest for the NuPRISM ADC module
//!
//! Datagrams from the module are decoded ([`protocol`]) and the samples kept
//! in bounded per-channel buffers ([`store`]) by a single ingestion loop
//! ([`ingest`]). Readers poll the store concurrently ([`monitor`]).

pub mod common;
pub mod config;
pub mod emulator;
pub mod ingest;
pub mod monitor;
pub mod protocol;
pub mod store;
