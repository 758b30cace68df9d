//! Cooperative shutdown
//!
//! # Design Principles (KISS)
//! - One shared stop flag, polled by the ingestion loop every iteration
//! - Ctrl+C sets the flag from a tokio task
//! - No thread interruption: an in-flight receive finishes on its own

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::signal;
use tracing::{info, warn};

/// Shared stop flag. Clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every holder of this flag to stop
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn should_stop(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Create a stop flag that is set on Ctrl+C
///
/// Must be called from within a tokio runtime.
///
/// # Example
/// ```ignore
/// let stop = setup_shutdown();
/// ingestor.run(&mut source, &mut sink, &stop);
/// ```
pub fn setup_shutdown() -> StopFlag {
    let stop = StopFlag::new();

    let flag = stop.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => info!("Ctrl+C received, initiating shutdown"),
            Err(e) => warn!(error = %e, "Failed to listen for Ctrl+C, stopping"),
        }
        flag.request_stop();
    });

    stop
}
