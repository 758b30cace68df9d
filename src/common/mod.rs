//! Infrastructure shared by the library and the binaries
//!
//! Errors, counters, shutdown signalling, logging setup and CLI arguments.

pub mod cli;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod shutdown;

pub use cli::{EmulatorArgs, MonitorArgs};
pub use error::{PipelineError, PipelineResult};
pub use logging::{build_filter, init_tracing, verbosity_level};
pub use metrics::{IngestMetrics, MetricsSnapshot, ThroughputReport, ThroughputWindow};
pub use shutdown::{setup_shutdown, StopFlag};
