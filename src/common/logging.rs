//! Tracing subscriber setup shared by the binaries

use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use super::error::{PipelineError, PipelineResult};

/// Map `-v` occurrences to a level: none is WARN, `-v` INFO, `-vv` DEBUG
pub fn verbosity_level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        _ => LevelFilter::DEBUG,
    }
}

/// Filter from `RUST_LOG`-style directives when given, else from `-v`
pub fn build_filter(verbose: u8, env_directives: Option<&str>) -> EnvFilter {
    match env_directives.filter(|d| !d.trim().is_empty()) {
        Some(directives) => EnvFilter::builder().parse_lossy(directives),
        None => EnvFilter::builder()
            .with_default_directive(verbosity_level(verbose).into())
            .parse_lossy(""),
    }
}

/// Initialise tracing. A non-empty `RUST_LOG` takes precedence over the
/// verbosity level. With `log_file` set, output goes to that file
/// (truncated) instead of stderr.
pub fn init_tracing(verbose: u8, log_file: Option<&Path>) -> PipelineResult<()> {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(verbose, env.as_deref());

    let result = match log_file {
        Some(path) => {
            let file = File::create(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
    };

    result.map_err(|e| PipelineError::logging(e.to_string()))
}
