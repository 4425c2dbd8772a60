use crate::error::{CliError, Result};
use std::fs::File;
use std::path::PathBuf;
use tracing_subscriber::{
    EnvFilter,
    filter::{LevelFilter, Targets},
    fmt::{self, format::FmtSpan},
    prelude::*,
};

/// Overrides `-v`/`-q` for the terminal, e.g. `HELIXKIT_LOG=helixkit::engine=debug`.
pub const LOG_ENV: &str = "HELIXKIT_LOG";

const CRATE_TARGET: &str = "helixkit";

fn level_filter(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::OFF;
    }
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

fn stderr_filter(verbosity: u8, quiet: bool, directives: Option<&str>) -> Result<EnvFilter> {
    match directives.filter(|d| !quiet && !d.trim().is_empty()) {
        Some(d) => EnvFilter::try_new(d).map_err(|e| CliError::Config(format!("invalid {LOG_ENV} value '{d}': {e}"))),
        None => Ok(EnvFilter::default().add_directive(level_filter(verbosity, quiet).into())),
    }
}

/// The log file always keeps helixkit's own debug output, which includes
/// every external command line and working directory, whatever the terminal
/// verbosity. Other crates only contribute warnings.
fn file_filter() -> Targets {
    Targets::new()
        .with_target(CRATE_TARGET, LevelFilter::DEBUG)
        .with_default(LevelFilter::WARN)
}

fn file_layer<S>(file: File) -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    // Closing a workflow span logs how long the whole protocol took.
    fmt::layer()
        .with_writer(file)
        .with_ansi(false)
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_filter(file_filter())
}

pub fn setup_logging(verbosity: u8, quiet: bool, log_file: Option<PathBuf>) -> Result<()> {
    let directives = std::env::var(LOG_ENV).ok();
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false)
        .compact()
        .with_filter(stderr_filter(verbosity, quiet, directives.as_deref())?);

    let subscriber = tracing_subscriber::registry().with(stderr_layer);

    if let Some(path) = log_file {
        let file = File::create(&path).map_err(CliError::Io)?;
        subscriber.with(file_layer(file)).init();
    } else {
        subscriber.init();
    }

    Ok(())
}
