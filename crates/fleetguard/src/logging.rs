//! Logging setup for fleetguard.
//!
//! Library code only emits `tracing` events; the binary decides where they go.
//! Events are written to stderr so `--json` output on stdout stays parseable.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Verbosity level for logging output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// Sweep and evaluation summaries (info and above).
    #[default]
    Normal,
    /// Per-item decisions such as suppressed alerts (debug and above).
    Verbose,
    /// Everything, including rejected HTTP extractors in `serve`.
    Trace,
}

impl Verbosity {
    /// Convert verbosity to tracing level filter.
    #[must_use]
    pub fn to_level_filter(&self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }

    /// Filter directives used when `RUST_LOG` is unset.
    ///
    /// Other crates stay at `warn`; at trace level axum's extractor
    /// rejections are let through so malformed cron calls can be diagnosed.
    #[must_use]
    pub fn directives(&self) -> String {
        let level = self.to_level_filter();
        match self {
            Self::Trace => format!("warn,fleetguard={level},axum::rejection=trace"),
            _ => format!("warn,fleetguard={level}"),
        }
    }
}

/// Initialize the logging system.
///
/// Call once at startup. `RUST_LOG` takes precedence over `verbosity`.
///
/// # Examples
///
/// ```no_run
/// use fleetguard::{init_logging, logging::Verbosity};
///
/// init_logging(Verbosity::Verbose);
/// ```
pub fn init_logging(verbosity: Verbosity) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.directives()));

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbosity != Verbosity::Normal)
                .with_file(false)
                .with_line_number(false),
        );

    // Already set when called twice; keep the first.
    let _ = subscriber.try_init();
}

/// Route crate warnings into the test harness output.
///
/// Store-backed tests call this so that tolerant row mapping and skipped
/// records show up next to the failing assertion.
#[cfg(test)]
pub(crate) fn init_test_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("fleetguard=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
