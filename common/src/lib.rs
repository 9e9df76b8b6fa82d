//! Common utilities and types shared by the rxfer tools
//!
//! This crate holds the ambient pieces every binary and library in the workspace needs:
//!
//! - [`config`]: resolved runtime/output settings and the layered [`TransferSettings`] merge
//! - [`run`]: builds the tokio runtime, installs logging, runs the tool and reports the outcome
//!
//! # Logging
//!
//! Logs are written to stderr through `tracing-subscriber`. The `-v` count maps to a level:
//! 0 = ERROR, 1 = INFO, 2 = DEBUG, 3+ = TRACE. `RUST_LOG`, when set, takes precedence.
//! Stdout is left alone so tools can stream file content to it.

use tracing::instrument;

pub mod config;

pub use config::{
    Encoding, OutputConfig, RuntimeConfig, TransferOverrides, TransferSettings,
    DEFAULT_BUFFER_SIZE,
};

fn level_for(verbose: u8) -> tracing::Level {
    match verbose {
        0 => tracing::Level::ERROR,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    }
}

fn init_tracing(output: &OutputConfig) {
    let default_directive = if output.quiet {
        "off".to_string()
    } else {
        level_for(output.verbose).to_string().to_lowercase()
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    // a subscriber may already be installed (e.g. by a test harness)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn build_runtime(runtime: &RuntimeConfig) -> anyhow::Result<tokio::runtime::Runtime> {
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if runtime.max_workers > 0 {
        builder.worker_threads(runtime.max_workers);
    }
    if runtime.max_blocking_threads > 0 {
        builder.max_blocking_threads(runtime.max_blocking_threads);
    }
    Ok(builder.build()?)
}

/// Runs `func` on a fresh tokio runtime and reports its outcome.
///
/// Returns `None` if the runtime could not be built or `func` failed; the error has already been
/// logged (unless `quiet`). On success the summary is printed when `print_summary` is set or
/// verbosity is non-zero.
#[instrument(skip(func))]
pub fn run<Fut, Summary>(
    output: OutputConfig,
    runtime: RuntimeConfig,
    func: impl FnOnce() -> Fut,
) -> Option<Summary>
where
    Summary: std::fmt::Display,
    Fut: std::future::Future<Output = anyhow::Result<Summary>>,
{
    init_tracing(&output);
    let runtime = match build_runtime(&runtime) {
        Ok(runtime) => runtime,
        Err(error) => {
            if !output.quiet {
                eprintln!("failed to start runtime: {error:#}");
            }
            return None;
        }
    };
    match runtime.block_on(func()) {
        Ok(summary) => {
            if output.print_summary || output.verbose > 0 {
                eprintln!("{summary}");
            }
            Some(summary)
        }
        Err(error) => {
            tracing::error!("{:#}", &error);
            if !output.quiet {
                eprintln!("{error:#}");
            }
            None
        }
    }
}
