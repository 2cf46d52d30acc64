use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging for the grepl CLI
///
/// Logs go to stderr so that they never mix with call results on stdout.
///
/// The log level can be controlled via the RUST_LOG environment variable:
/// - RUST_LOG=debug grepl list services  (verbose logging)
/// - RUST_LOG=info grepl list services   (default level)
///
/// `verbose` raises the default level to debug when RUST_LOG is not set.
pub fn init(verbose: bool) -> Result<()> {
    let default_filter = if verbose {
        "grepl=debug,grepl_core=debug"
    } else {
        "grepl=info,grepl_core=info"
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    Ok(())
}
