//! Tracing setup for the CLI.

use std::io::IsTerminal;

use anyhow::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Logs go to stderr so command output on stdout stays clean.
///
/// `RUST_LOG` wins when set; otherwise the filter follows `-v`/`-q`.
pub fn init_logging(verbosity: u8, quiet: bool) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter(verbosity, quiet)))?;

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbosity > 1)
        .with_ansi(std::io::stderr().is_terminal());

    let subscriber = tracing_subscriber::registry().with(env_filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn default_filter(verbosity: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbosity {
        0 => "warn",
        1 => "pmfs=info,pmfs_core=info,warn",
        2 => "pmfs=debug,pmfs_core=debug,info",
        _ => "pmfs=trace,pmfs_core=trace,debug",
    }
}
