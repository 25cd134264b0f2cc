//! The module that implements the `fifo-poll-probe run` command.

use crate::probe::{self, DEFAULT_PATH, ProbeConfig};
use anyhow::Result;
use clap::Parser;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

/// Exit status of a run that ends in `FAIL` when `--exit-code` is given.
pub const FAIL_EXIT_CODE: u8 = 2;

/// Creates the FIFO and runs the open/poll/read/close script against it.
#[derive(Parser)]
pub struct RunCommand {
    /// Location of the FIFO; anything already there is replaced.
    #[arg(long, value_name = "PATH", default_value = DEFAULT_PATH)]
    path: PathBuf,

    /// How long each poll of the read end may block, in milliseconds.
    #[arg(long, value_name = "MS", default_value_t = 1000)]
    timeout_ms: u64,

    /// Open the write end without O_NONBLOCK.
    #[arg(long)]
    blocking_writer: bool,

    /// Exit with a non-zero status when the verdict is FAIL.
    #[arg(long)]
    exit_code: bool,
}

impl RunCommand {
    /// Executes the command.
    pub fn execute(self) -> Result<ExitCode> {
        init_logging();

        let config = ProbeConfig {
            path: self.path,
            timeout: Duration::from_millis(self.timeout_ms),
            blocking_writer: self.blocking_writer,
        };
        tracing::debug!(?config, "starting probe");

        let report = probe::run(&config, io::stdout().lock())?;
        if self.exit_code && !report.passed() {
            return Ok(ExitCode::from(FAIL_EXIT_CODE));
        }
        Ok(ExitCode::SUCCESS)
    }
}

/// Sends `tracing` output to stderr, filtered by `FIFO_PROBE_LOG`.
///
/// With the variable unset only errors are logged, which keeps the trace on
/// stdout the only output of a normal run.
fn init_logging() {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};
    let b = FmtSubscriber::builder()
        .with_writer(io::stderr)
        .with_env_filter(EnvFilter::from_env("FIFO_PROBE_LOG"))
        .with_ansi(io::stderr().is_terminal());
    b.init();
}
