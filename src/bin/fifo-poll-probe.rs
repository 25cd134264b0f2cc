//! The `fifo-poll-probe` command line tool.
//!
//! Checks that poll readiness of a FIFO's read end follows writers opening
//! and closing it. See `fifo-poll-probe --help` for usage.

use anyhow::{Context as _, Result};
use clap::Parser;
use std::io;
use std::process::ExitCode;

/// FIFO poll readiness probe
#[derive(Parser)]
#[command(
    name = "fifo-poll-probe",
    version,
    after_help = "If a subcommand is not provided, the `run` subcommand will be used.\n\
                  \n\
                  The probe prints one block per step and ends with PASS or\n\
                  FAIL: got N errors. The verdict does not change the exit\n\
                  status unless --exit-code is given.",

    // As with a bare invocation, flags given without a subcommand belong to
    // `run`.
    args_conflicts_with_subcommands = true
)]
struct FifoPollProbe {
    #[command(subcommand)]
    subcommand: Option<Subcommand>,
    #[command(flatten)]
    run: fifo_poll_probe::commands::RunCommand,
}

#[derive(Parser)]
enum Subcommand {
    /// Creates the FIFO and runs the probe script against it
    Run(fifo_poll_probe::commands::RunCommand),

    /// Displays the poll conditions decoded on this platform
    Flags(fifo_poll_probe::commands::FlagsCommand),
}

impl FifoPollProbe {
    /// Executes the command.
    pub fn execute(self) -> Result<ExitCode> {
        let subcommand = self.subcommand.unwrap_or(Subcommand::Run(self.run));
        match subcommand {
            Subcommand::Run(c) => c.execute(),
            Subcommand::Flags(c) => c.execute(),
        }
    }
}

/// Whether `err` comes from stdout being closed underneath us.
fn is_broken_pipe(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<io::Error>()
            .is_some_and(|e| e.kind() == io::ErrorKind::BrokenPipe)
    })
}

/// Exit status of a run cut short by broken stdout or an interrupt.
const ABORT_EXIT_CODE: u8 = 1;

fn main() -> Result<ExitCode> {
    let cli = FifoPollProbe::parse();

    // An interrupt ends the run quietly, with the same status as a broken
    // stdout.
    ctrlc::set_handler(|| {
        std::process::exit(ABORT_EXIT_CODE.into());
    })
    .context("failed to install interrupt handler")?;

    match cli.execute() {
        Err(e) if is_broken_pipe(&e) => Ok(ExitCode::from(ABORT_EXIT_CODE)),
        result => result,
    }
}

#[test]
fn verify_cli() {
    use clap::CommandFactory;
    FifoPollProbe::command().debug_assert()
}
