//! The module that implements the `fifo-poll-probe flags` command.

use crate::poll_flags;
use anyhow::Result;
use clap::Parser;
use std::io::{self, Write};
use std::process::ExitCode;

/// Displays the poll conditions the probe decodes on this platform.
#[derive(Parser)]
pub struct FlagsCommand {}

impl FlagsCommand {
    /// Executes the command.
    pub fn execute(self) -> Result<ExitCode> {
        let table = poll_flags::table();
        let width = table.iter().map(|(name, _)| name.len()).max().unwrap_or(0);

        let mut out = io::stdout().lock();
        writeln!(out, "Poll conditions:")?;
        for (name, flag) in table {
            writeln!(out, "  {name:width$} {:#06x}", flag.bits())?;
        }
        out.flush()?;
        Ok(ExitCode::SUCCESS)
    }
}
