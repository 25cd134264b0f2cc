//! The module for the fifo-poll-probe CLI commands.

mod flags;
mod run;

pub use self::{flags::*, run::*};
