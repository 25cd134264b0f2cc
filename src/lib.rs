//! The fifo-poll-probe crate.
//!
//! Runs a fixed open/poll/read/close script against a named pipe and checks
//! that the poll readiness reported for its read end tracks writers opening
//! and closing the pipe.

#![deny(missing_docs)]

pub mod commands;
pub mod errno;
pub mod fifo;
pub mod poll_flags;
pub mod probe;
