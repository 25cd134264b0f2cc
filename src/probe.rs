//! The scripted open/poll/read/close sequence run against a FIFO.
//!
//! A probe holds one non-blocking read end open for the whole run and cycles
//! a writer through it twice. After each transition the read end is polled
//! and the returned conditions are compared with what a correct platform
//! reports:
//!
//! | step | action                       | expected events   |
//! |------|------------------------------|-------------------|
//! | 0    | open read end                | none              |
//! | 1    | open writer, write `test 1`  | `POLLIN` set      |
//! | 2    | writer closed                | exactly `POLLHUP` |
//! | 3    | open writer, write `test 2`  | `POLLIN` set      |
//! | 4    | writer closed                | exactly `POLLHUP` |
//!
//! Mismatches and failed `open`/`read` calls are counted rather than
//! aborting the run, so every step is always traced. The count decides the
//! final `PASS`/`FAIL` verdict.

use crate::errno::OsError;
use crate::fifo;
use crate::poll_flags::{self, PollEvent};
use anyhow::{Context, Result};
use rustix::event::{PollFd, PollFlags, Timespec};
use rustix::fs::{Mode, OFlags};
use rustix::io::Errno;
use std::fmt;
use std::io::Write;
use std::os::fd::{AsRawFd, OwnedFd};
use std::path::PathBuf;
use std::time::Duration;

/// Where the FIFO is created unless configured otherwise.
pub const DEFAULT_PATH: &str = "/tmp/fifo-poll-probe/pipe";

/// How long each poll of the read end may block.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

const READ_CHUNK: usize = 1000;

const FIRST_PAYLOAD: &[u8] = b"test 1";
const SECOND_PAYLOAD: &[u8] = b"test 2";

/// Settings of a probe run.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Location of the FIFO.
    pub path: PathBuf,
    /// Timeout of every poll of the read end.
    pub timeout: Duration,
    /// Open the write end without `O_NONBLOCK`.
    pub blocking_writer: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_PATH),
            timeout: DEFAULT_TIMEOUT,
            blocking_writer: false,
        }
    }
}

/// Outcome of a probe run.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Report {
    /// Number of mismatched expectations and failed calls.
    pub errors: u32,
}

impl Report {
    /// Whether every expectation held.
    pub fn passed(&self) -> bool {
        self.errors == 0
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.passed() {
            write!(f, "PASS")
        } else {
            write!(f, "FAIL: got {} errors", self.errors)
        }
    }
}

/// Creates a fresh FIFO at `config.path` and probes it, writing the trace to
/// `out`.
///
/// Fails only if the FIFO can't be created, the read end can't be polled,
/// writing the payload fails, or `out` can't be written to.
pub fn run(config: &ProbeConfig, out: impl Write) -> Result<Report> {
    fifo::create(&config.path)?;
    Probe::new(config, out).run()
}

/// A single run of the probe script.
pub struct Probe<'a, W> {
    config: &'a ProbeConfig,
    out: W,
    reader: Option<OwnedFd>,
    errors: u32,
}

impl<'a, W: Write> Probe<'a, W> {
    /// Prepares a run against the FIFO at `config.path`, which must already
    /// exist for the run to pass.
    pub fn new(config: &'a ProbeConfig, out: W) -> Self {
        Self {
            config,
            out,
            reader: None,
            errors: 0,
        }
    }

    /// Runs all steps and prints the verdict.
    pub fn run(mut self) -> Result<Report> {
        self.open_reader()?;
        self.writer_cycle(1, FIRST_PAYLOAD)?;
        self.expect_hangup(2)?;
        self.writer_cycle(3, SECOND_PAYLOAD)?;
        self.expect_hangup(4)?;

        let report = Report {
            errors: self.errors,
        };
        writeln!(self.out, "{report}")?;
        self.out.flush()?;
        tracing::debug!(errors = report.errors, "probe finished");
        Ok(report)
    }

    /// Step 0: with no writer ever opened the read end must report nothing.
    fn open_reader(&mut self) -> Result<()> {
        if !fifo::is_fifo(&self.config.path) {
            tracing::warn!(path = %self.config.path.display(), "not a FIFO");
        }
        let shown = match self.open(0, OFlags::RDONLY | OFlags::NONBLOCK) {
            Ok(fd) => {
                let shown = fd.as_raw_fd().to_string();
                self.reader = Some(fd);
                shown
            }
            Err(e) => e.to_string(),
        };

        let events = self.poll()?;
        if !events.is_empty() {
            self.mismatch(0, "events reported before any writer opened");
        }

        writeln!(
            self.out,
            "0. open(r) = {} -> {shown}",
            self.config.path.display()
        )?;
        self.trace_poll_and_read(0, &events)
    }

    /// Steps 1 and 3: a writer with pending data makes the read end readable.
    fn writer_cycle(&mut self, step: u32, payload: &[u8]) -> Result<()> {
        let mut flags = OFlags::WRONLY;
        if !self.config.blocking_writer {
            flags |= OFlags::NONBLOCK;
        }

        let writer = self.open(step, flags);
        let shown = match &writer {
            Ok(fd) => {
                let written = rustix::io::write(fd, payload).with_context(|| {
                    format!("failed to write to {}", self.config.path.display())
                })?;
                tracing::debug!(step, written, "wrote payload");
                fd.as_raw_fd().to_string()
            }
            Err(e) => {
                self.mismatch(step, "no writer to feed the FIFO");
                e.to_string()
            }
        };

        let events = self.poll()?;
        if !first_revents(&events).contains(PollFlags::IN) {
            self.mismatch(step, "read end not readable with a writer open");
        }

        writeln!(
            self.out,
            "{step}. open(w) = {} -> {shown}",
            self.config.path.display()
        )?;
        self.trace_poll_and_read(step, &events)?;

        if let Ok(fd) = writer {
            tracing::debug!(step, fd = fd.as_raw_fd(), "closing writer");
            drop(fd);
        }
        Ok(())
    }

    /// Steps 2 and 4: once the last writer is gone only a hangup remains.
    fn expect_hangup(&mut self, step: u32) -> Result<()> {
        let events = self.poll()?;
        if first_revents(&events) != PollFlags::HUP {
            self.mismatch(step, "read end did not report exactly POLLHUP");
        }
        self.trace_poll_and_read(step, &events)
    }

    fn trace_poll_and_read(&mut self, step: u32, events: &[PollEvent]) -> Result<()> {
        writeln!(self.out, "{step}. poll    = {}", poll_flags::render(events))?;
        let read = self.read_for_display(step);
        writeln!(self.out, "{step}. read    = {read}")?;
        Ok(())
    }

    fn open(&mut self, step: u32, flags: OFlags) -> Result<OwnedFd, OsError> {
        match rustix::fs::open(&self.config.path, flags | OFlags::CLOEXEC, Mode::empty()) {
            Ok(fd) => {
                tracing::debug!(step, fd = fd.as_raw_fd(), ?flags, "opened FIFO");
                Ok(fd)
            }
            Err(errno) => {
                let err = OsError(errno);
                self.errors += 1;
                tracing::warn!(
                    step,
                    ?flags,
                    errno = err.name().unwrap_or("E?"),
                    code = err.code(),
                    "open failed"
                );
                Err(err)
            }
        }
    }

    /// Polls the read end once for readable, priority and hangup conditions.
    ///
    /// Only a descriptor with non-empty returned events appears in the
    /// result. Without a read end there is nothing to poll and the result is
    /// empty.
    fn poll(&self) -> Result<Vec<PollEvent>> {
        let Some(reader) = &self.reader else {
            return Ok(Vec::new());
        };

        let timeout = Timespec {
            tv_sec: self.config.timeout.as_secs() as _,
            tv_nsec: self.config.timeout.subsec_nanos() as _,
        };
        let mut fds = [PollFd::new(
            reader,
            PollFlags::IN | PollFlags::PRI | PollFlags::HUP,
        )];
        let ready = loop {
            match rustix::event::poll(&mut fds, Some(&timeout)) {
                Ok(ready) => break ready,
                Err(errno) if errno == Errno::INTR => continue,
                Err(errno) => {
                    return Err(errno).with_context(|| {
                        format!("failed to poll {}", self.config.path.display())
                    });
                }
            }
        };

        let revents = fds[0].revents();
        tracing::debug!(ready, ?revents, "polled read end");
        if revents.is_empty() {
            Ok(Vec::new())
        } else {
            Ok(vec![PollEvent {
                fd: reader.as_raw_fd(),
                revents,
            }])
        }
    }

    /// Reads whatever is pending on the read end; the outcome is only shown,
    /// though a failed read still counts as an error.
    fn read_for_display(&mut self, step: u32) -> String {
        let mut buf = [0u8; READ_CHUNK];
        let result = match &self.reader {
            Some(fd) => rustix::io::read(fd, &mut buf[..]),
            None => Err(Errno::BADF),
        };
        match result {
            Ok(n) => {
                tracing::debug!(step, n, "read from FIFO");
                bytes_repr(&buf[..n])
            }
            Err(errno) => {
                let err = OsError(errno);
                self.errors += 1;
                tracing::warn!(
                    step,
                    errno = err.name().unwrap_or("E?"),
                    code = err.code(),
                    "read failed"
                );
                err.to_string()
            }
        }
    }

    fn mismatch(&mut self, step: u32, what: &str) {
        self.errors += 1;
        tracing::warn!(step, "{what}");
    }
}

fn first_revents(events: &[PollEvent]) -> PollFlags {
    events
        .first()
        .map_or(PollFlags::empty(), |event| event.revents)
}

/// Renders bytes as an escaped `b'...'` literal.
pub fn bytes_repr(bytes: &[u8]) -> String {
    let mut repr = String::from("b'");
    for &byte in bytes {
        repr.extend(std::ascii::escape_default(byte).map(char::from));
    }
    repr.push('\'');
    repr
}
