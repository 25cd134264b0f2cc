//! Decoding of poll readiness masks into `POLL*` names.

use rustix::event::PollFlags;
use std::os::fd::RawFd;
use std::sync::OnceLock;

/// One entry of a poll result: a descriptor with non-empty returned events.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PollEvent {
    /// The polled descriptor.
    pub fd: RawFd,
    /// The conditions `poll` reported for it.
    pub revents: PollFlags,
}

/// Returns every `POLL*` condition of the platform poll API, sorted by bit
/// value.
///
/// The `POLLRD*` variants are left out: they alias `POLLIN` on most
/// platforms and only add noise to the trace.
pub fn table() -> &'static [(&'static str, PollFlags)] {
    // Neither libc nor rustix export POLLMSG; this is the asm-generic value.
    #[cfg(all(target_os = "linux", not(any(target_arch = "sparc", target_arch = "sparc64"))))]
    const POLLMSG: PollFlags = PollFlags::from_bits_retain(0x400);

    static TABLE: OnceLock<Vec<(&'static str, PollFlags)>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = vec![
            ("POLLIN", PollFlags::IN),
            ("POLLPRI", PollFlags::PRI),
            ("POLLOUT", PollFlags::OUT),
            ("POLLERR", PollFlags::ERR),
            ("POLLHUP", PollFlags::HUP),
            ("POLLNVAL", PollFlags::NVAL),
            ("POLLWRNORM", PollFlags::WRNORM),
            ("POLLWRBAND", PollFlags::WRBAND),
        ];
        #[cfg(all(target_os = "linux", not(any(target_arch = "sparc", target_arch = "sparc64"))))]
        table.push(("POLLMSG", POLLMSG));
        table.sort_by_key(|(_, flag)| flag.bits());
        table
    })
}

/// Renders `mask` as `NAME(0xNN)|NAME(0xNN)...` for each set condition.
pub fn describe(mask: PollFlags) -> String {
    table()
        .iter()
        .filter(|(_, flag)| mask.intersects(*flag))
        .map(|(name, flag)| format!("{name}({:#x})", flag.bits()))
        .collect::<Vec<_>>()
        .join("|")
}

/// Renders a poll result, one `fd: flags` line per entry, or `<empty>`.
pub fn render(events: &[PollEvent]) -> String {
    if events.is_empty() {
        return "<empty>".to_string();
    }
    events
        .iter()
        .map(|event| format!("{}: {}", event.fd, describe(event.revents)))
        .collect::<Vec<_>>()
        .join("\n")
}
