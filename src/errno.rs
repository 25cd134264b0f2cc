//! Rendering of OS error codes for the probe trace.
//!
//! Failed `open` and `read` calls are not fatal to a probe run; they are shown
//! in the trace as `errno NAME(N): message`.

use rustix::io::Errno;
use std::io;
use thiserror::Error;

/// An OS-level failure of a call the probe tolerates.
#[derive(Debug, Copy, Clone, Error, PartialEq, Eq)]
#[error("errno {}({}): {}", name_of(.0), code_of(.0), message_of(.0))]
pub struct OsError(pub Errno);

impl OsError {
    /// The raw errno value.
    pub fn code(&self) -> i32 {
        self.0.raw_os_error()
    }

    /// The symbolic name of the errno value, if it is a known one.
    pub fn name(&self) -> Option<&'static str> {
        errno_name(self.code())
    }
}

impl From<Errno> for OsError {
    fn from(errno: Errno) -> Self {
        Self(errno)
    }
}

fn name_of(errno: &Errno) -> &'static str {
    errno_name(errno.raw_os_error()).unwrap_or("E?")
}

fn code_of(errno: &Errno) -> i32 {
    errno.raw_os_error()
}

fn message_of(errno: &Errno) -> String {
    strerror(errno.raw_os_error())
}

/// Returns the platform's description of `code`, without the
/// ` (os error N)` suffix std appends.
pub fn strerror(code: i32) -> String {
    let text = io::Error::from_raw_os_error(code).to_string();
    match text.strip_suffix(&format!(" (os error {code})")) {
        Some(message) => message.to_owned(),
        None => text,
    }
}

macro_rules! errno_names {
    ($func:ident: $($name:ident)*) => {
        fn $func(code: i32) -> Option<&'static str> {
            match code {
                $(libc::$name => Some(stringify!($name)),)*
                _ => None,
            }
        }
    };
}

// Aliases such as EWOULDBLOCK and EDEADLOCK are left out; they share a value
// with EAGAIN and EDEADLK on the platforms we run on.
errno_names! {
    portable_errno_name:
    EPERM ENOENT ESRCH EINTR EIO ENXIO E2BIG ENOEXEC EBADF ECHILD EAGAIN
    ENOMEM EACCES EFAULT EBUSY EEXIST EXDEV ENODEV ENOTDIR EISDIR EINVAL
    ENFILE EMFILE ENOTTY ETXTBSY EFBIG ENOSPC ESPIPE EROFS EMLINK EPIPE EDOM
    ERANGE EDEADLK ENAMETOOLONG ENOLCK ENOSYS ENOTEMPTY ELOOP ENOMSG EIDRM
    ENOLINK EPROTO EMULTIHOP EBADMSG EOVERFLOW EILSEQ ENOTSOCK EDESTADDRREQ
    EMSGSIZE EPROTOTYPE ENOPROTOOPT EPROTONOSUPPORT EAFNOSUPPORT EADDRINUSE
    EADDRNOTAVAIL ENETDOWN ENETUNREACH ENETRESET ECONNABORTED ECONNRESET
    ENOBUFS EISCONN ENOTCONN ETIMEDOUT ECONNREFUSED EHOSTUNREACH EALREADY
    EINPROGRESS ESTALE EDQUOT ECANCELED EOWNERDEAD ENOTRECOVERABLE
}

#[cfg(target_os = "linux")]
errno_names! {
    linux_errno_name:
    ENOTBLK ECHRNG EL2NSYNC EL3HLT EL3RST ELNRNG EUNATCH ENOCSI EL2HLT EBADE
    EBADR EXFULL ENOANO EBADRQC EBADSLT EBFONT ENOSTR ENODATA ETIME ENOSR
    ENONET ENOPKG EREMOTE EADV ESRMNT ECOMM EDOTDOT ENOTUNIQ EBADFD EREMCHG
    ELIBACC ELIBBAD ELIBSCN ELIBMAX ELIBEXEC ERESTART ESTRPIPE EUSERS
    ESOCKTNOSUPPORT EOPNOTSUPP EPFNOSUPPORT ESHUTDOWN ETOOMANYREFS EHOSTDOWN
    EUCLEAN ENOTNAM ENAVAIL EISNAM EREMOTEIO ENOMEDIUM EMEDIUMTYPE ENOKEY
    EKEYEXPIRED EKEYREVOKED EKEYREJECTED ERFKILL
}

/// Maps a raw errno value to its symbolic name.
pub fn errno_name(code: i32) -> Option<&'static str> {
    let name = portable_errno_name(code);
    #[cfg(target_os = "linux")]
    let name = name.or_else(|| linux_errno_name(code));
    name
}
