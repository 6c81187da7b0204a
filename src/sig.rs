// https://github.com/vorner/signal-hook/blob/master/signal-hook-registry/src/lib.rs

use std::error::Error;
use std::ffi::CStr;
use std::fmt;
use std::mem::MaybeUninit;
use std::ptr::null_mut;

use libc::{
    __errno_location, c_int, c_void, sigaction, sigaddset, sigemptyset, sighandler_t, siginfo_t,
    sigprocmask, sigset_t, strerror, waitpid, WNOHANG,
};

#[derive(Debug, PartialEq)]
pub enum SigError {
    Syscall(c_int),
}

impl fmt::Display for SigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self {
            SigError::Syscall(error_num) => write!(
                f,
                "{}",
                unsafe { CStr::from_ptr(strerror(*error_num)) }.to_string_lossy()
            ),
        }
    }
}

impl Error for SigError {}

/// SIGCHLD handler: collects every terminated child without blocking.
///
/// Notifications may be coalesced, so one invocation drains all of them.
/// Only async-signal-safe calls are made here.
pub extern "C" fn reap(_sig: c_int, _info: *mut siginfo_t, _gdata: *mut c_void) {
    let saved = unsafe { *__errno_location() };

    while unsafe { waitpid(-1, null_mut(), WNOHANG) } > 0 {}

    // waitpid leaves ECHILD behind, the interrupted code must not see it
    unsafe { *__errno_location() = saved };
}

pub(crate) fn install_sighandler(
    signum: c_int,
    handler: extern "C" fn(c_int, *mut siginfo_t, *mut c_void),
) -> Result<(), SigError> {
    let mut sa = unsafe { MaybeUninit::<sigaction>::zeroed().assume_init() };
    sa.sa_flags = libc::SA_NOCLDSTOP | libc::SA_SIGINFO | libc::SA_RESTART;
    sa.sa_sigaction = handler as sighandler_t;
    unsafe { sigemptyset(&mut sa.sa_mask as *mut _) };

    match unsafe { libc::sigaction(signum, &sa, null_mut()) } {
        -1 => Err(SigError::Syscall(unsafe { *__errno_location() })),
        _ => Ok(()),
    }
}

/// Arms the reaper for the rest of the process lifetime.
pub fn install_reaper() -> Result<(), SigError> {
    install_sighandler(libc::SIGCHLD, reap)
}

/// SIGCHLD stays blocked for the calling thread while this is alive.
///
/// Dropping it restores the mask that was in place before.
pub struct SigMask {
    previous: sigset_t,
}

impl SigMask {
    pub fn restore(&self) -> Result<(), SigError> {
        match unsafe { sigprocmask(libc::SIG_SETMASK, &self.previous, null_mut()) } {
            -1 => Err(SigError::Syscall(unsafe { *__errno_location() })),
            _ => Ok(()),
        }
    }
}

impl Drop for SigMask {
    fn drop(&mut self) {
        let _ = self.restore();
    }
}

pub fn mask_sigchld() -> Result<SigMask, SigError> {
    let mut chld_set = unsafe { MaybeUninit::<sigset_t>::zeroed().assume_init() };
    let mut previous = unsafe { MaybeUninit::<sigset_t>::zeroed().assume_init() };

    unsafe { sigemptyset(&mut chld_set as *mut _) };
    unsafe { sigaddset(&mut chld_set as *mut _, libc::SIGCHLD) };

    match unsafe { sigprocmask(libc::SIG_BLOCK, &chld_set, &mut previous) } {
        -1 => Err(SigError::Syscall(unsafe { *__errno_location() })),
        _ => Ok(SigMask { previous }),
    }
}

/// Undoes the shell's signal setup in a freshly forked child before exec.
///
/// The blocked mask survives exec, and so does an ignored SIGPIPE, which the
/// Rust runtime installs for the shell itself.
pub(crate) fn prepare_child(mask: &SigMask) {
    let _ = mask.restore();
    unsafe { libc::signal(libc::SIGPIPE, libc::SIG_DFL) };
}
