use std::ffi::CStr;
use std::mem;

use libc::{c_int, close, dup2, fcntl, mode_t, open, pipe2, F_SETFD, O_CLOEXEC};

use crate::execution::ExecutionError;

/// An open descriptor with exactly one owner. Dropping it closes it.
#[derive(Debug)]
pub struct Fd(c_int);

impl Fd {
    pub fn open(path: &CStr, flags: c_int, mode: mode_t) -> Result<Fd, ExecutionError> {
        match unsafe { open(path.as_ptr(), flags, mode) } {
            -1 => Err(ExecutionError::syscall("open")),
            fd => Ok(Fd(fd)),
        }
    }

    pub fn as_raw(&self) -> c_int {
        self.0
    }

    /// Makes `slot` refer to this descriptor's file and releases the original.
    pub fn dup_onto(self, slot: c_int) -> Result<(), ExecutionError> {
        if self.0 == slot {
            // already in place; closing it would undo the redirection, but
            // a close-on-exec flag from `pipe2` would drop it at exec
            let fd = self.0;
            mem::forget(self);

            return match unsafe { fcntl(fd, F_SETFD, 0) } {
                -1 => Err(ExecutionError::syscall("fcntl")),
                _ => Ok(()),
            };
        }

        match unsafe { dup2(self.0, slot) } {
            -1 => Err(ExecutionError::syscall("dup2")),
            _ => self.close(),
        }
    }

    /// Closes the descriptor, reporting a failing close.
    pub fn close(self) -> Result<(), ExecutionError> {
        let fd = self.0;
        mem::forget(self);

        match unsafe { close(fd) } {
            -1 => Err(ExecutionError::syscall("close")),
            _ => Ok(()),
        }
    }
}

impl Drop for Fd {
    fn drop(&mut self) {
        unsafe { close(self.0) };
    }
}

/// Both endpoints of an anonymous pipe.
///
/// The endpoints are close-on-exec, so a process image started by an
/// unrelated fork never inherits them. Duplicates made with `dup2` do not
/// carry the flag.
#[derive(Debug)]
pub struct Pipe {
    pub read: Fd,
    pub write: Fd,
}

impl Pipe {
    pub fn new() -> Result<Pipe, ExecutionError> {
        let mut filedes: [c_int; 2] = [-1, -1];

        match unsafe { pipe2(filedes.as_mut_ptr(), O_CLOEXEC) } {
            -1 => Err(ExecutionError::syscall("pipe")),
            _ => Ok(Pipe {
                read: Fd(filedes[0]),
                write: Fd(filedes[1]),
            }),
        }
    }

    /// Closes both endpoints. Both are closed even if the first close fails.
    pub fn close(self) -> Result<(), ExecutionError> {
        let read = self.read.close();
        let write = self.write.close();

        read.and(write)
    }
}
