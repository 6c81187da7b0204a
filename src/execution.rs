use std::error::Error;
use std::ffi::{CStr, CString, NulError};
use std::fmt;
use std::io::{self, Write};
use std::ptr::null;

use libc::{
    __errno_location, c_char, c_int, execvp, mode_t, pid_t, strerror, waitpid, O_APPEND,
    O_CREAT, O_RDONLY, O_TRUNC, O_WRONLY, STDIN_FILENO, STDOUT_FILENO,
};
use log::debug;

use crate::fd::Fd;
use crate::scanner::{OutputMode, Redirection};
use crate::sig::{self, SigError};

/// Child exit status when a redirection target cannot be opened.
pub const REDIRECT_FAILURE: c_int = 1;

/// Child exit status when the program cannot be executed.
pub const EXEC_FAILURE: c_int = 127;

const CREATE_MODE: mode_t = 0o644;

pub(crate) fn errno() -> c_int {
    unsafe { *__errno_location() }
}

/// The `strerror` text for `errno`.
pub(crate) fn describe(errno: c_int) -> String {
    unsafe { CStr::from_ptr(strerror(errno)) }
        .to_string_lossy()
        .into_owned()
}

#[derive(Debug)]
pub enum ExecutionError {
    Syscall { call: &'static str, errno: c_int },
    EmptyCommand,
    InvalidArgument(NulError),
}

impl ExecutionError {
    /// Captures the current `errno` for a failed `call`.
    pub(crate) fn syscall(call: &'static str) -> Self {
        ExecutionError::Syscall {
            call,
            errno: errno(),
        }
    }

    pub fn errno(&self) -> Option<c_int> {
        match self {
            ExecutionError::Syscall { errno, .. } => Some(*errno),
            _ => None,
        }
    }
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionError::Syscall { call, errno } => write!(f, "{}: {}", call, describe(*errno)),
            ExecutionError::EmptyCommand => write!(f, "missing command"),
            ExecutionError::InvalidArgument(e) => write!(f, "invalid argument: {}", e),
        }
    }
}

impl Error for ExecutionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ExecutionError::InvalidArgument(e) => Some(e),
            _ => None,
        }
    }
}

impl From<NulError> for ExecutionError {
    fn from(e: NulError) -> Self {
        ExecutionError::InvalidArgument(e)
    }
}

impl From<SigError> for ExecutionError {
    fn from(e: SigError) -> Self {
        match e {
            SigError::Syscall(errno) => ExecutionError::Syscall {
                call: "sigprocmask",
                errno,
            },
        }
    }
}

/// A program name and its arguments, ready to be handed to `execvp`.
///
/// Everything the child needs is allocated here, before `fork`, so the child
/// only makes system calls between `fork` and the image replacement.
#[derive(Debug)]
pub struct ArgVec {
    args: Vec<CString>,
    ptrs: Vec<*const c_char>,
    context: CString,
}

impl ArgVec {
    pub fn new(args: &[String]) -> Result<ArgVec, ExecutionError> {
        if args.is_empty() {
            return Err(ExecutionError::EmptyCommand);
        }

        let args = args
            .iter()
            .map(|arg| CString::new(arg.as_str()))
            .collect::<Result<Vec<_>, _>>()?;

        // the CString buffers live on the heap, moving `args` keeps them in place
        let mut ptrs: Vec<*const c_char> = args.iter().map(|arg| arg.as_ptr()).collect();
        ptrs.push(null());

        let context = CString::new(format!("mysh: {}", args[0].to_string_lossy()))?;

        Ok(ArgVec {
            args,
            ptrs,
            context,
        })
    }

    pub fn program(&self) -> &CStr {
        &self.args[0]
    }

    /// Replaces the process image, reporting and exiting if that fails.
    pub(crate) fn exec(&self) -> ! {
        unsafe { execvp(self.ptrs[0], self.ptrs.as_ptr()) };
        die(&self.context, EXEC_FAILURE)
    }

    pub(crate) fn context(&self) -> &CStr {
        &self.context
    }
}

/// Prints `context: <reason>` for the current `errno` and leaves the child.
pub(crate) fn die(context: &CStr, status: c_int) -> ! {
    unsafe {
        libc::perror(context.as_ptr());
        libc::_exit(status)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Exited(c_int),
    Signaled(c_int),
    /// The status was collected by the SIGCHLD handler before we got to it.
    Collected,
}

impl Status {
    fn from_raw(status: c_int) -> Status {
        if libc::WIFSIGNALED(status) {
            Status::Signaled(libc::WTERMSIG(status))
        } else {
            Status::Exited(libc::WEXITSTATUS(status))
        }
    }

    pub fn success(&self) -> bool {
        *self == Status::Exited(0)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Exited(code) => write!(f, "exit status {}", code),
            Status::Signaled(signo) => write!(f, "killed by signal {}", signo),
            Status::Collected => write!(f, "status collected asynchronously"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Foreground(Status),
    Background(pid_t),
}

pub(crate) enum Fork {
    Child,
    Parent(pid_t),
}

pub(crate) fn fork() -> Result<Fork, ExecutionError> {
    match unsafe { libc::fork() } {
        -1 => Err(ExecutionError::syscall("fork")),
        0 => Ok(Fork::Child),
        pid => Ok(Fork::Parent(pid)),
    }
}

/// Blocks until `pid` terminates.
pub(crate) fn wait_foreground(pid: pid_t) -> Result<Status, ExecutionError> {
    let mut status: c_int = 0;

    loop {
        if unsafe { waitpid(pid, &mut status, 0) } != -1 {
            return Ok(Status::from_raw(status));
        }

        match errno() {
            libc::EINTR => continue,
            libc::ECHILD => return Ok(Status::Collected),
            errno => {
                return Err(ExecutionError::Syscall {
                    call: "waitpid",
                    errno,
                })
            }
        }
    }
}

/// A redirection target opened by the child.
struct Target {
    path: CString,
    flags: c_int,
    context: CString,
}

impl Target {
    fn new(path: &str, flags: c_int) -> Result<Target, ExecutionError> {
        Ok(Target {
            path: CString::new(path)?,
            flags,
            context: CString::new(format!("mysh: {}", path))?,
        })
    }

    fn output(path: &str, mode: OutputMode) -> Result<Target, ExecutionError> {
        let flags = match mode {
            OutputMode::Truncate => O_WRONLY | O_CREAT | O_TRUNC,
            OutputMode::Append => O_WRONLY | O_CREAT | O_APPEND,
        };

        Target::new(path, flags)
    }

    fn attach(&self, slot: c_int) {
        let fd = match Fd::open(&self.path, self.flags, CREATE_MODE) {
            Ok(fd) => fd,
            Err(_) => die(&self.context, REDIRECT_FAILURE),
        };

        if fd.dup_onto(slot).is_err() {
            die(&self.context, REDIRECT_FAILURE);
        }
    }
}

fn exec_child(argv: &ArgVec, input: Option<&Target>, output: Option<&Target>) -> ! {
    if let Some(target) = input {
        target.attach(STDIN_FILENO);
    }

    if let Some(target) = output {
        target.attach(STDOUT_FILENO);
    }

    argv.exec()
}

/// Runs one command with optional redirections.
///
/// In the foreground the call returns once the child terminated. In the
/// background the new pid is printed and returned right away, leaving the
/// child to the SIGCHLD handler.
pub fn execute(
    args: &[String],
    redirection: &Redirection,
    background: bool,
) -> Result<Outcome, ExecutionError> {
    let argv = ArgVec::new(args)?;
    let input = match &redirection.input {
        Some(path) => Some(Target::new(path, O_RDONLY)?),
        None => None,
    };
    let output = match &redirection.output {
        Some(path) => Some(Target::output(path, redirection.mode)?),
        None => None,
    };

    let mask = sig::mask_sigchld()?;

    let pid = match fork()? {
        Fork::Child => {
            sig::prepare_child(&mask);
            exec_child(&argv, input.as_ref(), output.as_ref())
        }
        Fork::Parent(pid) => pid,
    };
    debug!("spawned {:?} as pid {}", argv.program(), pid);

    if background {
        let _ = writeln!(io::stdout(), "[{}] running in background", pid);
        return Ok(Outcome::Background(pid));
    }

    let status = wait_foreground(pid)?;
    debug!("pid {} finished with {}", pid, status);
    drop(mask);

    Ok(Outcome::Foreground(status))
}
