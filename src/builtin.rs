use std::env;
use std::error::Error;
use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::execution::describe;

#[derive(Debug, PartialEq, Eq)]
pub enum Builtin<'a> {
    Exit,
    Cd(Option<&'a str>),
}

/// Recognizes a built-in by the first token of a line.
pub fn match_builtin(tokens: &[String]) -> Option<Builtin<'_>> {
    match tokens.first().map(String::as_str) {
        Some("exit") => Some(Builtin::Exit),
        Some("cd") => Some(Builtin::Cd(tokens.get(1).map(String::as_str))),
        _ => None,
    }
}

#[derive(Debug)]
pub enum CdError {
    NoHome,
    Io(PathBuf, io::Error),
}

impl fmt::Display for CdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CdError::NoHome => write!(f, "HOME not set"),
            CdError::Io(path, e) => match e.raw_os_error() {
                Some(errno) => write!(f, "{}: {}", path.display(), describe(errno)),
                None => write!(f, "{}: {}", path.display(), e),
            },
        }
    }
}

impl Error for CdError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CdError::NoHome => None,
            CdError::Io(_, e) => Some(e),
        }
    }
}

/// Changes the working directory to `target`, or to `$HOME` without one.
pub fn change_dir(target: Option<&str>) -> Result<PathBuf, CdError> {
    let path = match target {
        Some(path) => PathBuf::from(path),
        None => env::var_os("HOME").map(PathBuf::from).ok_or(CdError::NoHome)?,
    };

    env::set_current_dir(&path).map_err(|e| CdError::Io(path.clone(), e))?;

    Ok(path)
}
