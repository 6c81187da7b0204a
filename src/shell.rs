use std::error::Error;
use std::fmt::Display;
use std::io::{self, Write};

use log::{debug, info, warn};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::builtin::{change_dir, match_builtin, Builtin};
use crate::config::Config;
use crate::execution::{self, Outcome};
use crate::parser::tokenize;
use crate::pipeline;
use crate::scanner::{scan, CommandLine};

const ANSI_COLOR_YELLOW: &str = "\x1b[33m";
const ANSI_COLOR_RESET: &str = "\x1b[0m";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

fn report(context: &str, e: &dyn Display) {
    let _ = writeln!(io::stderr(), "mysh: {}{}", context, e);
}

fn farewell() {
    let _ = writeln!(io::stdout(), "Exiting mysh...");
}

/// Cuts `line` down to at most `limit` characters.
fn clip(line: &str, limit: usize) -> &str {
    match line.char_indices().nth(limit) {
        Some((end, _)) => {
            warn!("line longer than {} characters, truncating", limit);
            &line[..end]
        }
        None => line,
    }
}

pub struct Shell {
    config: Config,
}

impl Shell {
    pub fn new(config: Config) -> Shell {
        Shell { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Interprets one input line. Failures are reported and never end the session.
    pub fn execute_line(&mut self, line: &str) -> Flow {
        let line = clip(line, self.config.usable_line());
        let tokens = tokenize(line, self.config.usable_args());
        if tokens.is_empty() {
            return Flow::Continue;
        }

        match match_builtin(&tokens) {
            Some(Builtin::Exit) => {
                farewell();
                return Flow::Exit;
            }
            Some(Builtin::Cd(target)) => {
                match change_dir(target) {
                    Ok(path) => debug!("changed directory to {}", path.display()),
                    Err(e) => report("cd: ", &e),
                }
                return Flow::Continue;
            }
            None => {}
        }

        match scan(tokens) {
            CommandLine::Pipeline { left, right } => match pipeline::execute(&left, &right) {
                Ok((left_status, right_status)) => {
                    debug!("pipeline: {}, {}", left_status, right_status)
                }
                Err(e) => report("", &e),
            },
            CommandLine::Simple {
                argv,
                redirection,
                background,
            } => match execution::execute(&argv, &redirection, background) {
                Ok(Outcome::Foreground(status)) => debug!("{}: {}", argv[0], status),
                Ok(Outcome::Background(pid)) => info!("{} running in background as {}", argv[0], pid),
                Err(e) => report("", &e),
            },
        }

        Flow::Continue
    }

    /// Prompts for lines until `exit` or end of input.
    pub fn run(&mut self) -> Result<(), Box<dyn Error>> {
        let mut editor = DefaultEditor::new()?;
        let prompt = format!(
            "{}{}{}",
            ANSI_COLOR_YELLOW, self.config.prompt, ANSI_COLOR_RESET
        );

        loop {
            match editor.readline(&prompt) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        let _ = editor.add_history_entry(line.as_str());
                    }
                    if self.execute_line(&line) == Flow::Exit {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Io(e)) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(ReadlineError::Eof) => {
                    farewell();
                    break;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;

    use super::{clip, Flow, Shell};
    use crate::config::Config;
    use crate::testing;

    fn shell() -> Shell {
        Shell::new(Config::default())
    }

    #[test]
    fn test_clip() {
        assert_eq!(clip("abcdef", 3), "abc");
        assert_eq!(clip("abc", 3), "abc");
        assert_eq!(clip("äöüß", 2), "äö");
        assert_eq!(clip("", 79), "");
    }

    #[test]
    fn test_empty_line_and_exit() {
        let mut shell = shell();

        assert_eq!(shell.execute_line(""), Flow::Continue);
        assert_eq!(shell.execute_line("   \t "), Flow::Continue);
        assert_eq!(shell.execute_line("exit"), Flow::Exit);
        assert_eq!(shell.execute_line("  exit now"), Flow::Exit);
    }

    #[test]
    fn test_redirect_round_trip() {
        let _guard = testing::lock();
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("out.txt");
        let copy = dir.path().join("copy.txt");
        let mut shell = shell();

        shell.execute_line(&format!("echo hello > {}", out.display()));
        shell.execute_line(&format!("cat < {} > {}", out.display(), copy.display()));
        assert_eq!(fs::read_to_string(&copy).expect("read"), "hello\n");

        shell.execute_line(&format!("echo hello >> {}", out.display()));
        assert_eq!(fs::read_to_string(&out).expect("read"), "hello\nhello\n");
    }

    #[test]
    fn test_failures_keep_the_session_alive() {
        let _guard = testing::lock();
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("after.txt");
        let mut shell = shell();

        assert_eq!(
            shell.execute_line("cat < /nonexistent/mysh/nosuchfile"),
            Flow::Continue
        );
        assert_eq!(shell.execute_line("mysh-no-such-program"), Flow::Continue);
        assert_eq!(shell.execute_line("> nowhere"), Flow::Continue);
        assert_eq!(shell.execute_line("| cat"), Flow::Continue);
        assert_eq!(shell.execute_line("cd /nonexistent/mysh"), Flow::Continue);

        shell.execute_line(&format!("echo still-here > {}", out.display()));
        assert_eq!(fs::read_to_string(&out).expect("read"), "still-here\n");
    }

    #[test]
    fn test_pipeline_line() {
        let _guard = testing::lock();
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("piped.txt");
        let mut shell = shell();

        shell.execute_line(&format!("printf A | tee {}", out.display()));
        assert_eq!(fs::read_to_string(&out).expect("read"), "A");
    }

    #[test]
    fn test_second_pipe_is_an_argument() {
        let _guard = testing::lock();
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("second.txt");
        let mut shell = shell();

        // the right command is `tee FILE | cat`, so tee also creates a file named "|"
        let cwd = env::current_dir().expect("cwd");
        env::set_current_dir(dir.path()).expect("cd");
        let flow = shell.execute_line(&format!("printf B | tee {} | cat", out.display()));
        let pipe_file = dir.path().join("|");
        env::set_current_dir(&cwd).expect("restore cwd");

        assert_eq!(flow, Flow::Continue);
        assert_eq!(fs::read_to_string(&out).expect("read"), "B");
        assert!(pipe_file.exists());
    }

    #[test]
    fn test_background_line_returns() {
        let _guard = testing::lock();
        let mut shell = shell();

        let started = std::time::Instant::now();
        assert_eq!(shell.execute_line("sleep 1 &"), Flow::Continue);
        assert!(started.elapsed() < std::time::Duration::from_millis(900));
    }
}
