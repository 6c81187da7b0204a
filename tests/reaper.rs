use std::path::Path;
use std::ptr::null_mut;
use std::thread::sleep;
use std::time::{Duration, Instant};

use mysh::execution::{execute, Outcome, Status};
use mysh::scanner::{scan, CommandLine, Redirection};
use mysh::sig::install_reaper;

fn args(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_owned).collect()
}

fn process_state(pid: libc::pid_t) -> Option<char> {
    let stat = std::fs::read_to_string(Path::new("/proc").join(pid.to_string()).join("stat")).ok()?;
    // the state follows the parenthesized command name
    stat.rsplit(')').next()?.trim_start().chars().next()
}

// One test per binary: the handler is process-wide and would collect the
// children of any other test running alongside.
#[test]
fn test_background_children_are_reaped() {
    install_reaper().expect("install SIGCHLD handler");

    let (argv, redirection, background) = match scan(args("sleep 1 &")) {
        CommandLine::Simple {
            argv,
            redirection,
            background,
        } => (argv, redirection, background),
        other => panic!("expected a simple command, got {:?}", other),
    };
    assert!(background);

    let started = Instant::now();
    let pid = match execute(&argv, &redirection, background) {
        Ok(Outcome::Background(pid)) => pid,
        other => panic!("unexpected result {:?}", other),
    };
    assert!(started.elapsed() < Duration::from_millis(500));
    assert!(pid > 0);

    let quick: Vec<_> = (0..3)
        .map(|_| match execute(&args("true"), &Redirection::default(), true) {
            Ok(Outcome::Background(pid)) => pid,
            other => panic!("unexpected result {:?}", other),
        })
        .collect();

    sleep(Duration::from_millis(1500));

    for pid in quick.into_iter().chain(Some(pid)) {
        assert_ne!(process_state(pid), Some('Z'), "pid {} left as a zombie", pid);
        assert_eq!(unsafe { libc::waitpid(pid, null_mut(), libc::WNOHANG) }, -1);
    }

    // a foreground command still completes while the handler is armed
    match execute(&args("true"), &Redirection::default(), false) {
        Ok(Outcome::Foreground(status)) => {
            assert!(status == Status::Exited(0) || status == Status::Collected)
        }
        other => panic!("unexpected result {:?}", other),
    }
}
