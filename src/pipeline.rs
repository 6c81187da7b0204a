use libc::{c_int, STDIN_FILENO, STDOUT_FILENO};
use log::debug;

use crate::execution::{
    die, fork, wait_foreground, ArgVec, ExecutionError, Fork, Status, EXEC_FAILURE,
};
use crate::fd::{Fd, Pipe};
use crate::sig;

/// Wires `end` onto `slot` and replaces the child's image with `argv`.
fn exec_connected(end: Fd, slot: c_int, argv: &ArgVec) -> ! {
    if end.dup_onto(slot).is_err() {
        die(argv.context(), EXEC_FAILURE);
    }

    argv.exec()
}

/// Runs `left | right` and waits for both sides.
///
/// Ownership of the pipe endpoints:
/// - the writer child keeps only the write end, as its stdout
/// - the reader child keeps only the read end, as its stdin
/// - the parent closes both ends once both children exist
///
/// Any write end left open in the parent would keep the reader from ever
/// seeing end of file.
pub fn execute(left: &[String], right: &[String]) -> Result<(Status, Status), ExecutionError> {
    let left = ArgVec::new(left)?;
    let right = ArgVec::new(right)?;

    let mask = sig::mask_sigchld()?;
    let pipe = Pipe::new()?;
    debug!(
        "pipe read end {}, write end {}",
        pipe.read.as_raw(),
        pipe.write.as_raw()
    );

    let writer = match fork()? {
        Fork::Child => {
            sig::prepare_child(&mask);
            let Pipe { read, write } = pipe;
            drop(read);
            exec_connected(write, STDOUT_FILENO, &left)
        }
        Fork::Parent(pid) => pid,
    };
    debug!("spawned {:?} as pid {} writing the pipe", left.program(), writer);

    let reader = match fork() {
        Ok(Fork::Child) => {
            sig::prepare_child(&mask);
            let Pipe { read, write } = pipe;
            drop(write);
            exec_connected(read, STDIN_FILENO, &right)
        }
        Ok(Fork::Parent(pid)) => pid,
        Err(e) => {
            drop(pipe);
            let _ = wait_foreground(writer);
            return Err(e);
        }
    };
    debug!("spawned {:?} as pid {} reading the pipe", right.program(), reader);

    let closed = pipe.close();
    let left_status = wait_foreground(writer);
    let right_status = wait_foreground(reader);
    debug!(
        "pipeline finished with {:?} and {:?}",
        left_status, right_status
    );
    drop(mask);

    closed?;
    Ok((left_status?, right_status?))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::execute;
    use crate::execution::{ExecutionError, Status, EXEC_FAILURE};
    use crate::testing;

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(str::to_owned).collect()
    }

    fn open_fds() -> usize {
        fs::read_dir("/proc/self/fd").expect("fd dir").count()
    }

    #[test]
    fn test_output_reaches_reader() {
        let _guard = testing::lock();
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("out.txt");

        let statuses = execute(
            &args("printf A"),
            &args(&format!("tee {}", out.display())),
        )
        .expect("pipeline");

        assert_eq!(statuses, (Status::Exited(0), Status::Exited(0)));
        assert_eq!(fs::read_to_string(&out).expect("read"), "A");
    }

    #[test]
    fn test_no_descriptor_leaks() {
        let _guard = testing::lock();

        let before = open_fds();
        let statuses = execute(&args("printf A"), &args("cat")).expect("pipeline");
        let after = open_fds();

        assert_eq!(statuses, (Status::Exited(0), Status::Exited(0)));
        assert_eq!(before, after);
    }

    #[test]
    fn test_reader_sees_end_of_file() {
        let _guard = testing::lock();
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("count.txt");

        // tee only exits once every write end is closed
        let statuses = execute(
            &args(r"printf a\nb\n"),
            &args(&format!("tee {}", out.display())),
        )
        .expect("pipeline");

        assert_eq!(statuses.1, Status::Exited(0));
        assert_eq!(fs::read_to_string(&out).expect("read"), "a\nb\n");
    }

    #[test]
    fn test_failing_side_still_awaited() {
        let _guard = testing::lock();

        let before = open_fds();
        let statuses =
            execute(&args("mysh-no-such-program"), &args("cat")).expect("pipeline");

        assert_eq!(statuses, (Status::Exited(EXEC_FAILURE), Status::Exited(0)));
        assert_eq!(before, open_fds());

        let statuses = execute(&args("printf A"), &args("mysh-no-such-program"))
            .expect("pipeline");
        assert_eq!(statuses.1, Status::Exited(EXEC_FAILURE));
    }

    #[test]
    fn test_closed_reader_kills_writer_with_sigpipe() {
        let _guard = testing::lock();

        let statuses = execute(&args("yes"), &args("true")).expect("pipeline");

        assert_eq!(statuses, (Status::Signaled(libc::SIGPIPE), Status::Exited(0)));
    }

    #[test]
    fn test_empty_side_spawns_nothing() {
        let _guard = testing::lock();

        let before = open_fds();
        assert!(matches!(
            execute(&[], &args("cat")),
            Err(ExecutionError::EmptyCommand)
        ));
        assert!(matches!(
            execute(&args("ls"), &[]),
            Err(ExecutionError::EmptyCommand)
        ));
        assert_eq!(before, open_fds());
    }
}
