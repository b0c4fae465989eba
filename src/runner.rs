// External process invocation.
//
// Every extractor call goes through a `ProcessRunner`, so the generator can be
// driven by a fake in tests. Arguments are passed as a vector, never through a
// shell, so package identifiers cannot be reinterpreted.

use crate::error::{Error, Result};
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(20);
/// How long output is still collected after the extractor exits or is killed
const DRAIN_GRACE: Duration = Duration::from_millis(100);

/// Captured result of one command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code, `None` when killed by a signal or after a timeout
    pub status: Option<i32>,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0) && !self.timed_out
    }
}

/// Runs a program to completion and captures its output.
///
/// A non-zero exit is not an error; only failing to start the program is.
pub trait ProcessRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput>;
}

/// Runner backed by `std::process`
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    timeout: Option<Duration>,
    echo: bool,
}

impl SystemRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill the child if it has not exited after `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Log captured stdout/stderr of every command at debug level
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    fn wait(&self, child: &mut Child, deadline: Option<Instant>) -> std::io::Result<(Option<i32>, bool)> {
        let Some(deadline) = deadline else {
            return Ok((child.wait()?.code(), false));
        };

        loop {
            if let Some(status) = child.try_wait()? {
                return Ok((status.code(), false));
            }
            if Instant::now() >= deadline {
                // The child may exit between try_wait and kill
                let _ = child.kill();
                child.wait()?;
                return Ok((None, true));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Forward everything read from `source` as chunks tagged with `stream`
fn drain<R: Read + Send + 'static>(source: Option<R>, stream: Stream, tx: Sender<(Stream, Vec<u8>)>) {
    thread::spawn(move || {
        let Some(mut source) = source else {
            return;
        };
        let mut buf = [0u8; 8192];
        loop {
            match source.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if tx.send((stream, buf[..n].to_vec())).is_err() {
                        break;
                    }
                }
            }
        }
    });
}

/// Gather chunks until both readers finish, or until `until` passes.
///
/// Grandchildren of a killed extractor can hold the pipes open indefinitely,
/// so with a deadline the readers are left behind once it expires.
fn collect(rx: &Receiver<(Stream, Vec<u8>)>, until: Option<Instant>) -> (Vec<u8>, Vec<u8>) {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();

    loop {
        let received = match until {
            None => rx.recv().ok(),
            Some(until) => {
                let now = Instant::now();
                if now >= until {
                    None
                } else {
                    rx.recv_timeout(until - now).ok()
                }
            }
        };
        match received {
            Some((Stream::Stdout, chunk)) => stdout.extend_from_slice(&chunk),
            Some((Stream::Stderr, chunk)) => stderr.extend_from_slice(&chunk),
            None => break,
        }
    }

    (stdout, stderr)
}

impl ProcessRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        tracing::debug!("running {} {}", program, args.join(" "));

        let deadline = self.timeout.map(|t| Instant::now() + t);

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::extractor(program, e.to_string()))?;

        // Both pipes are drained concurrently so a chatty child cannot block on a full pipe
        let (tx, rx) = mpsc::channel();
        drain(child.stdout.take(), Stream::Stdout, tx.clone());
        drain(child.stderr.take(), Stream::Stderr, tx);

        let (status, timed_out) = self.wait(&mut child, deadline)?;

        let until = deadline.map(|deadline| {
            let grace = Instant::now() + DRAIN_GRACE;
            if timed_out { grace } else { deadline.max(grace) }
        });
        let (stdout, stderr) = collect(&rx, until);

        let output = CommandOutput {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            status,
            timed_out,
        };

        if self.echo {
            tracing::debug!("stdout: {}", output.stdout);
        }
        if !output.stderr.is_empty() {
            tracing::debug!("stderr: {}", output.stderr);
        }
        if timed_out {
            tracing::warn!("{} timed out after {:?}", program, self.timeout.unwrap_or_default());
        } else if !output.success() {
            tracing::info!("{} exited with status {:?}", program, status);
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_missing_program_is_error() {
        let runner = SystemRunner::new();
        let result = runner.run("pkgdoc-definitely-not-a-program", &[]);
        assert!(matches!(result, Err(Error::Extractor { .. })));
    }

    #[test]
    fn test_command_output_success() {
        let ok = CommandOutput {
            status: Some(0),
            ..Default::default()
        };
        assert!(ok.success());

        let failed = CommandOutput {
            status: Some(2),
            ..Default::default()
        };
        assert!(!failed.success());

        let timed_out = CommandOutput {
            status: Some(0),
            timed_out: true,
            ..Default::default()
        };
        assert!(!timed_out.success());
    }

    #[cfg(unix)]
    #[test]
    fn test_captures_stdout_and_stderr() {
        let runner = SystemRunner::new();
        let output = runner
            .run("sh", &args(&["-c", "printf '<p>stub</p>'; echo oops >&2"]))
            .unwrap();
        assert_eq!(output.stdout, "<p>stub</p>");
        assert_eq!(output.stderr, "oops");
        assert!(output.success());
    }

    #[cfg(unix)]
    #[test]
    fn test_arguments_are_not_shell_expanded() {
        let runner = SystemRunner::new();
        let output = runner.run("echo", &args(&["a;b $HOME `x`"])).unwrap();
        assert_eq!(output.stdout, "a;b $HOME `x`\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_is_not_error() {
        let runner = SystemRunner::new();
        let output = runner.run("sh", &args(&["-c", "exit 3"])).unwrap();
        assert_eq!(output.status, Some(3));
        assert!(!output.success());
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_child() {
        let runner = SystemRunner::new().with_timeout(Some(Duration::from_millis(200)));
        let start = Instant::now();
        let output = runner.run("sleep", &args(&["5"])).unwrap();
        assert!(output.timed_out);
        assert_eq!(output.status, None);
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_with_grandchild_holding_pipes() {
        let runner = SystemRunner::new().with_timeout(Some(Duration::from_millis(200)));
        let start = Instant::now();
        let output = runner
            .run("sh", &args(&["-c", "echo partial; sleep 4; true"]))
            .unwrap();
        assert!(output.timed_out);
        assert_eq!(output.stdout, "partial\n");
        assert!(start.elapsed() < Duration::from_secs(2), "took {:?}", start.elapsed());
    }

    #[cfg(unix)]
    #[test]
    fn test_large_output_is_fully_captured() {
        let runner = SystemRunner::new().with_timeout(Some(Duration::from_secs(10)));
        let output = runner
            .run("sh", &args(&["-c", "yes '<p>line</p>' | head -n 20000"]))
            .unwrap();
        assert!(output.success());
        assert_eq!(output.stdout.lines().count(), 20000);
    }
}
