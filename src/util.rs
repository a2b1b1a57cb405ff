//! External process plumbing.
//!
//! Everything that shells out (the analysis tool, git blame, git log) goes
//! through the [`CommandRunner`] trait so the aggregation and reconciliation
//! logic can be exercised against fixed textual fixtures in tests.

use anyhow::{anyhow, Context, Result};
use std::io::{BufReader, Read};
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Narrow capability interface over external process invocation.
///
/// `run` returns the captured stdout of a successful invocation. Anything
/// else (spawn failure, nonzero exit, timeout) is an error.
pub trait CommandRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<String>;
}

/// Runs commands on the real system inside a fixed working directory.
pub struct SystemRunner {
    dir: PathBuf,
    timeout: Duration,
}

/// A hung linter or git call blocks the whole run; the job-level CI timeout
/// is the real backstop, this one just produces a better error message.
const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 600;

impl SystemRunner {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            timeout: Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(dir: PathBuf, timeout: Duration) -> Self {
        Self { dir, timeout }
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        let mut command = Command::new(program);
        command.args(args).current_dir(&self.dir);

        let result = run_command_with_timeout(&mut command, self.timeout)
            .with_context(|| format!("Failed to run {}", program))?;

        if result.timed_out {
            return Err(anyhow!(
                "{} timed out after {}s",
                program,
                self.timeout.as_secs()
            ));
        }

        match result.status {
            Some(status) if status.success() => Ok(result.stdout),
            Some(status) => Err(anyhow!(
                "{} exited with {}: {}",
                program,
                status,
                result.stderr.trim()
            )),
            None => Err(anyhow!("{} terminated without an exit status", program)),
        }
    }
}

#[derive(Debug)]
pub struct CommandRunResult {
    pub status: Option<ExitStatus>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

pub fn run_command_with_timeout(
    command: &mut Command,
    timeout: Duration,
) -> Result<CommandRunResult> {
    let mut child = command
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .context("Failed to start command")?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("Failed to capture stdout"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("Failed to capture stderr"))?;

    let stdout_handle = thread::spawn(move || {
        let mut buf = Vec::new();
        let mut reader = BufReader::new(stdout);
        let _ = reader.read_to_end(&mut buf);
        buf
    });
    let stderr_handle = thread::spawn(move || {
        let mut buf = Vec::new();
        let mut reader = BufReader::new(stderr);
        let _ = reader.read_to_end(&mut buf);
        buf
    });

    let start = Instant::now();
    let mut timed_out = false;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break Some(status),
            Ok(None) => {
                if start.elapsed() >= timeout {
                    timed_out = true;
                    let _ = child.kill();
                    match child.wait() {
                        Ok(status) => break Some(status),
                        Err(_) => break None,
                    }
                }
                thread::sleep(Duration::from_millis(50));
            }
            Err(e) => return Err(anyhow!("Failed to wait for command: {}", e)),
        }
    };

    let stdout_bytes = stdout_handle.join().unwrap_or_default();
    let stderr_bytes = stderr_handle.join().unwrap_or_default();

    Ok(CommandRunResult {
        status,
        stdout: String::from_utf8_lossy(&stdout_bytes).to_string(),
        stderr: String::from_utf8_lossy(&stderr_bytes).to_string(),
        timed_out,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_runner_captures_stdout() {
        let runner = SystemRunner::new(std::env::temp_dir());
        let out = runner.run("echo", &["hello"]).unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[test]
    fn test_system_runner_reports_missing_program() {
        let runner = SystemRunner::new(std::env::temp_dir());
        assert!(runner.run("lintwarden-no-such-binary", &[]).is_err());
    }

    #[test]
    fn test_system_runner_reports_nonzero_exit() {
        let runner = SystemRunner::new(std::env::temp_dir());
        let err = runner.run("false", &[]).unwrap_err();
        assert!(err.to_string().contains("exited with"));
    }

    #[test]
    fn test_timeout_kills_hung_command() {
        let mut command = Command::new("sleep");
        command.arg("5");
        let result = run_command_with_timeout(&mut command, Duration::from_millis(100)).unwrap();
        assert!(result.timed_out);
    }
}
