//! External process coordination.
//!
//! Runs one tool invocation to completion, timeout or failure. Two
//! completion protocols are supported: waiting on process exit (tools that
//! block until their work is done) and polling for a flag file plus a
//! stable, non-empty output file (driver-script tools whose work outlives
//! the launcher, where no exit status is meaningful). Whatever the outcome,
//! the spawned process never outlives the call.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::{ToolError, ToolResult};
use crate::job::{CompletionSignal, ExternalJob};

/// Settle time before a stable output size is trusted.
pub const SIZE_STABILITY_WINDOW: Duration = Duration::from_secs(2);

/// Final state of an external job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    /// The completion signal held and the output is present and stable.
    Completed,
    /// The budget expired; the spawned process was terminated.
    TimedOut,
    /// The process exited unsuccessfully or left no usable output.
    Failed { reason: String },
}

/// Runs a job and reports how it ended.
///
/// The child process is always reaped before returning, killed first if it
/// is still alive. Registered scratch files and the flag file are removed
/// on every exit path.
pub fn run_job(job: &ExternalJob) -> ToolResult<JobStatus> {
    if let CompletionSignal::FlagFile(flag) = &job.completion {
        // A flag left over from an earlier run would complete this one
        // before the tool has done anything.
        if flag.exists() {
            fs::remove_file(flag)?;
        }
    }

    let mut child = spawn(job)?;
    debug!(tool = %job.tool_name, command = %job.command_line(), "spawned external job");

    let started = Instant::now();
    let status = match &job.completion {
        CompletionSignal::ProcessExit => wait_for_exit(job, &mut child, started),
        CompletionSignal::FlagFile(flag) => wait_for_flag(job, flag, started),
    };

    reap(&mut child);
    remove_scratch(job);

    match &status {
        JobStatus::Completed => {
            info!(
                tool = %job.tool_name,
                elapsed_secs = started.elapsed().as_secs(),
                "external job completed"
            );
        }
        JobStatus::TimedOut => {
            warn!(
                tool = %job.tool_name,
                max_wait_secs = job.max_wait.as_secs(),
                "external job timed out"
            );
        }
        JobStatus::Failed { reason } => {
            warn!(tool = %job.tool_name, reason = %reason, "external job failed");
        }
    }

    Ok(status)
}

fn spawn(job: &ExternalJob) -> ToolResult<Child> {
    let mut cmd = Command::new(&job.executable);
    cmd.args(&job.args)
        .stdin(Stdio::null())
        .stdout(Stdio::null());
    match job.completion {
        // Only stderr is surfaced; stdout stays unpiped so a chatty tool
        // cannot deadlock on a filled pipe.
        CompletionSignal::ProcessExit => cmd.stderr(Stdio::piped()),
        CompletionSignal::FlagFile(_) => cmd.stderr(Stdio::null()),
    };
    cmd.spawn().map_err(|source| ToolError::SpawnFailed {
        tool: job.tool_name.clone(),
        source,
    })
}

fn wait_for_exit(job: &ExternalJob, child: &mut Child, started: Instant) -> JobStatus {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                if !status.success() {
                    let stderr = read_stderr(child);
                    let code = status.code().unwrap_or(-1);
                    return JobStatus::Failed {
                        reason: format!("exit status {code}: {}", stderr.trim()),
                    };
                }
                if output_size(&job.expected_output) == 0 {
                    return JobStatus::Failed {
                        reason: format!(
                            "output missing or empty at {}",
                            job.expected_output.display()
                        ),
                    };
                }
                return JobStatus::Completed;
            }
            Ok(None) => {
                if started.elapsed() >= job.max_wait {
                    return JobStatus::TimedOut;
                }
                thread::sleep(job.poll_interval);
            }
            Err(err) => {
                return JobStatus::Failed {
                    reason: format!("wait failed: {err}"),
                };
            }
        }
    }
}

fn wait_for_flag(job: &ExternalJob, flag: &Path, started: Instant) -> JobStatus {
    loop {
        let size = output_size(&job.expected_output);
        if flag.exists() && size > 0 {
            // The tool may still be flushing; trust the size only once it
            // has held for a settle window.
            thread::sleep(SIZE_STABILITY_WINDOW);
            if output_size(&job.expected_output) == size {
                return JobStatus::Completed;
            }
            debug!(tool = %job.tool_name, "output still growing, continuing to poll");
        }
        if started.elapsed() >= job.max_wait {
            return JobStatus::TimedOut;
        }
        thread::sleep(job.poll_interval);
    }
}

/// No job process may outlive the run.
fn reap(child: &mut Child) {
    match child.try_wait() {
        Ok(Some(_)) => {}
        _ => {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

fn remove_scratch(job: &ExternalJob) {
    let mut paths: Vec<&Path> = job.cleanup_paths.iter().map(PathBuf::as_path).collect();
    if let CompletionSignal::FlagFile(flag) = &job.completion {
        paths.push(flag);
    }
    for path in paths {
        if path.exists() {
            if let Err(err) = fs::remove_file(path) {
                warn!(path = %path.display(), %err, "failed to remove job scratch file");
            }
        }
    }
}

fn read_stderr(child: &mut Child) -> String {
    let mut buf = String::new();
    if let Some(mut err) = child.stderr.take() {
        let _ = err.read_to_string(&mut buf);
    }
    buf
}

fn output_size(path: &Path) -> u64 {
    fs::metadata(path).map(|meta| meta.len()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn shell_job(script: &str, output: &Path) -> ExternalJob {
        let (shell, switch) = if cfg!(windows) {
            ("cmd", "/C")
        } else {
            ("sh", "-c")
        };
        ExternalJob::new("helper", shell, output)
            .arg(switch)
            .arg(script)
            .poll_interval(Duration::from_millis(50))
            .max_wait(Duration::from_secs(10))
    }

    #[test]
    fn test_exit_job_completes_when_output_written() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out.txt");
        let job = shell_job(&format!("echo data > {}", out.display()), &out);

        let status = run_job(&job).unwrap();
        assert_eq!(status, JobStatus::Completed);
        assert!(out.exists());
    }

    #[test]
    fn test_exit_job_failure_carries_exit_code() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out.txt");
        let job = shell_job("exit 3", &out);

        match run_job(&job).unwrap() {
            JobStatus::Failed { reason } => assert!(reason.contains('3'), "reason: {reason}"),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn test_exit_job_fails_without_output() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("never-written.txt");
        let job = shell_job("echo hello", &out);

        match run_job(&job).unwrap() {
            JobStatus::Failed { reason } => {
                assert!(reason.contains("output missing"), "reason: {reason}")
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_job_timeout_kills_process() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out.txt");
        let job = shell_job("sleep 30", &out).max_wait(Duration::from_millis(300));

        let started = Instant::now();
        let status = run_job(&job).unwrap();
        assert_eq!(status, JobStatus::TimedOut);
        // Well under the helper's 30 s sleep: the child was killed, not joined.
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[test]
    fn test_flag_job_completes_and_removes_scratch() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out.glb");
        let flag = dir.path().join("out.glb.done");
        let script = dir.path().join("driver.py");
        fs::write(&script, "# driver placeholder").unwrap();

        let job = shell_job(
            &format!("echo data > {}; echo done > {}", out.display(), flag.display()),
            &out,
        )
        .completion(CompletionSignal::FlagFile(flag.clone()))
        .cleanup(&script);

        let status = run_job(&job).unwrap();
        assert_eq!(status, JobStatus::Completed);
        assert!(out.exists());
        assert!(!flag.exists(), "flag file should be removed");
        assert!(!script.exists(), "driver script should be removed");
    }

    #[cfg(unix)]
    #[test]
    fn test_flag_job_times_out_without_flag() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out.glb");
        let flag = dir.path().join("out.glb.done");
        let script = dir.path().join("driver.py");
        fs::write(&script, "# driver placeholder").unwrap();

        // The tool raises its flag but never produces the output, so the
        // job cannot complete and runs out its budget.
        let job = shell_job(&format!("echo done > {}; sleep 30", flag.display()), &out)
            .completion(CompletionSignal::FlagFile(flag.clone()))
            .cleanup(&script)
            .max_wait(Duration::from_secs(1));

        let status = run_job(&job).unwrap();
        assert_eq!(status, JobStatus::TimedOut);
        // Timing out still sweeps the scratch files
        assert!(!flag.exists(), "flag file should be removed on timeout");
        assert!(!script.exists(), "driver script should be removed on timeout");
    }

    #[cfg(unix)]
    #[test]
    fn test_stale_flag_does_not_complete_job() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out.glb");
        let flag = dir.path().join("out.glb.done");
        fs::write(&flag, "stale").unwrap();
        fs::write(&out, "old output").unwrap();

        // The helper never writes the flag, so only the stale one could
        // complete the job.
        let job = shell_job("sleep 30", &out)
            .completion(CompletionSignal::FlagFile(flag.clone()))
            .max_wait(Duration::from_secs(1));

        let status = run_job(&job).unwrap();
        assert_eq!(status, JobStatus::TimedOut);
    }
}
