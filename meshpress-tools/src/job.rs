//! External job descriptions.

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

/// Default polling interval while waiting on a job.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default wall-clock budget for a job.
pub const DEFAULT_MAX_WAIT_SECS: u64 = 180;

/// How the coordinator learns that a run has finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionSignal {
    /// Wait for the spawned process itself to exit.
    ProcessExit,
    /// Wait for a sentinel file written by the tool's driver script, for
    /// tools whose useful work outlives the launching process.
    FlagFile(PathBuf),
}

/// One external tool invocation.
///
/// A job names the executable, its arguments, the file the run is expected
/// to produce and the signal the coordinator should watch for completion.
/// Scratch files registered via [`ExternalJob::cleanup`] (generated driver
/// scripts and the like) are removed when the job finishes or times out.
#[derive(Debug, Clone)]
pub struct ExternalJob {
    /// Display name used in logs and errors.
    pub tool_name: String,
    /// Resolved executable path.
    pub executable: PathBuf,
    /// Command-line arguments.
    pub args: Vec<OsString>,
    /// Completion protocol for this run.
    pub completion: CompletionSignal,
    /// File the run must produce with nonzero size.
    pub expected_output: PathBuf,
    /// Wall-clock budget for the whole run.
    pub max_wait: Duration,
    /// Interval between completion checks.
    pub poll_interval: Duration,
    /// Scratch files to remove once the run is over.
    pub cleanup_paths: Vec<PathBuf>,
}

impl ExternalJob {
    /// Creates a job waiting on process exit by default.
    pub fn new(
        tool_name: impl Into<String>,
        executable: impl Into<PathBuf>,
        expected_output: impl Into<PathBuf>,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            executable: executable.into(),
            args: Vec::new(),
            completion: CompletionSignal::ProcessExit,
            expected_output: expected_output.into(),
            max_wait: Duration::from_secs(DEFAULT_MAX_WAIT_SECS),
            poll_interval: DEFAULT_POLL_INTERVAL,
            cleanup_paths: Vec::new(),
        }
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the completion protocol.
    pub fn completion(mut self, signal: CompletionSignal) -> Self {
        self.completion = signal;
        self
    }

    /// Sets the wall-clock budget.
    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Sets the polling interval.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Registers a scratch file to remove once the run is over.
    pub fn cleanup(mut self, path: impl Into<PathBuf>) -> Self {
        self.cleanup_paths.push(path.into());
        self
    }

    /// Human-readable command line for logs.
    pub fn command_line(&self) -> String {
        let mut line = self.executable.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_builder() {
        let job = ExternalJob::new("retopo", "/usr/bin/retopo", "/tmp/out.obj")
            .arg("-i")
            .arg("/tmp/in.obj")
            .args(["--faces", "500"])
            .completion(CompletionSignal::FlagFile(PathBuf::from("/tmp/done.flag")))
            .max_wait(Duration::from_secs(60))
            .poll_interval(Duration::from_millis(250))
            .cleanup("/tmp/driver.py");

        assert_eq!(job.tool_name, "retopo");
        assert_eq!(job.args.len(), 4);
        assert_eq!(
            job.completion,
            CompletionSignal::FlagFile(PathBuf::from("/tmp/done.flag"))
        );
        assert_eq!(job.max_wait, Duration::from_secs(60));
        assert_eq!(job.poll_interval, Duration::from_millis(250));
        assert_eq!(job.cleanup_paths, vec![PathBuf::from("/tmp/driver.py")]);
    }

    #[test]
    fn test_default_completion_is_process_exit() {
        let job = ExternalJob::new("x", "/bin/x", "/tmp/out");
        assert_eq!(job.completion, CompletionSignal::ProcessExit);
        assert_eq!(job.max_wait, Duration::from_secs(DEFAULT_MAX_WAIT_SECS));
    }

    #[test]
    fn test_command_line_rendering() {
        let job = ExternalJob::new("retopo", "/usr/bin/retopo", "/tmp/out.obj")
            .args(["-i", "/tmp/in.obj", "-d"]);
        assert_eq!(job.command_line(), "/usr/bin/retopo -i /tmp/in.obj -d");
    }
}
