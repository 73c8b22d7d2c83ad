//! External tool invocation
//!
//! Every tool call the pipeline makes is described by an [`Invocation`] first and
//! executed through a [`CommandRunner`], so plans can be printed, dry-run or
//! recorded in tests without touching docker, aws, eksctl or kubectl.

use crate::utils::errors::DeployError;
use std::io::Write;
use std::process::{Command, Stdio};

/// Where a tool's standard input comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StdinSource {
    /// Literal text, e.g. a rendered manifest
    Text(String),
    /// Standard output of another tool. Treated as a secret and never logged.
    Pipe(Box<Invocation>),
}

/// A single external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<StdinSource>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn stdin_text(mut self, text: impl Into<String>) -> Self {
        self.stdin = Some(StdinSource::Text(text.into()));
        self
    }

    pub fn stdin_from(mut self, producer: Invocation) -> Self {
        self.stdin = Some(StdinSource::Pipe(Box::new(producer)));
        self
    }

    /// Shell-quoted command line without stdin
    pub fn command_line(&self) -> String {
        let mut words = Vec::with_capacity(self.args.len() + 1);
        words.push(self.program.as_str());
        words.extend(self.args.iter().map(String::as_str));
        shell_words::join(words)
    }

    /// Human readable form including stdin wiring
    pub fn display(&self) -> String {
        match &self.stdin {
            None => self.command_line(),
            Some(StdinSource::Pipe(producer)) => {
                format!("{} | {}", producer.command_line(), self.command_line())
            }
            Some(StdinSource::Text(text)) => {
                format!("{} < ({} bytes)", self.command_line(), text.len())
            }
        }
    }
}

impl std::fmt::Display for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

/// Captured output of a finished tool
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs invocations. Implementations must fail on a non-zero exit status.
pub trait CommandRunner {
    fn run(&self, invocation: &Invocation) -> Result<ToolOutput, DeployError>;

    /// True when nothing is actually executed
    fn is_dry_run(&self) -> bool {
        false
    }
}

/// Runs tools as child processes
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner {
    /// Capture stdout/stderr instead of streaming them to the terminal
    pub capture: bool,
}

impl ProcessRunner {
    pub fn new(capture: bool) -> Self {
        Self { capture }
    }

    fn command(invocation: &Invocation) -> Command {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args);
        cmd
    }

    /// Run the producer side of a pipe, always captured
    fn produce(&self, producer: &Invocation) -> Result<Vec<u8>, DeployError> {
        crate::log_debug!("Running: {}", producer.command_line());

        let output = Self::command(producer)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| DeployError::ToolSpawn {
                program: producer.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(DeployError::ToolFailed {
                command: producer.command_line(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(output.stdout)
    }
}

impl CommandRunner for ProcessRunner {
    fn run(&self, invocation: &Invocation) -> Result<ToolOutput, DeployError> {
        let stdin_bytes = match &invocation.stdin {
            None => None,
            Some(StdinSource::Text(text)) => Some(text.clone().into_bytes()),
            Some(StdinSource::Pipe(producer)) => Some(self.produce(producer)?),
        };

        crate::log_debug!("Running: {}", invocation.command_line());

        let mut cmd = Self::command(invocation);
        cmd.stdin(if stdin_bytes.is_some() {
            Stdio::piped()
        } else {
            Stdio::inherit()
        });
        if self.capture {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        } else {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }

        let mut child = cmd.spawn().map_err(|source| DeployError::ToolSpawn {
            program: invocation.program.clone(),
            source,
        })?;

        // Fed from its own thread so captured output is drained while input is written
        let writer = match (stdin_bytes, child.stdin.take()) {
            (Some(bytes), Some(mut stdin)) => {
                let program = invocation.program.clone();
                Some(std::thread::spawn(move || {
                    // A tool that exits before reading all input reports its own failure
                    if let Err(e) = stdin.write_all(&bytes) {
                        crate::log_debug!("Writing stdin of {} failed: {}", program, e);
                    }
                }))
            }
            _ => None,
        };

        let output = child
            .wait_with_output()
            .map_err(|source| DeployError::ToolSpawn {
                program: invocation.program.clone(),
                source,
            })?;

        if let Some(writer) = writer {
            if writer.join().is_err() {
                crate::log_debug!("Stdin writer for {} panicked", invocation.program);
            }
        }

        let result = ToolOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !output.status.success() {
            return Err(DeployError::ToolFailed {
                command: invocation.command_line(),
                code: output.status.code(),
                stderr: result.stderr,
            });
        }

        Ok(result)
    }
}

/// Prints what would run and succeeds without executing anything
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunRunner;

impl CommandRunner for DryRunRunner {
    fn run(&self, invocation: &Invocation) -> Result<ToolOutput, DeployError> {
        crate::utils::dryrun::log_action(&invocation.display());
        Ok(ToolOutput::default())
    }

    fn is_dry_run(&self) -> bool {
        true
    }
}

#[cfg(test)]
pub mod testing {
    //! Recording runner for unit tests

    use super::*;
    use std::cell::RefCell;

    /// Records every invocation; optionally fails the n-th one
    #[derive(Default)]
    pub struct RecordingRunner {
        pub calls: RefCell<Vec<Invocation>>,
        pub fail_at: Option<(usize, i32)>,
    }

    impl RecordingRunner {
        pub fn new() -> Self {
            Self::default()
        }

        /// Fail the call at `index` (0-based) with `code`
        pub fn failing_at(index: usize, code: i32) -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
                fail_at: Some((index, code)),
            }
        }

        pub fn programs(&self) -> Vec<String> {
            self.calls
                .borrow()
                .iter()
                .map(|i| i.program.clone())
                .collect()
        }
    }

    impl CommandRunner for RecordingRunner {
        fn run(&self, invocation: &Invocation) -> Result<ToolOutput, DeployError> {
            let index = self.calls.borrow().len();
            self.calls.borrow_mut().push(invocation.clone());

            match self.fail_at {
                Some((at, code)) if at == index => Err(DeployError::ToolFailed {
                    command: invocation.command_line(),
                    code: Some(code),
                    stderr: "simulated failure".to_string(),
                }),
                _ => Ok(ToolOutput::default()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_quotes_arguments() {
        let inv = Invocation::new("docker").args(["build", "-t", "reporting", "my dir"]);
        assert_eq!(inv.command_line(), "docker build -t reporting 'my dir'");
    }

    #[test]
    fn test_display_pipe_and_text() {
        let producer = Invocation::new("aws").args(["ecr", "get-login-password"]);
        let login = Invocation::new("docker")
            .args(["login", "--password-stdin"])
            .stdin_from(producer);
        assert_eq!(
            login.display(),
            "aws ecr get-login-password | docker login --password-stdin"
        );

        let apply = Invocation::new("kubectl")
            .args(["apply", "-f", "-"])
            .stdin_text("abc");
        assert_eq!(apply.display(), "kubectl apply -f - < (3 bytes)");
    }

    #[cfg(unix)]
    #[test]
    fn test_process_runner_success_and_capture() {
        let runner = ProcessRunner::new(true);
        let out = runner
            .run(&Invocation::new("sh").args(["-c", "echo hello"]))
            .unwrap();
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[cfg(unix)]
    #[test]
    fn test_process_runner_propagates_exit_status() {
        let runner = ProcessRunner::new(true);
        let err = runner
            .run(&Invocation::new("sh").args(["-c", "echo oops >&2; exit 7"]))
            .unwrap_err();

        match err {
            DeployError::ToolFailed { code, stderr, .. } => {
                assert_eq!(code, Some(7));
                assert!(stderr.contains("oops"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_process_runner_pipes_producer_output() {
        let runner = ProcessRunner::new(true);
        let producer = Invocation::new("sh").args(["-c", "printf secret"]);
        let out = runner
            .run(&Invocation::new("cat").stdin_from(producer))
            .unwrap();
        assert_eq!(out.stdout, "secret");
    }

    #[cfg(unix)]
    #[test]
    fn test_process_runner_failing_producer_stops_consumer() {
        let runner = ProcessRunner::new(true);
        let producer = Invocation::new("sh").args(["-c", "exit 4"]);
        let err = runner
            .run(&Invocation::new("cat").stdin_from(producer))
            .unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }

    #[cfg(unix)]
    #[test]
    fn test_process_runner_large_stdin_with_captured_output() {
        // Larger than a pipe buffer in both directions
        let text = "kind: ConfigMap\n".repeat(64 * 1024);
        let runner = ProcessRunner::new(true);
        let out = runner
            .run(&Invocation::new("cat").stdin_text(text.clone()))
            .unwrap();
        assert_eq!(out.stdout.len(), text.len());
    }

    #[test]
    fn test_process_runner_missing_program() {
        let runner = ProcessRunner::new(true);
        let err = runner
            .run(&Invocation::new("definitely-not-a-real-tool-xyz"))
            .unwrap_err();
        assert!(matches!(err, DeployError::ToolSpawn { .. }));
        assert_eq!(err.exit_code(), 127);
    }

    #[test]
    fn test_dry_run_runner_executes_nothing() {
        let runner = DryRunRunner;
        assert!(runner.is_dry_run());
        let out = runner
            .run(&Invocation::new("definitely-not-a-real-tool-xyz"))
            .unwrap();
        assert!(out.stdout.is_empty());
    }
}
