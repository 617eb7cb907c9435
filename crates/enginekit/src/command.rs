//! Blocking engine command execution.

use std::ffi::OsString;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use stagekit::EngineError;
use wait_timeout::ChildExt;

use crate::classify::{classify, failure_text};

/// One engine command line, built up before it runs
#[derive(Debug, Clone)]
pub struct Invocation {
    program: PathBuf,
    args: Vec<OsString>,
    envs: Vec<(String, String)>,
    dir: Option<PathBuf>,
    stream: bool,
}

/// What a finished command left behind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            dir: None,
            stream: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Echo stdout to the terminal while it is captured.
    ///
    /// stderr is never echoed; it is kept for failure classification.
    pub fn stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn arg_list(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    /// Command line as shown to the operator
    pub fn display(&self) -> String {
        let program = self
            .program
            .file_name()
            .map_or_else(|| self.program.to_string_lossy(), |n| n.to_string_lossy());
        let mut line = program.into_owned();
        for arg in self.arg_list() {
            line.push(' ');
            line.push_str(&arg);
        }
        line
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).stdin(Stdio::null());
        for (key, value) in &self.envs {
            command.env(key, value);
        }
        if let Some(dir) = &self.dir {
            command.current_dir(dir);
        }
        command
    }

    fn spawn(&self, command: &mut Command) -> Result<Child, EngineError> {
        command.spawn().map_err(|e| EngineError::CommandFailed {
            command: self.display(),
            stderr: format!("failed to execute {}: {e}", self.program.display()),
        })
    }

    /// Run to completion, returning the output whatever the exit status.
    ///
    /// When streaming, stdout lines are echoed as they arrive and still kept.
    pub fn output(&self) -> Result<CommandOutput, EngineError> {
        log::debug!("running: {}", self.display());

        let mut command = self.command();
        command.stdout(Stdio::piped()).stderr(Stdio::piped());
        let mut child = self.spawn(&mut command)?;

        // drained separately so a full stderr pipe cannot stall stdout
        let stderr = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                pipe.read_to_end(&mut buf).map(|_| buf)
            })
        });

        let mut stdout = Vec::new();
        if let Some(pipe) = child.stdout.take() {
            if self.stream {
                let mut reader = BufReader::new(pipe);
                let mut terminal = io::stdout();
                let mut line = Vec::new();
                while reader.read_until(b'\n', &mut line)? > 0 {
                    terminal.write_all(&line)?;
                    terminal.flush()?;
                    stdout.append(&mut line);
                }
            } else {
                BufReader::new(pipe).read_to_end(&mut stdout)?;
            }
        }

        let stderr = match stderr {
            Some(reader) => reader.join().map_err(|_| {
                EngineError::Other(format!("{}: stderr reader panicked", self.display()))
            })??,
            None => Vec::new(),
        };
        let status = child.wait()?;

        let result = CommandOutput {
            code: status.code(),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        };
        log::debug!("{} exited with {:?}", self.display(), result.code);
        Ok(result)
    }

    /// Run with output discarded, killing the process once `limit` passes.
    ///
    /// `None` means the process was killed.
    pub fn status_within(&self, limit: Duration) -> Result<Option<ExitStatus>, EngineError> {
        log::debug!("running: {} (limit {}ms)", self.display(), limit.as_millis());

        let mut command = self.command();
        command.stdout(Stdio::null()).stderr(Stdio::null());
        let mut child = self.spawn(&mut command)?;

        match child.wait_timeout(limit)? {
            Some(status) => Ok(Some(status)),
            None => {
                log::debug!("{} still running, killing it", self.display());
                child.kill()?;
                child.wait()?;
                Ok(None)
            }
        }
    }

    /// Run and require a zero exit, classifying the failure otherwise.
    pub fn checked(&self) -> Result<String, EngineError> {
        let output = self.output()?;
        if output.success() {
            Ok(output.stdout)
        } else {
            let text = failure_text(&output.stderr, &output.stdout);
            Err(classify(&self.display(), &text))
        }
    }
}
