use std::{
    ffi::{OsStr, OsString},
    io::{self, Read},
    os::unix::process::ExitStatusExt,
    path::PathBuf,
    process::{Command as StdCommand, Output, Stdio},
    thread,
    time::Duration,
};

use log::{debug, trace};
use strum_macros::IntoStaticStr;
use wait_timeout::ChildExt;

#[derive(Debug, thiserror::Error)]
pub enum DependencyError {
    #[error("Failed to find dependency '{dependency}': {source}")]
    NotFound {
        dependency: Dependency,
        #[source]
        source: which::Error,
    },

    #[error("Failed to execute dependency '{dependency}': {inner}")]
    CouldNotExecute {
        dependency: Dependency,
        #[source]
        inner: io::Error,
    },

    #[error("Dependency '{dependency}' did not finish within {timeout:?}\nCmdline: {rendered_command}")]
    TimedOut {
        dependency: Dependency,
        rendered_command: String,
        timeout: Duration,
    },

    #[error("Dependency '{dependency}' finished unsuccessfully: {explanation}\nCmdline: {rendered_command}\n{output}")]
    ExecutionFailed {
        dependency: Dependency,
        rendered_command: String,
        code: Option<i32>,
        signal: Option<i32>,
        explanation: String,
        output: String,
    },
}

/// Enum of runtime and test dependencies used in the code base.
#[derive(Debug, Clone, Copy, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Dependency {
    #[strum(serialize = "sg_ses")]
    SgSes,
    // Test dependencies
    #[cfg(test)]
    DoesNotExist,
    #[cfg(test)]
    Echo,
    #[cfg(test)]
    False,
    #[cfg(test)]
    Sleep,
}

impl std::fmt::Display for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.into())
    }
}

impl Dependency {
    /// Gets the name of the dependency
    ///
    /// For example, Dependency::SgSes => "sg_ses"
    pub fn name(&self) -> &'static str {
        self.into()
    }

    /// Gets the path of the dependency
    pub fn path(&self) -> Result<PathBuf, Box<DependencyError>> {
        which::which(self.name()).map_err(|source| {
            Box::new(DependencyError::NotFound {
                dependency: *self,
                source,
            })
        })
    }

    /// Converts the dependency to a new Command instance
    /// (Note this does not create a std::process::Command instance)
    pub fn cmd(&self) -> Command {
        Command {
            dependency: *self,
            args: vec![],
        }
    }
}

pub struct Command {
    dependency: Dependency,
    args: Vec<OsString>,
}

impl Command {
    pub fn arg<S: AsRef<OsStr>>(&mut self, arg: S) -> &mut Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self.arg(arg.as_ref());
        }
        self
    }

    fn render_command(&self) -> String {
        if self.args.is_empty() {
            self.dependency.to_string()
        } else {
            format!(
                "{} {}",
                self.dependency,
                self.args
                    .iter()
                    .map(|arg| arg.to_string_lossy())
                    .map(|arg| if arg.contains(' ') {
                        format!("'{arg}'")
                    } else {
                        arg.into()
                    })
                    .collect::<Vec<_>>()
                    .join(" "),
            )
        }
    }

    fn std_command(&self) -> Result<StdCommand, Box<DependencyError>> {
        let mut cmd = StdCommand::new(self.dependency.path()?);
        cmd.args(&self.args);
        Ok(cmd)
    }

    pub fn output(&self) -> Result<CommandOutput, Box<DependencyError>> {
        let mut cmd = self.std_command()?;
        let rendered_command = self.render_command();
        trace!("Executing '{rendered_command}'");
        let output = cmd
            .output()
            .map_err(|inner| DependencyError::CouldNotExecute {
                dependency: self.dependency,
                inner,
            })?;
        Ok(self.finish(rendered_command, output))
    }

    /// Runs the command, killing it if it has not exited after `timeout`.
    pub fn output_with_timeout(
        &self,
        timeout: Duration,
    ) -> Result<CommandOutput, Box<DependencyError>> {
        let mut cmd = self.std_command()?;
        let rendered_command = self.render_command();
        trace!("Executing '{rendered_command}' with a timeout of {timeout:?}");
        let could_not_execute = |inner| {
            Box::new(DependencyError::CouldNotExecute {
                dependency: self.dependency,
                inner,
            })
        };

        let mut child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(could_not_execute)?;

        // Drain both pipes while waiting so a chatty child can't block on a
        // full pipe.
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let stdout_reader = thread::spawn(move || read_pipe(stdout));
        let stderr_reader = thread::spawn(move || read_pipe(stderr));

        let status = match child.wait_timeout(timeout).map_err(could_not_execute)? {
            Some(status) => status,
            None => {
                child.kill().map_err(could_not_execute)?;
                child.wait().map_err(could_not_execute)?;
                return Err(Box::new(DependencyError::TimedOut {
                    dependency: self.dependency,
                    rendered_command,
                    timeout,
                }));
            }
        };

        let output = Output {
            status,
            stdout: stdout_reader.join().unwrap_or_default(),
            stderr: stderr_reader.join().unwrap_or_default(),
        };
        Ok(self.finish(rendered_command, output))
    }

    fn finish(&self, rendered_command: String, output: Output) -> CommandOutput {
        let output = CommandOutput {
            rendered_command,
            dependency: self.dependency,
            inner: output,
        };
        trace!(
            "Executed '{}': {}. Report:\n{}",
            output.rendered_command,
            output.explain_exit(),
            output.output_report(),
        );
        output
    }
}

fn read_pipe(pipe: Option<impl Read>) -> Vec<u8> {
    let mut buffer = Vec::new();
    if let Some(mut pipe) = pipe {
        if let Err(e) = pipe.read_to_end(&mut buffer) {
            debug!("Captured output truncated after {} byte(s): {e}", buffer.len());
        }
    }
    buffer
}

#[derive(Debug)]
pub struct CommandOutput {
    rendered_command: String,
    dependency: Dependency,
    inner: Output,
}

impl CommandOutput {
    /// Checks if the process exited successfully
    pub fn success(&self) -> bool {
        self.inner.status.success()
    }

    /// Gets the exit code of the process, if it exited normally
    pub fn code(&self) -> Option<i32> {
        self.inner.status.code()
    }

    /// Gets the signal that terminated the process, if it was terminated by a signal
    fn signal(&self) -> Option<i32> {
        self.inner.status.signal()
    }

    /// Gets stderr
    pub fn error_output(&self) -> String {
        String::from_utf8_lossy(&self.inner.stderr).into()
    }

    /// Gets stdout
    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.inner.stdout).into()
    }

    /// Gets all available output, useful for reporting or debugging
    pub fn output_report(&self) -> String {
        let stdout = self.output();
        let stderr = self.error_output();

        let mut res = String::with_capacity(stdout.len() + stderr.len() + 20);

        if !stdout.is_empty() {
            res += &format!("stdout:\n{stdout}\n");
        }

        if !stderr.is_empty() {
            if !res.is_empty() {
                res += "\n";
            }
            res += &format!("stderr:\n{stderr}\n");
        }

        res
    }

    /// Checks if the process exited successfully, otherwise produces an error
    pub fn check(&self) -> Result<(), Box<DependencyError>> {
        if self.success() {
            return Ok(());
        }

        Err(Box::new(DependencyError::ExecutionFailed {
            dependency: self.dependency,
            rendered_command: self.rendered_command.clone(),
            code: self.code(),
            signal: self.signal(),
            explanation: self.explain_exit(),
            output: match self.output_report() {
                s if !s.is_empty() => s,
                _ => "(no output collected)".into(),
            },
        }))
    }

    /// Checks if the process exited successfully and returns the output,
    /// otherwise produces an error with the output
    pub fn check_output(&self) -> Result<String, Box<DependencyError>> {
        self.check()?;
        Ok(self.output())
    }

    /// Checks if the process exited successfully and returns the raw stdout
    pub fn check_raw_stdout(self) -> Result<Vec<u8>, Box<DependencyError>> {
        self.check()?;
        Ok(self.inner.stdout)
    }

    /// Produces a string explaining the exit status of the process
    fn explain_exit(&self) -> String {
        if let Some(code) = self.code() {
            format!("exited with status: {code}")
        } else if let Some(signal) = self.signal() {
            format!("terminated by signal: {signal}")
        } else {
            "exited with unknown status".into()
        }
    }
}
