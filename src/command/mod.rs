//! Subprocess runner.
//!
//! An external collaborator per the specification: it only knows how to
//! run a shell-quoted command string, optionally piped from a preceding
//! command, in a local or remote context. Retry/backoff is a parameter the
//! *caller* opts into (the reconciler retries remote steps, never local
//! ones) rather than something this module decides on its own.
use crate::error::ManagerError;
use std::process;
use std::thread;
use std::time::Duration;


/// Where a command should run.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Context {
    /// Run as `user` on the local host, via `sudo -nu <user> bash -c "<command>"`.
    Local { user: String },
    /// Run on a remote host over ssh, via `ssh <ssh_options> [<user>@]<host> "<command>"`.
    Remote {
        host: String,
        user: Option<String>,
        ssh_options: Option<String>,
    },
}

impl Context {
    pub fn is_remote(&self) -> bool {
        matches!(self, Context::Remote { .. })
    }
}

/// A retry policy applied by callers around remote operations (§4.6).
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub fail_delay: Duration,
}

impl Default for RetryPolicy {
    /// Matches the specification's default: 3 attempts, 10 second backoff.
    fn default() -> Self {
        RetryPolicy {
            attempts: 3,
            fail_delay: Duration::from_secs(10),
        }
    }
}

pub trait Command {
    /// Runs a single command in the given context.
    fn run(&mut self, command: &str, context: &Context) -> Result<String, ManagerError>;

    /// Runs several commands, piping stdout of one into stdin of the next.
    fn run_piped(&mut self, commands: &[(&str, &Context)]) -> Result<String, ManagerError>;

    /// Runs a command with retry, per a caller-supplied policy. Only remote
    /// steps should ever be called with `Some(policy)`.
    fn run_retrying(
        &mut self,
        command: &str,
        context: &Context,
        policy: Option<RetryPolicy>,
    ) -> Result<String, ManagerError> {
        let policy = match policy {
            Some(p) => p,
            None => {
                return self.run(command, context);
            }
        };

        let mut last_err = None;
        for attempt in 0..policy.attempts {
            match self.run(command, context) {
                Ok(out) => return Ok(out),
                Err(e) => {
                    log::warn!(
                        "command `{}` failed (attempt {}/{}): {}",
                        command,
                        attempt + 1,
                        policy.attempts,
                        e
                    );
                    last_err = Some(e);
                    if attempt + 1 < policy.attempts {
                        thread::sleep(policy.fail_delay);
                    }
                }
            }
        }
        Err(last_err.expect("at least one attempt always runs"))
    }
}

#[derive(Default)]
pub struct CommandSystem {}

impl CommandSystem {
    fn run_single(
        &mut self,
        command: &str,
        context: &Context,
        pre: Option<&mut process::Child>,
    ) -> Result<process::Child, ManagerError> {
        let mut com = match context {
            Context::Local { user } => {
                let mut com = process::Command::new("sudo");
                com.arg("-nu").arg(user).arg("bash").arg("-c");
                com
            }
            Context::Remote {
                host,
                user,
                ssh_options,
            } => {
                let mut com = process::Command::new("ssh");
                if let Some(opts) = ssh_options {
                    for opt in opts.split_whitespace() {
                        com.arg(opt);
                    }
                }
                match user {
                    Some(user) => com.arg(format!("{}@{}", user, host)),
                    None => com.arg(host),
                };
                com
            }
        };

        if let Some(child) = pre {
            let stdout = child.stdout.take().ok_or_else(|| {
                ManagerError::CommandFailed {
                    command: command.to_string(),
                    code: -1,
                    stderr: "preceding command produced no stdout pipe".into(),
                }
            })?;
            com.stdin(stdout);
        }

        com.stdout(process::Stdio::piped())
            .stderr(process::Stdio::piped())
            .arg(command)
            .spawn()
            .map_err(ManagerError::Io)
    }
}

impl Command for CommandSystem {
    fn run(&mut self, command: &str, context: &Context) -> Result<String, ManagerError> {
        self.run_piped(&[(command, context)])
    }

    fn run_piped(&mut self, commands: &[(&str, &Context)]) -> Result<String, ManagerError> {
        let mut child: Option<process::Child> = None;

        for (command, context) in commands {
            child = match child {
                Some(mut c) => Some(self.run_single(command, context, Some(&mut c))?),
                None => Some(self.run_single(command, context, None)?),
            };
        }

        let last_command = commands.last().map(|(c, _)| *c).unwrap_or_default();
        let output = child
            .ok_or_else(|| ManagerError::CommandFailed {
                command: last_command.to_string(),
                code: -1,
                stderr: "no command executed".into(),
            })?
            .wait_with_output()
            .map_err(ManagerError::Io)?;

        match output.status.code() {
            Some(0) => Ok(String::from_utf8_lossy(&output.stdout).trim_end_matches('\n').to_string()),
            Some(code) => Err(ManagerError::CommandFailed {
                command: last_command.to_string(),
                code,
                stderr: String::from_utf8_lossy(&output.stderr).trim_end_matches('\n').to_string(),
            }),
            None => Err(ManagerError::CommandSignaled {
                command: last_command.to_string(),
            }),
        }
    }
}

/// A scripted fake used by unit tests: expects commands to be run in a
/// declared order and returns canned responses.
#[cfg(test)]
pub struct CommandMock {
    pub expected: std::collections::VecDeque<(String, Context)>,
    pub responses: std::collections::VecDeque<Result<String, ManagerError>>,
}

#[cfg(test)]
impl CommandMock {
    pub fn new() -> Self {
        CommandMock {
            expected: Default::default(),
            responses: Default::default(),
        }
    }

    pub fn expect(&mut self, command: &str, context: Context, response: Result<String, ManagerError>) {
        self.expected.push_back((command.to_string(), context));
        self.responses.push_back(response);
    }
}

#[cfg(test)]
impl Command for CommandMock {
    fn run(&mut self, command: &str, context: &Context) -> Result<String, ManagerError> {
        let (expected_command, expected_context) = self
            .expected
            .pop_front()
            .expect("no more commands were expected");

        assert_eq!(command, expected_command);
        assert_eq!(context, &expected_context);

        self.responses.pop_front().expect("no more responses queued")
    }

    fn run_piped(&mut self, commands: &[(&str, &Context)]) -> Result<String, ManagerError> {
        let mut last = None;
        for (command, context) in commands {
            last = Some(self.run(command, context)?);
        }
        Ok(last.unwrap_or_default())
    }
}
