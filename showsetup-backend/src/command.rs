//! `p4` command builder.
//!
//! Every Perforce call goes through [`P4Command`]: global connection options
//! first, then the subcommand and its arguments, with an optional form piped
//! to stdin. A non-zero exit becomes a [`BackendFault`] carrying stderr.

use duct::cmd;
use tracing::debug;

use crate::{BackendFault, Result};

/// How to reach the Perforce server. Unset fields fall back to the `p4`
/// environment (`P4PORT`, `P4USER`, `P4CLIENT`, `.p4config`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub binary: String,
    pub port: Option<String>,
    pub user: Option<String>,
    pub client: Option<String>,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            binary: "p4".to_string(),
            port: None,
            user: None,
            client: None,
        }
    }
}

impl ConnectionSettings {
    /// Global options placed before the subcommand.
    pub fn global_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        for (flag, value) in [("-p", &self.port), ("-u", &self.user), ("-c", &self.client)] {
            if let Some(value) = value {
                args.push(flag.to_string());
                args.push(value.clone());
            }
        }
        args
    }
}

#[derive(Debug, Clone)]
pub struct P4Command<'a> {
    settings: &'a ConnectionSettings,
    args: Vec<String>,
    input: Option<String>,
}

impl<'a> P4Command<'a> {
    pub fn new(settings: &'a ConnectionSettings, subcommand: &str) -> Self {
        Self {
            settings,
            args: vec![subcommand.to_string()],
            input: None,
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
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

    /// Pipe `form` to the command's stdin (for `-i` subcommands).
    pub fn input(mut self, form: String) -> Self {
        self.input = Some(form);
        self
    }

    /// Full argument vector, global options included.
    pub fn argv(&self) -> Vec<String> {
        let mut argv = self.settings.global_args();
        argv.extend(self.args.iter().cloned());
        argv
    }

    /// Run the command and return its stdout. `operation` names the gateway
    /// operation in any fault.
    pub fn run(self, operation: &str) -> Result<String> {
        let argv = self.argv();
        debug!("Executing {} {}", self.settings.binary, argv.join(" "));

        let mut expression = cmd(&self.settings.binary, &argv)
            .stdout_capture()
            .stderr_capture()
            .unchecked();
        if let Some(input) = self.input {
            expression = expression.stdin_bytes(input.into_bytes());
        }

        let output = expression.run().map_err(|e| {
            BackendFault::new(
                operation,
                format!("Failed to execute {}: {}", self.settings.binary, e),
            )
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if output.status.success() {
            return Ok(stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = if stderr.trim().is_empty() {
            stdout.trim().to_string()
        } else {
            stderr.trim().to_string()
        };
        debug!("{} exited with {}: {}", self.settings.binary, output.status, message);
        Err(BackendFault::new(operation, message))
    }
}
