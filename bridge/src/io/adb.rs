//! Android Debug Bridge adapter.
//!
//! The [`RemoteShell`] and [`Transfer`] traits decouple sync orchestration
//! from the `adb` executable. Tests use an in-memory device that interprets
//! the same command strings without spawning processes.
//!
//! Non-zero exit codes are returned as values; callers decide whether a step
//! is fatal. An `Err` means the tool itself could not be run.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::io::config::BridgeConfig;
use crate::io::process::{CommandOutput, run_command};

/// Exit code and captured stdout of a remote shell command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellOutput {
    pub exit_code: i32,
    pub stdout: String,
    /// Stdout was cut at the output limit; `stdout` is incomplete.
    pub truncated: bool,
}

impl ShellOutput {
    pub fn new(exit_code: i32, stdout: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            truncated: false,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs commands in the device's remote shell.
pub trait RemoteShell {
    /// Run `command`, optionally inside the `run-as` context of package `app`.
    fn run(&self, command: &str, app: Option<&str>) -> Result<ShellOutput>;
}

/// Copies files across the local/device boundary.
///
/// Only reaches paths outside app sandboxes.
pub trait Transfer {
    fn push(&self, local: &Path, remote: &str) -> Result<i32>;
    fn pull(&self, remote: &str, local: &Path) -> Result<i32>;
}

/// Wrapper for invoking an `adb` executable against one device.
#[derive(Debug, Clone)]
pub struct Adb {
    program: PathBuf,
    serial: Option<String>,
    timeout: Option<Duration>,
    output_limit_bytes: usize,
}

impl Adb {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            serial: None,
            timeout: None,
            output_limit_bytes: crate::io::config::DEFAULT_OUTPUT_LIMIT_BYTES,
        }
    }

    /// Build from config, using an already located executable.
    pub fn from_config(program: impl Into<PathBuf>, cfg: &BridgeConfig) -> Self {
        Self {
            program: program.into(),
            serial: cfg.device_serial.clone(),
            timeout: cfg.command_timeout_secs.map(Duration::from_secs),
            output_limit_bytes: cfg.output_limit_bytes,
        }
    }

    /// Full argument list for `args`, including the device selector.
    pub fn command_args(&self, args: &[OsString]) -> Vec<OsString> {
        let mut full = Vec::with_capacity(args.len() + 2);
        if let Some(serial) = &self.serial {
            full.push(OsString::from("-s"));
            full.push(OsString::from(serial));
        }
        full.extend(args.iter().cloned());
        full
    }

    /// Install (or reinstall) an application package.
    #[instrument(skip_all, fields(apk = %apk.display()))]
    pub fn install(&self, apk: &Path) -> Result<i32> {
        info!("installing package");
        let output = self.invoke(&["install".into(), "-r".into(), apk.into()])?;
        let code = output.exit_code();
        if code != 0 {
            warn!(exit_code = code, stderr = %output.stderr_lossy().trim(), "install failed");
        }
        Ok(code)
    }

    /// Stop the adb server so it does not outlive the bridge.
    #[instrument(skip_all)]
    pub fn kill_server(&self) -> Result<i32> {
        let output = self.invoke(&["kill-server".into()])?;
        Ok(output.exit_code())
    }

    fn invoke(&self, args: &[OsString]) -> Result<CommandOutput> {
        let full = self.command_args(args);
        debug!(program = %self.program.display(), args = ?full, "invoking adb");
        let mut cmd = Command::new(&self.program);
        cmd.args(&full);
        run_command(cmd, self.timeout, self.output_limit_bytes)
            .with_context(|| format!("run {}", self.program.display()))
    }
}

/// Remote shell argument for `command`, wrapped in `run-as` when an app is given.
///
/// The command runs as the app, but redirections are applied by the device
/// shell user. That is what lets `cat <app file> > <staging file>` read a
/// private file and write one that `pull` can reach.
pub fn shell_argument(command: &str, app: Option<&str>) -> String {
    match app {
        Some(package) => format!("run-as {package} {command}"),
        None => command.to_string(),
    }
}

impl RemoteShell for Adb {
    #[instrument(skip_all, fields(app = app.unwrap_or("-")))]
    fn run(&self, command: &str, app: Option<&str>) -> Result<ShellOutput> {
        let remote = shell_argument(command, app);
        let output = self.invoke(&["shell".into(), remote.into()])?;
        let exit_code = output.exit_code();
        debug!(command, exit_code, "remote shell finished");
        Ok(ShellOutput {
            exit_code,
            stdout: output.stdout_lossy(),
            truncated: output.stdout_truncated > 0,
        })
    }
}

impl Transfer for Adb {
    #[instrument(skip_all, fields(local = %local.display(), remote = %remote))]
    fn push(&self, local: &Path, remote: &str) -> Result<i32> {
        let output = self.invoke(&["push".into(), local.into(), remote.into()])?;
        let code = output.exit_code();
        if code != 0 {
            warn!(exit_code = code, stderr = %output.stderr_lossy().trim(), "push failed");
        }
        Ok(code)
    }

    #[instrument(skip_all, fields(remote = %remote, local = %local.display()))]
    fn pull(&self, remote: &str, local: &Path) -> Result<i32> {
        let output = self.invoke(&["pull".into(), remote.into(), local.into()])?;
        let code = output.exit_code();
        if code != 0 {
            warn!(exit_code = code, stderr = %output.stderr_lossy().trim(), "pull failed");
        }
        Ok(code)
    }
}
