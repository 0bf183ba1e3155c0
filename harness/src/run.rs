use anyhow::{anyhow, Context, Result};
use log::debug;

use subprocess::{ExitStatus, Popen, PopenConfig, Redirection};
use tempfile::NamedTempFile;
use std::{fs, path::{Path, PathBuf}, time::Duration};

pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Result of a program invocation.
pub struct RunResult {
    /// The result.
    pub output: String,
    /// `true` if the script accepted the program (exit status 0).
    pub compilation: bool,
    /// `true` if the script finished before the timeout.
    pub termination: bool
}

/// A script under test. It is invoked as `script <file>` where `<file>`
/// holds one rendered program.
pub struct Runner {
    script: PathBuf,
    timeout: Duration,
}

impl Runner {
    pub fn new(script: &Path, timeout: Option<u64>) -> Result<Self> {
        if !script.exists() {
            return Err(anyhow!("script `{}` does not exist", script.display()));
        }
        Ok(Self {
            script: script.to_path_buf(),
            timeout: Duration::from_secs(timeout.unwrap_or(DEFAULT_TIMEOUT_SECS)),
        })
    }

    /// Run the script on `program` for a bounded amount of time.
    ///
    /// stderr is ignored and stdout is returned. A script still running at
    /// the deadline is terminated and reported as not terminating.
    pub fn run(&self, program: &str) -> Result<RunResult> {
        // Dump the program to a temporary file
        let file: NamedTempFile = tempfile::Builder::new().suffix(".py").tempfile()?;
        fs::write(&file, program)?;

        let script = self.script.to_str()
            .ok_or(anyhow!("Unable to coerce script path into string."))?;
        let path = file.path().to_str()
            .ok_or(anyhow!("Unable to coerce temp path into string."))?;
        let mut p = Popen::create(
            &[script, path],
            PopenConfig {
                stdout: Redirection::Pipe,
                ..Default::default()
            },
        ).with_context(|| format!("failed to spawn `{script}`"))?;

        let mut communicator = p.communicate_start(None).limit_time(self.timeout);
        let output = match communicator.read_string() {
            Ok((out, _)) => out,
            Err(err) => err.capture.0.map(|f| String::from_utf8_lossy(&f).into_owned()),
        }.unwrap_or_default();

        let (termination, compilation) =
            if let Some(exit_status) = p.poll() {
                match exit_status {
                    ExitStatus::Exited(s) => (true, s == 0),
                    _ => (true, true)
                }
            } else {
                p.terminate()?;
                (false, true)
            };
        debug!("{}: terminated {termination}, exit ok {compilation}", self.script.display());

        Ok(RunResult {
            output,
            termination,
            compilation
        })
    }
}
