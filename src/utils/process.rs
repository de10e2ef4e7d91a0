// src/utils/process.rs: external process execution

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use log::debug;
use tokio::process::Command;

use crate::config::defs::PipelineError;

/// Captured result of one external tool call. Spawn failures and timeouts
/// surface as errors; a non-zero exit is reported here and left to the
/// caller's policy.
#[derive(Debug)]
pub struct ToolOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs one external tool to completion, capturing stdout and stderr.
///
/// # Arguments
/// * `tool` - Executable name, resolved via PATH.
/// * `args` - Full argument vector.
/// * `cwd` - Working directory for the child, if it must differ from ours.
/// * `envs` - Extra environment entries for the child.
/// * `timeout` - Hard deadline; the child is killed when it expires.
///
/// # Returns
/// The captured output, including the exit code.
pub async fn run_tool(
    tool: &str,
    args: &[String],
    cwd: Option<&Path>,
    envs: &[(&str, String)],
    timeout: Option<Duration>,
) -> Result<ToolOutput, PipelineError> {
    debug!("Running: {} {}", tool, args.join(" "));

    let mut cmd = Command::new(tool);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    for (key, value) in envs {
        cmd.env(key, value);
    }

    let output = match timeout {
        Some(limit) => tokio::time::timeout(limit, cmd.output())
            .await
            .map_err(|_| PipelineError::ToolTimeout {
                tool: tool.to_string(),
                seconds: limit.as_secs(),
            })?,
        None => cmd.output().await,
    }
    .map_err(|e| PipelineError::ToolExecution {
        tool: tool.to_string(),
        error: format!("{}. Is {} installed?", e, tool),
    })?;

    Ok(ToolOutput {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Turns a non-zero exit into a structured error carrying the stderr tail.
pub fn ensure_success(tool: &str, output: &ToolOutput) -> Result<(), PipelineError> {
    if output.success() {
        return Ok(());
    }
    Err(PipelineError::ToolFailed {
        tool: tool.to_string(),
        code: output.code,
        stderr: stderr_tail(&output.stderr),
    })
}

fn stderr_tail(stderr: &str) -> String {
    const MAX_LINES: usize = 20;
    let lines: Vec<&str> = stderr.trim_end().lines().collect();
    if lines.len() <= MAX_LINES {
        lines.join("\n")
    } else {
        lines[lines.len() - MAX_LINES..].join("\n")
    }
}
