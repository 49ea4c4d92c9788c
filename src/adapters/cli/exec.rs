//! Child process invocation for vendor tools
//!
//! The executable is the whole interface: an argument vector in, captured
//! stdout/stderr and an exit status out, no interactive input. Children are
//! spawned with `kill_on_drop` so that a timed-out or cancelled operation
//! reaps its process when the in-flight future is dropped.

use crate::error::{Error, Result};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Captured output of one tool invocation
#[derive(Debug)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Run the tool once and map the exit status
///
/// A spawn failure (vanished executable, permission change) maps to
/// `BackendUnavailable`; a non-zero exit maps to `BackendCommand` carrying
/// the captured stderr. Zero-exit output is returned as-is for parsing.
pub async fn run_tool(path: &Path, args: &[String], backend: &str) -> Result<ToolOutput> {
    debug!(tool = %path.display(), ?args, "invoking vendor tool");

    let output = Command::new(path)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| Error::BackendUnavailable {
            backend: backend.to_string(),
            reason: format!("failed to run {}: {}", path.display(), e),
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        let code = output
            .status
            .code()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        return Err(Error::BackendCommand {
            backend: backend.to_string(),
            code,
            message: if stderr.trim().is_empty() {
                stdout.trim().to_string()
            } else {
                stderr.trim().to_string()
            },
        });
    }

    Ok(ToolOutput { stdout, stderr })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::fs;
    use std::path::PathBuf;

    #[cfg(unix)]
    fn script(body: &str) -> (tempfile::TempDir, PathBuf) {
        use std::os::unix::fs::PermissionsExt;
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("tool");
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        (tmp, path)
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_zero_exit_returns_stdout() {
        let (_tmp, path) = script("echo 'System: S1'");
        let out = run_tool(&path, &[], "cli").await.unwrap();
        assert_eq!(out.stdout.trim(), "System: S1");
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_nonzero_exit_carries_stderr() {
        let (_tmp, path) = script("echo 'controller not responding' >&2; exit 3");
        let err = run_tool(&path, &[], "cli").await.unwrap_err();
        assert_matches!(err, Error::BackendCommand { ref code, ref message, .. }
            if code == "3" && message.contains("controller not responding"));
    }

    #[tokio::test]
    async fn test_vanished_executable_is_unavailable() {
        let err = run_tool(Path::new("/nonexistent/tool"), &[], "cli")
            .await
            .unwrap_err();
        assert_matches!(err, Error::BackendUnavailable { .. });
    }
}
