//! External tool runner
//!
//! The metadata decoder and telemetry normalizer are separate programs. Each
//! invocation writes one payload to the tool's stdin and collects its stdout;
//! a non-zero exit status is a rejection and stderr is kept for the log.

use std::process::Stdio;
use telex_common::config::ExternalToolConfig;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Largest stderr excerpt carried in an error message
const STDERR_EXCERPT_BYTES: usize = 2048;

/// External tool errors
#[derive(Debug, Error)]
pub enum ToolError {
    /// Program not found in PATH
    #[error("External tool not found: {0}")]
    NotFound(String),

    /// Spawning or talking to the process failed
    #[error("Failed to run {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Process exited unsuccessfully
    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },
}

/// Run a configured tool with `input` on stdin and return its stdout
pub async fn run_tool(tool: &ExternalToolConfig, input: Vec<u8>) -> Result<Vec<u8>, ToolError> {
    let program = tool.program.clone();
    let io_error = |source: std::io::Error| ToolError::Io {
        program: program.clone(),
        source,
    };

    let mut child = Command::new(&tool.program)
        .args(&tool.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ToolError::NotFound(tool.program.clone())
            } else {
                io_error(e)
            }
        })?;

    tracing::debug!(program = %tool.program, input_bytes = input.len(), "Spawned external tool");

    let mut stdin = child.stdin.take().ok_or_else(|| {
        io_error(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "stdin not captured",
        ))
    })?;

    // Feed stdin while stdout drains so large payloads cannot deadlock the pipe
    let feed = async move {
        stdin.write_all(&input).await?;
        stdin.shutdown().await
    };
    let (fed, output) = tokio::join!(feed, child.wait_with_output());
    let output = output.map_err(io_error)?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let excerpt: String = stderr.trim().chars().take(STDERR_EXCERPT_BYTES).collect();
        return Err(ToolError::Failed {
            program: tool.program.clone(),
            status: output.status.to_string(),
            stderr: excerpt,
        });
    }

    // A tool may legitimately stop reading early; only a failed feed with a
    // successful exit is suspicious enough to report.
    if let Err(e) = fed {
        if e.kind() != std::io::ErrorKind::BrokenPipe {
            return Err(io_error(e));
        }
    }

    Ok(output.stdout)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> ExternalToolConfig {
        ExternalToolConfig {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
        }
    }

    #[tokio::test]
    async fn test_stdout_is_returned() {
        let out = run_tool(&sh("cat"), b"hello".to_vec()).await.unwrap();
        assert_eq!(out, b"hello");
    }

    #[tokio::test]
    async fn test_large_payload_does_not_deadlock() {
        let payload = vec![b'x'; 4 * 1024 * 1024];
        let out = run_tool(&sh("cat"), payload.clone()).await.unwrap();
        assert_eq!(out.len(), payload.len());
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_failure_with_stderr() {
        let err = run_tool(&sh("echo 'no GPMF track' >&2; exit 3"), Vec::new())
            .await
            .unwrap_err();
        match err {
            ToolError::Failed { stderr, .. } => assert_eq!(stderr, "no GPMF track"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_program_is_not_found() {
        let tool = ExternalToolConfig {
            program: "telex-definitely-missing-tool".to_string(),
            args: Vec::new(),
        };
        let err = run_tool(&tool, Vec::new()).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }
}
