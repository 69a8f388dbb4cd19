use std::ffi::OsStr;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use super::HandlerError;

/// Run an external tool to completion and return its stdout.
///
/// A non-zero exit maps to `HandlerError::Tool` carrying stderr (or stdout
/// when stderr is empty). The child is killed if the future is dropped.
pub(crate) async fn run_tool<I, S>(bin: &Path, args: I) -> Result<String, HandlerError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let tool = bin.display().to_string();
    let mut cmd = Command::new(bin);
    cmd.args(args).kill_on_drop(true);

    debug!(?cmd, "Running external tool");

    let output = cmd.output().await.map_err(|e| HandlerError::Tool {
        tool: tool.clone(),
        detail: e.to_string(),
    })?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let text = if stderr.trim().is_empty() {
            stdout.trim()
        } else {
            stderr.trim()
        };
        let detail = match output.status.code() {
            Some(code) => format!("exit status {}: {}", code, text),
            None => format!("terminated by signal: {}", text),
        };
        return Err(HandlerError::Tool { tool, detail });
    }

    Ok(stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_captures_stdout() {
        let out = run_tool(Path::new("sh"), ["-c", "echo hello"]).await.unwrap();
        assert_eq!(out, "hello\n");
    }

    #[tokio::test]
    async fn test_non_zero_exit_carries_stderr() {
        let err = run_tool(Path::new("sh"), ["-c", "echo boom >&2; exit 3"])
            .await
            .unwrap_err();

        match err {
            HandlerError::Tool { tool, detail } => {
                assert_eq!(tool, "sh");
                assert_eq!(detail, "exit status 3: boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let err = run_tool(Path::new("/nonexistent/taskworker-tool"), ["x"])
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Tool { .. }));
    }
}
