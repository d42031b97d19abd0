// Helper functions shared by the engine and the app flow

use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command as TokioCommand;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::timeout;

use super::errors::DownloadError;

/// Run a command to completion and capture its output.
///
/// The child is killed if the returned future is dropped, so callers can put
/// a deadline around it or abort the task that owns it.
pub async fn run_output(program: &str, args: &[String]) -> Result<std::process::Output, DownloadError> {
    let mut child = TokioCommand::new(program)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => DownloadError::ToolNotFound(program.to_string()),
            _ => DownloadError::Io(format!("Failed to start {}: {}", program, e)),
        })?;

    let mut stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| DownloadError::Io(format!("Failed to capture stdout from {}", program)))?;
    let mut stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| DownloadError::Io(format!("Failed to capture stderr from {}", program)))?;

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let (out_res, err_res) = tokio::join!(
        stdout_pipe.read_to_end(&mut stdout),
        stderr_pipe.read_to_end(&mut stderr)
    );
    out_res?;
    err_res?;

    let status = child.wait().await?;
    Ok(std::process::Output {
        status,
        stdout,
        stderr,
    })
}

/// Outcome of waiting on a task for a bounded time
#[derive(Debug)]
pub enum Waited<T> {
    Done(T),
    /// The deadline passed; the task keeps running and can be waited on again
    Expired,
}

/// Wait up to `limit` for a spawned task without cancelling it on expiry.
pub async fn wait_with_deadline<T>(
    handle: &mut JoinHandle<T>,
    limit: Duration,
) -> Result<Waited<T>, JoinError> {
    match timeout(limit, handle).await {
        Ok(joined) => joined.map(Waited::Done),
        Err(_) => Ok(Waited::Expired),
    }
}

/// Human duration like `4m 5s` (`1h 2m 3s` past an hour)
pub fn format_duration(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;
    if hours > 0 {
        format!("{}h {}m {}s", hours, mins, secs)
    } else {
        format!("{}m {}s", mins, secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0m 0s");
        assert_eq!(format_duration(245), "4m 5s");
        assert_eq!(format_duration(3723), "1h 2m 3s");
    }

    #[tokio::test]
    async fn test_wait_with_deadline_can_wait_again() {
        let mut handle = tokio::spawn(async {
            tokio::time::sleep(Duration::from_millis(150)).await;
            42
        });

        let first = wait_with_deadline(&mut handle, Duration::from_millis(10)).await.unwrap();
        assert!(matches!(first, Waited::Expired));

        let second = wait_with_deadline(&mut handle, Duration::from_secs(5)).await.unwrap();
        assert!(matches!(second, Waited::Done(42)));
    }

    #[tokio::test]
    async fn test_missing_program_is_tool_not_found() {
        let err = run_output("definitely-not-a-real-binary-xyz", &[]).await.unwrap_err();
        assert!(matches!(err, DownloadError::ToolNotFound(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_output_captures_both_streams() {
        let args = vec!["-c".to_string(), "echo out; echo err >&2".to_string()];
        let output = run_output("sh", &args).await.unwrap();
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout), "out\n");
        assert_eq!(String::from_utf8_lossy(&output.stderr), "err\n");
    }
}
