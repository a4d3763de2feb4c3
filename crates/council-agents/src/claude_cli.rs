use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::AgentError;

/// Configuration for a Claude CLI invocation.
#[derive(Debug, Clone)]
pub struct ClaudeCliConfig {
    pub model: String,
    pub timeout: Duration,
}

impl Default for ClaudeCliConfig {
    fn default() -> Self {
        Self {
            model: "claude-3-5-haiku-latest".to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

/// Invoke the `claude` CLI in print mode and return its stdout.
///
/// The user prompt goes through stdin: debate transcripts quickly outgrow argv limits.
pub async fn invoke_claude(
    system_prompt: &str,
    user_prompt: &str,
    config: &ClaudeCliConfig,
) -> Result<String, AgentError> {
    debug!(model = %config.model, prompt_len = user_prompt.len(), "Invoking claude CLI");

    let mut command = Command::new("claude");
    command.args([
        "-p",
        "--system-prompt",
        system_prompt,
        "--model",
        &config.model,
        "--output-format",
        "text",
    ]);
    let result = run_with_stdin(command, user_prompt.as_bytes(), config.timeout).await?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        warn!(status = %result.status, stderr = %stderr, "Claude CLI failed");
        return Err(AgentError::Cli(format!(
            "claude exited {}: {}",
            result.status, stderr
        )));
    }

    let stdout = String::from_utf8_lossy(&result.stdout).to_string();
    if stdout.trim().is_empty() {
        return Err(AgentError::Cli("Claude returned empty response".to_string()));
    }

    Ok(stdout)
}

/// Spawn `command`, feed it `input` on stdin and collect its output.
///
/// The timeout covers the stdin write as well as the wait: a child that never
/// drains its stdin must not block past `timeout`.
pub(crate) async fn run_with_stdin(
    mut command: Command,
    input: &[u8],
    timeout: Duration,
) -> Result<Output, AgentError> {
    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| AgentError::Cli(format!("Failed to spawn claude: {e}")))?;

    let stdin = child.stdin.take();
    let write = async move {
        if let Some(mut stdin) = stdin {
            stdin.write_all(input).await?;
            // Closing the pipe signals end of prompt.
            drop(stdin);
        }
        Ok::<(), std::io::Error>(())
    };

    let (written, output) = tokio::time::timeout(timeout, async move {
        tokio::join!(write, child.wait_with_output())
    })
    .await
    .map_err(|_| AgentError::Timeout(timeout.as_secs()))?;

    let output = output.map_err(|e| AgentError::Cli(format!("Failed to wait for claude: {e}")))?;
    match written {
        // An early exit closes the pipe; the exit status carries the real failure.
        Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
            warn!("claude exited before reading the whole prompt");
        }
        Err(e) => return Err(AgentError::Cli(format!("Failed to write prompt: {e}"))),
        Ok(()) => {}
    }
    Ok(output)
}

/// Check if the `claude` CLI is available on the system.
pub async fn check_cli_available() -> bool {
    match Command::new("claude").arg("--version").output().await {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ClaudeCliConfig::default();
        assert_eq!(config.model, "claude-3-5-haiku-latest");
        assert_eq!(config.timeout, Duration::from_secs(120));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_covers_a_child_that_never_reads_stdin() {
        let mut command = Command::new("sleep");
        command.arg("20");
        // Far larger than any pipe buffer, so the write cannot finish on its own.
        let prompt = vec![b'x'; 4 << 20];

        let started = std::time::Instant::now();
        let result = tokio::time::timeout(
            Duration::from_secs(10),
            run_with_stdin(command, &prompt, Duration::from_secs(1)),
        )
        .await
        .expect("configured timeout should fire before the guard");

        assert!(matches!(result, Err(AgentError::Timeout(1))));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn large_prompt_is_streamed_while_output_is_read() {
        let prompt = "debate turn\n".repeat(200_000);
        let output = run_with_stdin(Command::new("cat"), prompt.as_bytes(), Duration::from_secs(10))
            .await
            .unwrap();

        assert!(output.status.success());
        assert_eq!(output.stdout.len(), prompt.len());
    }
}
