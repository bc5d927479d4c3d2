//! 远程命令执行器
//!
//! 在控制台打印命令，在已打开的会话上执行，并回显输出尾部。远端命令失败不算错误，
//! 调用方拿到完整结果后自行决定如何展示。

use std::io::Write;
use std::time::Duration;

use common::{AppError, ExecutionResult};
use tracing::warn;

use crate::config::OutputConfig;
use crate::ssh::RemoteShell;

#[derive(Debug, Clone)]
pub struct CommandRunner {
    output: OutputConfig,
    default_timeout: Duration,
}

impl CommandRunner {
    pub fn new(output: OutputConfig, default_timeout: Duration) -> Self {
        Self {
            output,
            default_timeout,
        }
    }

    pub fn output(&self) -> &OutputConfig {
        &self.output
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// 以 `timeout`（或默认超时）执行 `command`，向 `out` 打印
    /// `>>> command`、stdout 尾部和 `STDERR:` 尾部
    pub async fn run<S, W>(
        &self,
        shell: &mut S,
        out: &mut W,
        command: &str,
        timeout: Option<Duration>,
    ) -> Result<ExecutionResult, AppError>
    where
        S: RemoteShell + ?Sized,
        W: Write,
    {
        if command.trim().is_empty() {
            return Err(AppError::validation("command must not be empty"));
        }

        writeln!(out, "\n>>> {}", command)?;
        out.flush()?;

        let result = shell
            .exec(command, timeout.unwrap_or(self.default_timeout))
            .await?;

        let shown = self.output.display(&result.stdout, &result.stderr);
        if let Some(stdout) = shown.stdout {
            writeln!(out, "{}", stdout)?;
        }
        if let Some(stderr) = shown.stderr {
            writeln!(out, "STDERR: {}", stderr)?;
        }
        out.flush()?;

        if result.is_failure() {
            warn!(
                command = %command,
                exit_code = result.exit_code,
                "Remote command failed, continuing"
            );
        }

        Ok(result)
    }
}
