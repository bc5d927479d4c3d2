//! 测试辅助模块
//! 脚本化的 SSH 会话替身

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use atlas_deploy::{
    config::{DeploySettings, OutputConfig},
    deploy::{DeployPlan, Deployer},
    runner::CommandRunner,
    ssh::RemoteShell,
};
use common::{AppError, ExecutionResult};

/// 脚本化 shell 收到的调用记录
#[derive(Debug, Default)]
pub struct ShellLog {
    pub commands: Vec<(String, Duration)>,
    pub close_calls: usize,
}

/// 每次 `exec` 返回下一条预设结果，用完后返回空的成功结果
pub struct ScriptedShell {
    replies: VecDeque<Result<ExecutionResult, AppError>>,
    closed: bool,
    pub log: Arc<Mutex<ShellLog>>,
}

impl ScriptedShell {
    pub fn new(replies: Vec<Result<ExecutionResult, AppError>>) -> Self {
        Self {
            replies: replies.into(),
            closed: false,
            log: Arc::new(Mutex::new(ShellLog::default())),
        }
    }

    pub fn log(&self) -> Arc<Mutex<ShellLog>> {
        Arc::clone(&self.log)
    }
}

#[async_trait]
impl RemoteShell for ScriptedShell {
    async fn exec(
        &mut self,
        command: &str,
        timeout: Duration,
    ) -> Result<ExecutionResult, AppError> {
        if self.closed {
            return Err(AppError::execution("session already closed"));
        }
        self.log
            .lock()
            .unwrap()
            .commands
            .push((command.to_string(), timeout));
        self.replies
            .pop_front()
            .unwrap_or_else(|| Ok(ExecutionResult::success(String::new(), 0.0)))
    }

    async fn close(&mut self) -> Result<(), AppError> {
        self.closed = true;
        self.log.lock().unwrap().close_calls += 1;
        Ok(())
    }
}

pub fn ok(stdout: &str) -> Result<ExecutionResult, AppError> {
    Ok(ExecutionResult::success(stdout.to_string(), 0.1))
}

pub fn failed(exit_code: i32, stdout: &str, stderr: &str) -> Result<ExecutionResult, AppError> {
    Ok(ExecutionResult::failure(
        exit_code,
        stdout.to_string(),
        stderr.to_string(),
        0.1,
    ))
}

pub fn default_runner() -> CommandRunner {
    CommandRunner::new(OutputConfig::default(), Duration::from_secs(300))
}

/// 去掉启动等待的默认计划
pub fn test_deployer() -> Deployer {
    let settings = DeploySettings {
        startup_wait_secs: 0,
        ..DeploySettings::default()
    };
    Deployer::new(DeployPlan::from_settings(&settings), default_runner())
}

pub fn console(buf: Vec<u8>) -> String {
    String::from_utf8(buf).expect("console output is utf-8")
}
