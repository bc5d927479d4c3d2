//! SSH执行模块
//! 远程 shell 会话抽象与基于 russh 的实现

pub mod executor;

use std::time::Duration;

use async_trait::async_trait;
use common::{AppError, ExecutionResult};

pub use executor::SshSession;

/// 已打开的远程 shell，命令按调用顺序逐条执行
///
/// 远端退出码记录在 `exec` 的结果中，只有传输层问题（通道断开、超时）返回 `Err`。
#[async_trait]
pub trait RemoteShell: Send {
    async fn exec(&mut self, command: &str, timeout: Duration)
        -> Result<ExecutionResult, AppError>;

    /// 释放会话，重复调用无副作用
    async fn close(&mut self) -> Result<(), AppError>;
}
