//! 统一错误模型
//!
//! 连接、认证、驱动远端主机时产生的错误。远端命令返回非零退出码不算错误，
//! 它记录在 [`crate::execution::ExecutionResult`] 中。

#[derive(Debug, Clone, thiserror::Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("SSH connection error: {0}")]
    SshConnectionError(String),

    #[error("SSH authentication failed: {0}")]
    SshAuthenticationError(String),

    #[error("SSH execution error: {0}")]
    SshExecutionError(String),

    #[error("IO error: {0}")]
    IoError(String),
}

impl AppError {
    // 便捷方法
    pub fn validation(msg: &str) -> Self {
        AppError::Validation(msg.to_string())
    }

    pub fn timeout(msg: &str) -> Self {
        AppError::Timeout(msg.to_string())
    }

    pub fn execution(msg: &str) -> Self {
        AppError::SshExecutionError(msg.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::IoError(e.to_string())
    }
}
