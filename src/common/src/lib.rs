//! 部署工具共享类型：错误模型、执行结果、SSH 连接配置

pub mod error;
pub mod execution;
pub mod ssh;

pub use error::AppError;
pub use execution::ExecutionResult;
pub use ssh::{HostKeyVerification, SshAuth, SshConfig};
