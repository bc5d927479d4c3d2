//! 统一执行结果模型
//!
//! 单条远端命令的完整输出。

/// 执行结果
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    /// 退出码，远端未上报时为 -1
    pub exit_code: i32,

    /// 标准输出（完整，未截断）
    pub stdout: String,

    /// 标准错误（完整，未截断）
    pub stderr: String,

    /// 执行时长（秒）
    pub duration_secs: f64,
}

impl ExecutionResult {
    /// 创建成功结果
    pub fn success(stdout: String, duration_secs: f64) -> Self {
        Self {
            exit_code: 0,
            stdout,
            stderr: String::new(),
            duration_secs,
        }
    }

    /// 创建失败结果
    pub fn failure(exit_code: i32, stdout: String, stderr: String, duration_secs: f64) -> Self {
        Self {
            exit_code,
            stdout,
            stderr,
            duration_secs,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }
}

impl Default for ExecutionResult {
    fn default() -> Self {
        Self {
            exit_code: -1,
            stdout: String::new(),
            stderr: String::new(),
            duration_secs: 0.0,
        }
    }
}
