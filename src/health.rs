//! 健康报告
//!
//! 服务 `/api/health` 接口的返回内容。报告通过远程 shell 获取，交给
//! [`HealthReport::parse`] 的文本也可能是 curl 的错误信息。解析失败以值返回，
//! [`render`] 把两种结果都转换为控制台输出行。

use serde::Deserialize;
use std::fmt;

use crate::config::OutputConfig;

/// 状态标记列宽（`STALE` 最宽）
const MARKER_WIDTH: usize = 5;
/// 服务名列宽
const NAME_WIDTH: usize = 30;

#[derive(Debug, thiserror::Error)]
pub enum HealthParseError {
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct HealthSummary {
    pub ok: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ServiceHealth {
    pub name: String,
    pub key: String,
    /// 原样保留：null、数字或缺失都归为 EMPTY
    #[serde(default)]
    pub status: serde_json::Value,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, rename = "ageSeconds")]
    pub age_seconds: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct HealthReport {
    pub summary: HealthSummary,
    pub services: Vec<ServiceHealth>,
    /// 进程整体状态，例如 `"ok"`
    #[serde(default)]
    pub status: Option<String>,
    /// 进程运行时长（秒）
    #[serde(default)]
    pub uptime: Option<u64>,
}

/// 单个服务的状态分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    Ok,
    Stale,
    /// 既不是 `ok` 也不是 `stale` 的任何值，包括 null 和非字符串
    Empty,
}

impl ServiceStatus {
    pub fn marker(&self) -> &'static str {
        match self {
            ServiceStatus::Ok => "OK",
            ServiceStatus::Stale => "STALE",
            ServiceStatus::Empty => "EMPTY",
        }
    }
}

impl From<&serde_json::Value> for ServiceStatus {
    fn from(status: &serde_json::Value) -> Self {
        match status.as_str() {
            Some("ok") => ServiceStatus::Ok,
            Some("stale") => ServiceStatus::Stale,
            _ => ServiceStatus::Empty,
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 使用 pad 以支持宽度格式
        f.pad(self.marker())
    }
}

impl ServiceHealth {
    pub fn status(&self) -> ServiceStatus {
        ServiceStatus::from(&self.status)
    }

    /// `  [STALE] name                           (key)`
    pub fn line(&self) -> String {
        format!(
            "  [{:<mw$}] {:<nw$} ({})",
            self.status(),
            self.name,
            self.key,
            mw = MARKER_WIDTH,
            nw = NAME_WIDTH
        )
    }
}

impl HealthReport {
    /// 解析探测命令输出，忽略首尾空白
    pub fn parse(raw: &str) -> Result<Self, HealthParseError> {
        Ok(serde_json::from_str(raw.trim())?)
    }

    pub fn headline(&self) -> String {
        format!("Health: {}/{} OK", self.summary.ok, self.summary.total)
    }

    pub fn lines(&self) -> Vec<String> {
        std::iter::once(self.headline())
            .chain(self.services.iter().map(ServiceHealth::line))
            .collect()
    }
}

/// 解析结果对应的控制台输出：报告本身，或诊断信息加原始文本开头部分
pub fn render(
    outcome: &Result<HealthReport, HealthParseError>,
    raw: &str,
    output: &OutputConfig,
) -> Vec<String> {
    match outcome {
        Ok(report) => report.lines(),
        Err(e) => vec![
            format!("Health parse failed: {}", e),
            output.fallback(raw).to_string(),
        ],
    }
}
