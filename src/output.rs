//! 输出截断
//!
//! 按字符而非字节计数，截断点不会落在多字节字符中间。

use crate::config::OutputConfig;

/// `text` 的最后 `max_chars` 个字符，不足时返回全部
pub fn tail_chars(text: &str, max_chars: usize) -> &str {
    if max_chars == 0 {
        return "";
    }
    match text.char_indices().rev().nth(max_chars - 1) {
        Some((start, _)) => &text[start..],
        None => text,
    }
}

/// `text` 的前 `max_chars` 个字符，不足时返回全部
pub fn head_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// 单条命令结束后在控制台显示的内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayedOutput<'a> {
    /// stdout 为空白时为 None
    pub stdout: Option<&'a str>,
    /// stderr 为空白时为 None
    pub stderr: Option<&'a str>,
}

impl OutputConfig {
    /// 对命令输出应用尾部截断
    pub fn display<'a>(&self, stdout: &'a str, stderr: &'a str) -> DisplayedOutput<'a> {
        DisplayedOutput {
            stdout: (!stdout.trim().is_empty()).then(|| tail_chars(stdout, self.stdout_tail)),
            stderr: (!stderr.trim().is_empty()).then(|| tail_chars(stderr, self.stderr_tail)),
        }
    }

    /// 无法解析时显示的原始文本开头部分
    pub fn fallback<'a>(&self, raw: &'a str) -> &'a str {
        head_chars(raw, self.fallback_head)
    }
}
