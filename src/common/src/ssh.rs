//! SSH 配置模型
//!
//! 部署目标主机的连接配置。凭据使用 [`Secret`] 包装，`{:?}` 不会打印出来。

use secrecy::Secret;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 主机密钥验证策略
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HostKeyVerification {
    /// 严格模式：必须预先配置主机密钥指纹
    Strict,
    /// 接受模式：未配置指纹时接受任意密钥，配置后必须匹配
    #[default]
    Accept,
    /// 禁用验证
    Disabled,
}

impl std::str::FromStr for HostKeyVerification {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "accept" => Ok(Self::Accept),
            "disabled" | "none" | "false" => Ok(Self::Disabled),
            _ => Err(format!("Unknown host key verification mode: {}", s)),
        }
    }
}

/// SSH 认证方式
#[derive(Debug, Clone)]
pub enum SshAuth {
    /// 密码认证
    Password { password: Secret<String> },
    /// 私钥文件认证
    KeyFile {
        /// 私钥文件路径（OpenSSH/PEM 格式）
        path: String,
        /// 私钥密码（如果有）
        passphrase: Option<Secret<String>>,
    },
}

/// SSH 连接配置
#[derive(Debug, Clone)]
pub struct SshConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub auth: SshAuth,

    /// 连接超时（秒）
    pub connect_timeout_secs: u64,

    /// 握手超时（秒）
    pub handshake_timeout_secs: u64,

    /// 命令执行默认超时（秒）
    pub command_timeout_secs: u64,

    pub host_key_verification: HostKeyVerification,

    /// 主机公钥的 SHA-256 指纹（hex）
    pub host_key_fingerprint: Option<String>,
}

pub const DEFAULT_SSH_PORT: u16 = 22;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 300;

impl SshConfig {
    pub fn new(host: String, username: String, auth: SshAuth) -> Self {
        Self {
            host,
            port: DEFAULT_SSH_PORT,
            username,
            auth,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            handshake_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
            host_key_verification: HostKeyVerification::default(),
            host_key_fingerprint: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_connect_timeout(mut self, timeout_secs: u64) -> Self {
        self.connect_timeout_secs = timeout_secs;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout_secs: u64) -> Self {
        self.handshake_timeout_secs = timeout_secs;
        self
    }

    pub fn with_command_timeout(mut self, timeout_secs: u64) -> Self {
        self.command_timeout_secs = timeout_secs;
        self
    }

    pub fn with_host_key_verification(mut self, verification: HostKeyVerification) -> Self {
        self.host_key_verification = verification;
        self
    }

    pub fn with_host_key_fingerprint(mut self, fingerprint: String) -> Self {
        self.host_key_fingerprint = Some(fingerprint.to_lowercase());
        self
    }

    /// 获取目标地址字符串
    pub fn target(&self) -> String {
        format!("{}@{}:{}", self.username, self.host, self.port)
    }

    /// TCP 建连超时
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// SSH 握手超时，从 TCP 连接建立后开始计时
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    /// 命令未指定超时时使用的默认值
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn password_config(host: &str, password: &str) -> SshConfig {
        SshConfig::new(
            host.to_string(),
            "root".to_string(),
            SshAuth::Password {
                password: Secret::new(password.to_string()),
            },
        )
    }

    #[test]
    fn test_host_key_verification_default() {
        assert_eq!(HostKeyVerification::default(), HostKeyVerification::Accept);
    }

    #[test]
    fn test_host_key_verification_from_str() {
        assert_eq!("strict".parse::<HostKeyVerification>().unwrap(), HostKeyVerification::Strict);
        assert_eq!("ACCEPT".parse::<HostKeyVerification>().unwrap(), HostKeyVerification::Accept);
        assert_eq!("none".parse::<HostKeyVerification>().unwrap(), HostKeyVerification::Disabled);
        assert!("sometimes".parse::<HostKeyVerification>().is_err());
    }

    #[test]
    fn test_ssh_config_new_defaults() {
        let config = password_config("deploy.example.net", "pass");

        assert_eq!(config.port, 22);
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.handshake_timeout(), Duration::from_secs(10));
        assert_eq!(config.command_timeout(), Duration::from_secs(300));
        assert!(config.host_key_fingerprint.is_none());
    }

    #[test]
    fn test_password_not_in_debug_output() {
        let config = password_config("deploy.example.net", "hunter2-very-secret");

        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2-very-secret"));
        match &config.auth {
            SshAuth::Password { password } => {
                assert_eq!(password.expose_secret(), "hunter2-very-secret")
            }
            _ => panic!("Expected Password auth"),
        }
    }

    #[test]
    fn test_key_file_passphrase_not_in_debug_output() {
        let config = SshConfig::new(
            "deploy.example.net".to_string(),
            "deploy".to_string(),
            SshAuth::KeyFile {
                path: "/home/deploy/.ssh/id_ed25519".to_string(),
                passphrase: Some(Secret::new("phrase-very-secret".to_string())),
            },
        );

        let debug = format!("{:?}", config);
        assert!(debug.contains("/home/deploy/.ssh/id_ed25519"));
        assert!(!debug.contains("phrase-very-secret"));
    }

    #[test]
    fn test_ssh_config_builder() {
        let config = password_config("host", "pass")
            .with_port(2222)
            .with_connect_timeout(30)
            .with_handshake_timeout(5)
            .with_command_timeout(600)
            .with_host_key_verification(HostKeyVerification::Strict)
            .with_host_key_fingerprint("ABCDEF".to_string());

        assert_eq!(config.port, 2222);
        assert_eq!(config.command_timeout_secs, 600);
        assert_eq!(config.host_key_verification, HostKeyVerification::Strict);
        assert_eq!(config.host_key_fingerprint.as_deref(), Some("abcdef"));
    }

    #[test]
    fn test_connect_and_handshake_timeouts_are_independent() {
        let config = password_config("host", "pass")
            .with_connect_timeout(30)
            .with_handshake_timeout(5);
        assert_eq!(config.connect_timeout(), Duration::from_secs(30));
        assert_eq!(config.handshake_timeout(), Duration::from_secs(5));

        let config = config.with_connect_timeout(2).with_handshake_timeout(45);
        assert_eq!(config.connect_timeout(), Duration::from_secs(2));
        assert_eq!(config.handshake_timeout(), Duration::from_secs(45));
    }

    #[test]
    fn test_ssh_config_target() {
        let config = password_config("example.com", "pass");
        assert_eq!(config.target(), "root@example.com:22");
        assert_eq!(config.with_port(2222).target(), "root@example.com:2222");
    }

    #[test]
    fn test_host_key_verification_serialization() {
        let json = serde_json::to_string(&HostKeyVerification::Disabled).unwrap();
        assert_eq!(json, "\"disabled\"");
    }
}
