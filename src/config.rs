//! 配置系统
//! 按层加载：内置默认值 → atlas-deploy.{toml,yaml,json} → --config 文件 → 环境变量（前缀 ATLAS_DEPLOY_）
//!
//! 凭据使用 Secret 包装，防止日志泄露。

use std::path::Path;

use common::{HostKeyVerification, SshAuth, SshConfig};
use config::{Config, ConfigError, Environment, File};
use secrecy::Secret;
use serde::Deserialize;

pub const DEFAULT_REPO_DIR: &str = "/opt/stack/atlas";
pub const DEFAULT_COMPOSE_DIR: &str = "/opt/stack";
pub const DEFAULT_GIT_REMOTE: &str = "origin";
pub const DEFAULT_GIT_BRANCH: &str = "main";
pub const DEFAULT_SERVICE: &str = "atlas";
pub const DEFAULT_HEALTH_URL: &str = "https://atlas.slowhorses.net/api/health";
pub const DEFAULT_PULL_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_BUILD_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_STARTUP_WAIT_SECS: u64 = 60;

pub const DEFAULT_STDOUT_TAIL: usize = 2000;
pub const DEFAULT_STDERR_TAIL: usize = 1000;
pub const DEFAULT_FALLBACK_HEAD: usize = 500;

const ENV_PREFIX: &str = "ATLAS_DEPLOY";
const LOCAL_CONFIG_NAME: &str = "atlas-deploy";

#[derive(Debug, Clone, Deserialize)]
pub struct SshSettings {
    /// 目标主机，无默认值
    pub host: String,
    pub port: u16,
    pub username: String,
    /// SSH 密码（可选，与私钥二选一）
    #[serde(default)]
    pub password: Option<Secret<String>>,
    /// 私钥文件路径（优先于密码）
    #[serde(default)]
    pub private_key_path: Option<String>,
    #[serde(default)]
    pub private_key_passphrase: Option<Secret<String>>,
    /// 连接超时（秒）
    pub connect_timeout_secs: u64,
    /// 握手超时（秒）
    pub handshake_timeout_secs: u64,
    /// 命令执行默认超时（秒）
    pub command_timeout_secs: u64,
    /// 主机密钥验证策略（strict/accept/disabled）
    pub host_key_verification: String,
    /// 主机公钥 SHA-256 指纹（hex）
    #[serde(default)]
    pub host_key_fingerprint: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeploySettings {
    /// 源码仓库目录
    pub repo_dir: String,
    /// docker compose 项目目录
    pub compose_dir: String,
    pub git_remote: String,
    pub git_branch: String,
    /// compose 服务名
    pub service: String,
    pub health_url: String,
    pub pull_timeout_secs: u64,
    pub build_timeout_secs: u64,
    /// 未设置时使用 ssh.command_timeout_secs
    #[serde(default)]
    pub restart_timeout_secs: Option<u64>,
    /// 未设置时使用 ssh.command_timeout_secs
    #[serde(default)]
    pub health_timeout_secs: Option<u64>,
    /// 重启后等待服务启动的秒数
    pub startup_wait_secs: u64,
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            repo_dir: DEFAULT_REPO_DIR.to_string(),
            compose_dir: DEFAULT_COMPOSE_DIR.to_string(),
            git_remote: DEFAULT_GIT_REMOTE.to_string(),
            git_branch: DEFAULT_GIT_BRANCH.to_string(),
            service: DEFAULT_SERVICE.to_string(),
            health_url: DEFAULT_HEALTH_URL.to_string(),
            pull_timeout_secs: DEFAULT_PULL_TIMEOUT_SECS,
            build_timeout_secs: DEFAULT_BUILD_TIMEOUT_SECS,
            restart_timeout_secs: None,
            health_timeout_secs: None,
            startup_wait_secs: DEFAULT_STARTUP_WAIT_SECS,
        }
    }
}

/// 控制台输出截断长度（字符数）
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct OutputConfig {
    pub stdout_tail: usize,
    pub stderr_tail: usize,
    pub fallback_head: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            stdout_tail: DEFAULT_STDOUT_TAIL,
            stderr_tail: DEFAULT_STDERR_TAIL,
            fallback_head: DEFAULT_FALLBACK_HEAD,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别: trace, debug, info, warn, error
    pub level: String,
    /// 日志格式: compact, pretty, json
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub ssh: SshSettings,
    pub deploy: DeploySettings,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// 从默认值和环境变量加载配置
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// 加载配置，`path` 为必须存在的额外配置文件
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = Config::builder()
            // SSH 默认配置
            .set_default("ssh.host", "")?
            .set_default("ssh.port", 22)?
            .set_default("ssh.username", "root")?
            .set_default("ssh.connect_timeout_secs", 10)?
            .set_default("ssh.handshake_timeout_secs", 10)?
            .set_default("ssh.command_timeout_secs", 300)?
            .set_default("ssh.host_key_verification", "accept")?
            // 部署步骤默认配置
            .set_default("deploy.repo_dir", DEFAULT_REPO_DIR)?
            .set_default("deploy.compose_dir", DEFAULT_COMPOSE_DIR)?
            .set_default("deploy.git_remote", DEFAULT_GIT_REMOTE)?
            .set_default("deploy.git_branch", DEFAULT_GIT_BRANCH)?
            .set_default("deploy.service", DEFAULT_SERVICE)?
            .set_default("deploy.health_url", DEFAULT_HEALTH_URL)?
            .set_default("deploy.pull_timeout_secs", DEFAULT_PULL_TIMEOUT_SECS as i64)?
            .set_default("deploy.build_timeout_secs", DEFAULT_BUILD_TIMEOUT_SECS as i64)?
            .set_default("deploy.startup_wait_secs", DEFAULT_STARTUP_WAIT_SECS as i64)?
            // 输出截断
            .set_default("output.stdout_tail", DEFAULT_STDOUT_TAIL as i64)?
            .set_default("output.stderr_tail", DEFAULT_STDERR_TAIL as i64)?
            .set_default("output.fallback_head", DEFAULT_FALLBACK_HEAD as i64)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "compact")?
            .add_source(File::with_name(LOCAL_CONFIG_NAME).required(false));

        if let Some(path) = path {
            settings = settings.add_source(File::from(path).required(true));
        }

        // 环境变量（前缀 ATLAS_DEPLOY_，嵌套分隔符 __）
        // 值保持字符串，数值字段在反序列化时解析
        settings = settings.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        );

        let config: AppConfig = settings.build()?.try_deserialize()?;

        config.validate()?;

        Ok(config)
    }

    /// 验证配置合法性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ssh.host.trim().is_empty() {
            return Err(ConfigError::Message(format!(
                "ssh.host must be set (e.g. {}_SSH__HOST)",
                ENV_PREFIX
            )));
        }

        if self.ssh.password.is_none() && self.ssh.private_key_path.is_none() {
            return Err(ConfigError::Message(
                "either ssh.password or ssh.private_key_path must be set".to_string(),
            ));
        }

        let verification = self.host_key_verification()?;
        if verification == HostKeyVerification::Strict && self.ssh.host_key_fingerprint.is_none() {
            return Err(ConfigError::Message(
                "strict host key verification requires ssh.host_key_fingerprint".to_string(),
            ));
        }

        let timeouts = [
            ("ssh.connect_timeout_secs", self.ssh.connect_timeout_secs),
            ("ssh.handshake_timeout_secs", self.ssh.handshake_timeout_secs),
            ("ssh.command_timeout_secs", self.ssh.command_timeout_secs),
            ("deploy.pull_timeout_secs", self.deploy.pull_timeout_secs),
            ("deploy.build_timeout_secs", self.deploy.build_timeout_secs),
            (
                "deploy.restart_timeout_secs",
                self.deploy.restart_timeout_secs.unwrap_or(1),
            ),
            (
                "deploy.health_timeout_secs",
                self.deploy.health_timeout_secs.unwrap_or(1),
            ),
        ];
        for (name, value) in timeouts {
            if value == 0 {
                return Err(ConfigError::Message(format!("{} must be greater than 0", name)));
            }
        }

        let required = [
            ("deploy.repo_dir", &self.deploy.repo_dir),
            ("deploy.compose_dir", &self.deploy.compose_dir),
            ("deploy.git_remote", &self.deploy.git_remote),
            ("deploy.git_branch", &self.deploy.git_branch),
            ("deploy.service", &self.deploy.service),
            ("deploy.health_url", &self.deploy.health_url),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Message(format!("{} must not be empty", name)));
            }
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                )))
            }
        }

        match self.logging.format.to_lowercase().as_str() {
            "compact" | "pretty" | "json" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log format: {}. Must be one of: compact, pretty, json",
                    self.logging.format
                )))
            }
        }

        Ok(())
    }

    fn host_key_verification(&self) -> Result<HostKeyVerification, ConfigError> {
        self.ssh
            .host_key_verification
            .parse()
            .map_err(ConfigError::Message)
    }

    /// 构建 SSH 连接配置，私钥优先于密码
    pub fn ssh_config(&self) -> Result<SshConfig, ConfigError> {
        let auth = if let Some(ref path) = self.ssh.private_key_path {
            SshAuth::KeyFile {
                path: path.clone(),
                passphrase: self.ssh.private_key_passphrase.clone(),
            }
        } else if let Some(ref password) = self.ssh.password {
            SshAuth::Password {
                password: password.clone(),
            }
        } else {
            return Err(ConfigError::Message("no SSH credential configured".to_string()));
        };

        let mut config = SshConfig::new(self.ssh.host.clone(), self.ssh.username.clone(), auth)
            .with_port(self.ssh.port)
            .with_connect_timeout(self.ssh.connect_timeout_secs)
            .with_handshake_timeout(self.ssh.handshake_timeout_secs)
            .with_command_timeout(self.ssh.command_timeout_secs)
            .with_host_key_verification(self.host_key_verification()?);

        if let Some(ref fingerprint) = self.ssh.host_key_fingerprint {
            config = config.with_host_key_fingerprint(fingerprint.clone());
        }

        Ok(config)
    }
}
