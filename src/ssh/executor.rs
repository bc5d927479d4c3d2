//! SSH执行器模块
//! 使用 russh 建立一次连接，在同一会话上依次执行命令

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use russh::client;
use russh::client::Config;
use russh::ChannelMsg;
use russh_keys::key::PublicKey;
use russh_keys::load_secret_key;
use russh_keys::PublicKeyBase64;
use secrecy::ExposeSecret;
use sha2::Digest;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use common::{AppError, ExecutionResult, HostKeyVerification, SshAuth, SshConfig};

use super::RemoteShell;

/// SSH_EXTENDED_DATA_STDERR
const STDERR_EXT: u32 = 1;

/// 已认证的 SSH 会话，命令按调用顺序在同一连接上执行
pub struct SshSession {
    config: SshConfig,
    handle: Option<client::Handle<HostKeyChecker>>,
}

impl SshSession {
    /// 建立连接并认证
    ///
    /// 主机不可达、握手超时或主机密钥被拒绝时返回 `SshConnectionError`，
    /// 凭据被拒绝时返回 `SshAuthenticationError`。
    pub async fn connect(config: SshConfig) -> Result<Self, AppError> {
        debug!(
            host = %config.host,
            port = %config.port,
            user = %config.username,
            "Connecting SSH session"
        );

        let client_config = Arc::new(Config {
            preferred: russh::Preferred::default(),
            ..Default::default()
        });

        let checker = HostKeyChecker {
            verification_mode: config.host_key_verification.clone(),
            expected_fingerprint: config.host_key_fingerprint.clone(),
            host: config.host.clone(),
            port: config.port,
        };

        let stream = timeout(
            config.connect_timeout(),
            TcpStream::connect((config.host.as_str(), config.port)),
        )
        .await
        .map_err(|_| {
            AppError::SshConnectionError(format!(
                "连接超时 ({}s): {}",
                config.connect_timeout().as_secs(),
                config.target()
            ))
        })?
        .map_err(|e| {
            error!(error = %e, "TCP连接失败");
            AppError::SshConnectionError(format!("TCP连接失败: {}", e))
        })?;

        let mut handle = timeout(
            config.handshake_timeout(),
            client::connect_stream(client_config, stream, checker),
        )
        .await
        .map_err(|_| {
            AppError::SshConnectionError(format!(
                "握手超时 ({}s): {}",
                config.handshake_timeout().as_secs(),
                config.target()
            ))
        })?
        .map_err(|e| {
            error!(error = %e, "SSH连接失败");
            if e.to_string().contains("Host key") || e.to_string().contains("fingerprint") {
                AppError::SshConnectionError(format!("主机密钥验证失败: {}", e))
            } else {
                AppError::SshConnectionError(format!("SSH连接失败: {}", e))
            }
        })?;

        let authenticated = match &config.auth {
            SshAuth::Password { password } => {
                handle
                    .authenticate_password(config.username.clone(), password.expose_secret())
                    .await
            }
            SshAuth::KeyFile { path, passphrase } => {
                let key = load_secret_key(
                    path,
                    passphrase.as_ref().map(|p| p.expose_secret().as_str()),
                )
                .map_err(|e| {
                    error!(error = %e, path = %path, "加载SSH私钥失败");
                    AppError::SshAuthenticationError(format!("加载私钥失败: {}", e))
                })?;

                handle
                    .authenticate_publickey(config.username.clone(), Arc::new(key))
                    .await
            }
        };

        check_auth(authenticated, &config.target())?;

        info!(remote = %config.target(), "SSH session established");

        Ok(Self {
            config,
            handle: Some(handle),
        })
    }
}

/// 认证结果：服务端拒绝凭据是认证错误，认证过程中传输层出错是连接错误
fn check_auth(outcome: Result<bool, russh::Error>, target: &str) -> Result<(), AppError> {
    match outcome {
        Ok(true) => Ok(()),
        Ok(false) => {
            error!(remote = %target, "SSH认证失败");
            Err(AppError::SshAuthenticationError(target.to_string()))
        }
        Err(e) => {
            error!(remote = %target, error = %e, "认证过程中连接中断");
            Err(AppError::SshConnectionError(format!(
                "认证过程中连接中断 ({}): {}",
                target, e
            )))
        }
    }
}

#[async_trait]
impl RemoteShell for SshSession {
    async fn exec(
        &mut self,
        command: &str,
        command_timeout: Duration,
    ) -> Result<ExecutionResult, AppError> {
        let handle = self
            .handle
            .as_mut()
            .ok_or_else(|| AppError::execution("session already closed"))?;
        let start_time = Instant::now();

        debug!(host = %self.config.host, command = %command, "Executing SSH command");

        let mut channel = handle.channel_open_session().await.map_err(|e| {
            error!(error = %e, "打开SSH通道失败");
            AppError::SshExecutionError(format!("打开SSH通道失败: {}", e))
        })?;

        channel.exec(true, command).await.map_err(|e| {
            error!(error = %e, "执行命令失败");
            AppError::SshExecutionError(format!("执行命令失败: {}", e))
        })?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_status: Option<u32> = None;

        // 超时作用于每次等待通道消息
        loop {
            match timeout(command_timeout, channel.wait()).await {
                Ok(Some(ChannelMsg::Data { ref data })) => {
                    stdout.extend_from_slice(data);
                }
                Ok(Some(ChannelMsg::ExtendedData { ref data, ext })) => {
                    if ext == STDERR_EXT {
                        stderr.extend_from_slice(data);
                    }
                }
                Ok(Some(ChannelMsg::ExitStatus { exit_status: status })) => {
                    exit_status = Some(status);
                }
                Ok(Some(ChannelMsg::Close)) | Ok(None) => break,
                Ok(Some(_)) => {}
                Err(_) => {
                    warn!(
                        command = %command,
                        timeout_secs = command_timeout.as_secs(),
                        "命令执行超时"
                    );
                    let _ = channel.close().await;
                    return Err(AppError::timeout(&format!(
                        "`{}` produced no output for {}s",
                        command,
                        command_timeout.as_secs()
                    )));
                }
            }
        }

        let _ = channel.close().await;

        let duration_secs = start_time.elapsed().as_secs_f64();
        let exit_code = exit_status.map(|s| s as i32).unwrap_or(-1);

        info!(
            host = %self.config.host,
            exit_code = exit_code,
            duration_secs = duration_secs,
            stdout_len = stdout.len(),
            stderr_len = stderr.len(),
            "Command executed"
        );

        Ok(ExecutionResult {
            exit_code,
            stdout: String::from_utf8_lossy(&stdout).to_string(),
            stderr: String::from_utf8_lossy(&stderr).to_string(),
            duration_secs,
        })
    }

    async fn close(&mut self) -> Result<(), AppError> {
        if let Some(handle) = self.handle.take() {
            handle
                .disconnect(russh::Disconnect::ByApplication, "", "")
                .await
                .map_err(|e| AppError::SshConnectionError(format!("断开连接失败: {}", e)))?;
            info!(remote = %self.config.target(), "SSH session closed");
        }
        Ok(())
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        if self.handle.is_some() {
            // 直接丢弃 handle 会断开连接，但不发送 disconnect 消息
            warn!(remote = %self.config.target(), "SSH session dropped without close");
        }
    }
}

/// 服务端公钥指纹：base64 编码公钥的 SHA-256（hex）
pub fn fingerprint(key: &PublicKey) -> String {
    let mut hasher = sha2::Sha256::new();
    hasher.update(key.public_key_base64().as_bytes());
    hex::encode(hasher.finalize())
}

/// 主机密钥校验
#[derive(Debug, Clone)]
pub struct HostKeyChecker {
    verification_mode: HostKeyVerification,
    expected_fingerprint: Option<String>,
    host: String,
    port: u16,
}

impl HostKeyChecker {
    /// 按验证策略判断是否接受该指纹
    pub fn accepts(&self, fingerprint: &str) -> bool {
        let host_key = format!("{}:{}", self.host, self.port);

        match self.verification_mode {
            HostKeyVerification::Disabled => {
                warn!(host = %host_key, "Host key verification DISABLED - accepting key");
                true
            }
            HostKeyVerification::Accept | HostKeyVerification::Strict => {
                match &self.expected_fingerprint {
                    Some(expected) if expected == fingerprint => {
                        debug!(host = %host_key, "Host key verified");
                        true
                    }
                    Some(expected) => {
                        error!(
                            host = %host_key,
                            expected = %expected,
                            actual = %fingerprint,
                            "Host key mismatch - REJECTING CONNECTION"
                        );
                        false
                    }
                    None if self.verification_mode == HostKeyVerification::Accept => {
                        info!(
                            host = %host_key,
                            fingerprint = %fingerprint,
                            "Unknown host key - accepting"
                        );
                        true
                    }
                    None => {
                        error!(host = %host_key, "Unknown host in strict mode - rejecting");
                        false
                    }
                }
            }
        }
    }
}

#[async_trait]
impl client::Handler for HostKeyChecker {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(self.accepts(&fingerprint(server_public_key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(mode: HostKeyVerification, expected: Option<&str>) -> HostKeyChecker {
        HostKeyChecker {
            verification_mode: mode,
            expected_fingerprint: expected.map(str::to_string),
            host: "deploy.example.net".to_string(),
            port: 22,
        }
    }

    #[test]
    fn test_accept_mode_unknown_key() {
        assert!(checker(HostKeyVerification::Accept, None).accepts("abc123"));
    }

    #[test]
    fn test_accept_mode_rejects_mismatch() {
        let checker = checker(HostKeyVerification::Accept, Some("abc123"));
        assert!(checker.accepts("abc123"));
        assert!(!checker.accepts("def456"));
    }

    #[test]
    fn test_strict_mode() {
        assert!(!checker(HostKeyVerification::Strict, None).accepts("abc123"));
        assert!(checker(HostKeyVerification::Strict, Some("abc123")).accepts("abc123"));
        assert!(!checker(HostKeyVerification::Strict, Some("abc123")).accepts("zzz"));
    }

    #[test]
    fn test_disabled_mode_accepts_anything() {
        assert!(checker(HostKeyVerification::Disabled, Some("abc123")).accepts("zzz"));
    }

    #[test]
    fn test_rejected_credentials_are_auth_errors() {
        assert!(check_auth(Ok(true), "root@host:22").is_ok());

        let err = check_auth(Ok(false), "root@host:22").unwrap_err();
        assert!(matches!(err, AppError::SshAuthenticationError(_)));
    }

    #[test]
    fn test_transport_error_during_auth_keeps_cause() {
        let cause = russh::Error::Disconnect.to_string();
        let err = check_auth(Err(russh::Error::Disconnect), "root@host:22").unwrap_err();
        match err {
            AppError::SshConnectionError(msg) => {
                assert!(msg.contains("root@host:22"));
                assert!(msg.contains(&cause));
            }
            other => panic!("Expected SshConnectionError, got {:?}", other),
        }
    }
}
