//! 远程部署工具
//!
//! 通过 SSH 连接部署主机，更新源码、重新构建并重启 compose 服务，然后读取服务健康报告。

pub mod config;
pub mod deploy;
pub mod health;
pub mod output;
pub mod runner;
pub mod ssh;
pub mod telemetry;
