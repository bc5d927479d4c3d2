//! atlas-deploy 主入口

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use atlas_deploy::{
    config::AppConfig,
    deploy::{self, DeployPlan, Deployer},
    runner::CommandRunner,
    ssh::SshSession,
    telemetry,
};
use clap::Parser;

/// 在部署主机上拉取、构建并重启服务，然后检查健康状态
#[derive(Debug, Parser)]
#[command(name = "atlas-deploy", version, about)]
struct Cli {
    /// 额外配置文件（toml/yaml/json），覆盖 atlas-deploy.*，优先级低于环境变量
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// 只打印命令计划，不连接主机
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 加载 .env 文件（本地开发）
    dotenv::from_filename(".env.local").ok();
    dotenv::dotenv().ok();

    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    telemetry::init_telemetry(&config.logging);

    let ssh_config = config.ssh_config()?;
    let plan = DeployPlan::from_settings(&config.deploy);
    let runner = CommandRunner::new(config.output, ssh_config.command_timeout());

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    if cli.dry_run {
        writeln!(out, "Deploy plan for {}:", ssh_config.target())?;
        for line in plan.describe(runner.default_timeout()) {
            writeln!(out, "  {}", line)?;
        }
        return Ok(());
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        remote = %ssh_config.target(),
        "Starting deployment"
    );

    let session = SshSession::connect(ssh_config)
        .await
        .context("Failed to open SSH session")?;

    let deployer = Deployer::new(plan, runner);
    let report = deploy::run_and_close(&deployer, session, &mut out)
        .await
        .context("Deployment aborted")?;

    let failed: Vec<String> = report.failed_steps().map(|s| s.step.to_string()).collect();
    if !failed.is_empty() {
        tracing::warn!(steps = ?failed, "Some steps exited non-zero");
    }

    writeln!(out, "\nDone!")?;
    Ok(())
}
