//! 部署流程
//!
//! 拉取 → 构建 → 重启 → 等待 → 健康检查。每一步都会执行，不受上一步结果影响，
//! 结果只用于展示。传输层错误会中止流程。

use std::fmt;
use std::io::Write;
use std::time::Duration;

use common::{AppError, ExecutionResult};
use tracing::{info, warn};

use crate::config::DeploySettings;
use crate::health::{self, HealthParseError, HealthReport};
use crate::runner::CommandRunner;
use crate::ssh::RemoteShell;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployStep {
    SourceUpdate,
    ImageRebuild,
    ServiceRestart,
    HealthProbe,
}

impl fmt::Display for DeployStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeployStep::SourceUpdate => "source update",
            DeployStep::ImageRebuild => "image rebuild",
            DeployStep::ServiceRestart => "service restart",
            DeployStep::HealthProbe => "health probe",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedCommand {
    pub step: DeployStep,
    pub command: String,
    /// None 表示使用默认超时
    pub timeout: Option<Duration>,
}

/// 一次部署的命令计划
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployPlan {
    /// 依次为拉取、构建、重启
    pub steps: Vec<PlannedCommand>,
    pub startup_wait: Duration,
    pub health_probe: PlannedCommand,
}

impl DeployPlan {
    pub fn from_settings(settings: &DeploySettings) -> Self {
        let secs = |s: u64| Some(Duration::from_secs(s));

        let steps = vec![
            PlannedCommand {
                step: DeployStep::SourceUpdate,
                command: format!(
                    "cd {} && git pull {} {}",
                    settings.repo_dir, settings.git_remote, settings.git_branch
                ),
                timeout: secs(settings.pull_timeout_secs),
            },
            PlannedCommand {
                step: DeployStep::ImageRebuild,
                command: format!(
                    "cd {} && docker compose build --no-cache {}",
                    settings.compose_dir, settings.service
                ),
                timeout: secs(settings.build_timeout_secs),
            },
            PlannedCommand {
                step: DeployStep::ServiceRestart,
                command: format!(
                    "cd {} && docker compose up -d {}",
                    settings.compose_dir, settings.service
                ),
                timeout: settings.restart_timeout_secs.map(Duration::from_secs),
            },
        ];

        let health_probe = PlannedCommand {
            step: DeployStep::HealthProbe,
            // 2>&1：curl 自身的错误也进入待解析文本
            command: format!("curl -s {} 2>&1", settings.health_url),
            timeout: settings.health_timeout_secs.map(Duration::from_secs),
        };

        Self {
            steps,
            startup_wait: Duration::from_secs(settings.startup_wait_secs),
            health_probe,
        }
    }

    /// `--dry-run` 使用的可读列表
    pub fn describe(&self, default_timeout: Duration) -> Vec<String> {
        let line = |c: &PlannedCommand| {
            format!(
                "[{}] {} (timeout {}s)",
                c.step,
                c.command,
                c.timeout.unwrap_or(default_timeout).as_secs()
            )
        };
        let mut lines: Vec<String> = self.steps.iter().map(line).collect();
        lines.push(format!("[wait] {}s", self.startup_wait.as_secs()));
        lines.push(line(&self.health_probe));
        lines
    }
}

#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub step: DeployStep,
    pub command: String,
    pub result: ExecutionResult,
}

#[derive(Debug)]
pub struct DeployReport {
    /// 最后一项为健康检查
    pub steps: Vec<StepOutcome>,
    pub health: Result<HealthReport, HealthParseError>,
}

impl DeployReport {
    pub fn failed_steps(&self) -> impl Iterator<Item = &StepOutcome> {
        self.steps.iter().filter(|s| s.result.is_failure())
    }

    pub fn outcome(&self, step: DeployStep) -> Option<&StepOutcome> {
        self.steps.iter().find(|s| s.step == step)
    }
}

pub struct Deployer {
    plan: DeployPlan,
    runner: CommandRunner,
}

impl Deployer {
    pub fn new(plan: DeployPlan, runner: CommandRunner) -> Self {
        Self { plan, runner }
    }

    /// 在 `shell` 上执行全部步骤，控制台输出写入 `out`
    pub async fn run<S, W>(&self, shell: &mut S, out: &mut W) -> Result<DeployReport, AppError>
    where
        S: RemoteShell + ?Sized,
        W: Write,
    {
        let mut steps = Vec::with_capacity(self.plan.steps.len() + 1);

        for planned in &self.plan.steps {
            info!(step = %planned.step, "Running deploy step");
            let result = self
                .runner
                .run(shell, out, &planned.command, planned.timeout)
                .await?;
            steps.push(StepOutcome {
                step: planned.step,
                command: planned.command.clone(),
                result,
            });
        }

        writeln!(
            out,
            "\nWaiting {}s for startup + translation warmup...",
            self.plan.startup_wait.as_secs()
        )?;
        out.flush()?;
        tokio::time::sleep(self.plan.startup_wait).await;

        let probe = &self.plan.health_probe;
        let result = self
            .runner
            .run(shell, out, &probe.command, probe.timeout)
            .await?;

        writeln!(out, "\n--- PARSING HEALTH ---")?;
        let health = HealthReport::parse(&result.stdout);
        match &health {
            Ok(report) => info!(
                ok = report.summary.ok,
                total = report.summary.total,
                uptime = ?report.uptime,
                "Health report parsed"
            ),
            Err(e) => warn!(error = %e, "Health report could not be parsed"),
        }
        for line in health::render(&health, &result.stdout, self.runner.output()) {
            writeln!(out, "{}", line)?;
        }
        out.flush()?;

        steps.push(StepOutcome {
            step: probe.step,
            command: probe.command.clone(),
            result,
        });

        Ok(DeployReport { steps, health })
    }
}

/// 执行部署并在结束后关闭会话，无论成功与否。会话被消费，不能再次使用。
pub async fn run_and_close<S, W>(
    deployer: &Deployer,
    mut shell: S,
    out: &mut W,
) -> Result<DeployReport, AppError>
where
    S: RemoteShell,
    W: Write,
{
    let result = deployer.run(&mut shell, out).await;

    if let Err(e) = shell.close().await {
        warn!(error = %e, "Failed to close remote session");
    }

    result
}
