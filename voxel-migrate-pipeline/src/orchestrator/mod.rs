//! Orchestrator module for the full migration.
//!
//! Runs every step of the plan in dependency order, each as its own child
//! process, and stops at the first failure.
use async_trait::async_trait;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::process::Command;
use tracing::{error, info, instrument, warn};

use crate::errors::OrchestratorError;
use crate::stats::RunStats;
use crate::steps::{catalogue, Domain, TablePrecondition};

pub const RUN_REPORT_FILE: &str = "run_report.json";
const STATS_DIR: &str = "stats";

/// Where a step run leaves its statistics for the orchestrator to collect.
pub fn stats_path(log_root: &Path, step: &str) -> PathBuf {
    log_root.join(STATS_DIR).join(format!("{step}.json"))
}

/// One entry of the migration plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlannedStep {
    pub number: usize,
    pub name: &'static str,
    pub domain: Domain,
    pub precondition: TablePrecondition,
}

/// The fixed, ordered list of steps: users, clinics, invoices, cases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationPlan {
    steps: Vec<PlannedStep>,
}

impl MigrationPlan {
    pub fn full() -> Self {
        let steps = catalogue()
            .iter()
            .enumerate()
            .map(|(index, step)| PlannedStep {
                number: index + 1,
                name: step.name(),
                domain: step.domain(),
                precondition: step.precondition(),
            })
            .collect();
        Self { steps }
    }

    pub fn steps(&self) -> &[PlannedStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// One line per step, e.g. `  4. [invoices] radiologist-invoices (assume-empty)`.
    pub fn describe(&self) -> Vec<String> {
        self.steps
            .iter()
            .map(|step| {
                format!(
                    "{:>3}. [{}] {} ({})",
                    step.number,
                    step.domain.as_str(),
                    step.name,
                    step.precondition
                )
            })
            .collect()
    }
}

/// Lifecycle of one step, and of the orchestrator as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    NotStarted,
    Running,
    Succeeded,
    Failed,
}

/// How a launched step ended.
#[derive(Debug, Clone, PartialEq)]
pub struct StepExit {
    pub success: bool,
    pub code: Option<i32>,
    pub stats: Option<RunStats>,
}

/// Runs a single step to completion.
#[async_trait]
pub trait StepLauncher: Send + Sync {
    /// Launches a step and waits for it.
    ///
    /// # Arguments
    ///
    /// * `step` - The step's CLI name
    ///
    /// # Returns
    ///
    /// * `Ok(StepExit)` - The step ran; `success` tells whether it passed
    /// * `Err(std::io::Error)` - The step could not be started
    async fn launch(&self, step: &'static str) -> Result<StepExit, std::io::Error>;
}

/// Re-executes the current binary as `run <step>` in a child process.
pub struct ProcessLauncher {
    program: PathBuf,
    extra_args: Vec<String>,
    log_root: PathBuf,
}

impl ProcessLauncher {
    pub fn new(program: PathBuf, extra_args: Vec<String>, log_root: PathBuf) -> Self {
        Self {
            program,
            extra_args,
            log_root,
        }
    }

    /// Launcher for the running executable.
    pub fn current(extra_args: Vec<String>, log_root: PathBuf) -> Result<Self, std::io::Error> {
        Ok(Self::new(std::env::current_exe()?, extra_args, log_root))
    }

    fn read_stats(&self, step: &str) -> Option<RunStats> {
        let path = stats_path(&self.log_root, step);
        let text = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&text) {
            Ok(stats) => Some(stats),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable step statistics");
                None
            }
        }
    }
}

#[async_trait]
impl StepLauncher for ProcessLauncher {
    async fn launch(&self, step: &'static str) -> Result<StepExit, std::io::Error> {
        let stats_file = stats_path(&self.log_root, step);
        if stats_file.exists() {
            fs::remove_file(&stats_file)?;
        }
        let status = Command::new(&self.program)
            .arg("run")
            .arg(step)
            .args(&self.extra_args)
            .status()
            .await?;
        Ok(StepExit {
            success: status.success(),
            code: status.code(),
            stats: self.read_stats(step),
        })
    }
}

/// Outcome of one planned step in the run report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepReport {
    pub number: usize,
    pub name: &'static str,
    pub state: StepState,
    pub exit_code: Option<i32>,
    pub duration_secs: Option<f64>,
    pub stats: Option<RunStats>,
}

/// The JSON document written to `<LOG_ROOT>/run_report.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub state: StepState,
    pub steps: Vec<StepReport>,
}

impl RunReport {
    fn new(plan: &MigrationPlan) -> Self {
        Self {
            state: StepState::NotStarted,
            steps: plan
                .steps()
                .iter()
                .map(|step| StepReport {
                    number: step.number,
                    name: step.name,
                    state: StepState::NotStarted,
                    exit_code: None,
                    duration_secs: None,
                    stats: None,
                })
                .collect(),
        }
    }

    pub fn succeeded(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| step.state == StepState::Succeeded)
            .count()
    }
}

/// Configuration for the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct OrchestratorConfig {
    /// Directory receiving `run_report.json`. No report is written when unset.
    pub report_dir: Option<PathBuf>,
}

/// Orchestrator that runs the migration plan.
pub struct Orchestrator {
    plan: MigrationPlan,
    launcher: Box<dyn StepLauncher>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Create a new orchestrator for the full plan.
    pub fn new(launcher: Box<dyn StepLauncher>) -> Self {
        Self::with_config(MigrationPlan::full(), launcher, OrchestratorConfig::default())
    }

    pub fn with_config(
        plan: MigrationPlan,
        launcher: Box<dyn StepLauncher>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            plan,
            launcher,
            config,
        }
    }

    /// Run every step in order. The first failing step stops the batch.
    ///
    /// The run report is written whether the batch succeeded or not.
    #[instrument(skip(self))]
    pub async fn run(self) -> Result<RunReport, OrchestratorError> {
        info!(steps = self.plan.len(), "Starting full migration");
        let mut report = RunReport::new(&self.plan);
        report.state = StepState::Running;
        let started = Instant::now();

        let mut failure = None;
        for (index, step) in self.plan.steps().iter().enumerate() {
            info!("\n=== Step {}/{}: {} ===", step.number, self.plan.len(), step.name);
            report.steps[index].state = StepState::Running;
            let step_started = Instant::now();
            let exit = self.launcher.launch(step.name).await;
            let entry = &mut report.steps[index];
            entry.duration_secs = Some(step_started.elapsed().as_secs_f64());

            match exit {
                Ok(exit) if exit.success => {
                    entry.state = StepState::Succeeded;
                    entry.exit_code = exit.code;
                    entry.stats = exit.stats;
                    info!(step = step.name, "✓ Step succeeded");
                }
                Ok(exit) => {
                    entry.state = StepState::Failed;
                    entry.exit_code = exit.code;
                    entry.stats = exit.stats;
                    error!(step = step.name, code = ?exit.code, "Step failed; stopping");
                    failure = Some(OrchestratorError::StepFailed {
                        step: step.name,
                        code: exit.code,
                    });
                    break;
                }
                Err(source) => {
                    entry.state = StepState::Failed;
                    error!(step = step.name, error = %source, "Step could not be launched; stopping");
                    failure = Some(OrchestratorError::Launch {
                        step: step.name,
                        source,
                    });
                    break;
                }
            }
        }

        report.state = if failure.is_some() {
            StepState::Failed
        } else {
            StepState::Succeeded
        };
        info!(
            succeeded = report.succeeded(),
            total = self.plan.len(),
            elapsed_secs = started.elapsed().as_secs_f64(),
            state = ?report.state,
            "Migration finished"
        );
        self.write_report(&report)?;

        match failure {
            Some(error) => Err(error),
            None => Ok(report),
        }
    }

    fn write_report(&self, report: &RunReport) -> Result<(), OrchestratorError> {
        let Some(dir) = &self.config.report_dir else {
            return Ok(());
        };
        fs::create_dir_all(dir)?;
        let path = dir.join(RUN_REPORT_FILE);
        fs::write(&path, serde_json::to_string_pretty(report)?)?;
        info!(path = %path.display(), "Wrote run report");
        Ok(())
    }
}
