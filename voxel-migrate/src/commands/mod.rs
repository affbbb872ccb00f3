//! Executes the parsed command.
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use voxel_migrate_pipeline::audit::audit_users;
use voxel_migrate_pipeline::errors::StepError;
use voxel_migrate_pipeline::maintenance::reset;
use voxel_migrate_pipeline::orchestrator::{
    stats_path, MigrationPlan, Orchestrator, OrchestratorConfig, ProcessLauncher,
};
use voxel_migrate_pipeline::stats::RunStats;
use voxel_migrate_pipeline::steps::{self, Domain, RunOptions, StepContext, UnmappedLocation};
use voxel_migrate_shared::types::ClinicLocationId;

use crate::cli::{Cli, Command};
use crate::config::{Dependencies, Settings, Tunables};
use crate::errors::{ConfigError, MigrationError};
use crate::logging::LogTarget;

/// Environment tunables with the command-line overrides applied.
pub fn tunables(cli: &Cli) -> Result<Tunables, ConfigError> {
    let mut tunables = Tunables::from_env()?;
    if let Some(log_root) = &cli.log_root {
        tunables.log_root = log_root.clone();
    }
    if let Some(commit_every) = cli.commit_every {
        tunables.commit_every = commit_every;
    }
    if let Some(progress_every) = cli.progress_every {
        tunables.progress_every = progress_every;
    }
    Ok(tunables)
}

/// The log file a command writes to. `list` only prints.
pub fn log_target(command: &Command) -> Result<Option<LogTarget>, StepError> {
    let maintenance = Domain::Maintenance.as_str();
    let target = match command {
        Command::Run { step, .. } => {
            let step = steps::find(step)?;
            LogTarget::new(step.domain().as_str(), step.name())
        }
        Command::Verify { step } => {
            let step = steps::find(step)?;
            LogTarget::new(step.domain().as_str(), format!("{}_verify", step.name()))
        }
        Command::All { .. } => LogTarget::new(maintenance, "migrate_all"),
        Command::Reset { .. } => LogTarget::new(maintenance, "reset"),
        Command::AuditUsers => LogTarget::new(maintenance, "audit_users"),
        Command::List => return Ok(None),
    };
    Ok(Some(target))
}

/// `--skip-invalid` wins over a default location. A location given on the
/// command line wins over the configured one.
pub fn unmapped_location(
    skip_invalid: bool,
    cli_default: Option<i32>,
    configured: Option<ClinicLocationId>,
) -> UnmappedLocation {
    if skip_invalid {
        return UnmappedLocation::SkipInvalid;
    }
    match cli_default.map(ClinicLocationId).or(configured) {
        Some(location) => UnmappedLocation::UseDefault(location),
        None => UnmappedLocation::Null,
    }
}

/// Arguments that make a child `run` share the parent's settings.
fn child_args(tunables: &Tunables, dry_run: bool) -> Vec<String> {
    let mut args = vec![
        "--log-root".to_string(),
        tunables.log_root.display().to_string(),
        "--commit-every".to_string(),
        tunables.commit_every.to_string(),
        "--progress-every".to_string(),
        tunables.progress_every.to_string(),
    ];
    if dry_run {
        args.push("--dry-run".to_string());
    }
    args
}

/// Leaves a step's statistics where the orchestrator collects them.
fn write_stats(log_root: &Path, stats: &RunStats) -> Result<PathBuf, MigrationError> {
    let path = stats_path(log_root, &stats.step);
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    fs::write(&path, serde_json::to_string_pretty(stats)?)?;
    Ok(path)
}

async fn connect(tunables: &Tunables) -> Result<Dependencies, MigrationError> {
    let settings = Settings::from_env(tunables.clone())?;
    Dependencies::new(&settings).await
}

/// Executes a command.
///
/// # Returns
///
/// * `Ok(())` - The command completed; row-level failures are only counted
/// * `Err(MigrationError)` - A setup failure, or a failed step under `all`
pub async fn execute(command: Command, tunables: Tunables) -> Result<(), MigrationError> {
    match command {
        Command::Run {
            step,
            dry_run,
            skip_invalid,
            default_clinic_location_id,
        } => {
            let step = steps::find(&step)?;
            let options = RunOptions {
                dry_run,
                commit_every: tunables.commit_every,
                progress_every: tunables.progress_every,
                unmapped_location: unmapped_location(
                    skip_invalid,
                    default_clinic_location_id,
                    tunables.default_clinic_location_id,
                ),
            };
            let deps = connect(&tunables).await?;
            let ctx = StepContext::new(deps.source, deps.target, options);

            info!("\n=== Migrating {} ===", step.name());
            if dry_run {
                info!("DRY RUN: nothing will be written");
            }
            let stats = step.run(&ctx).await?;
            let path = write_stats(&tunables.log_root, &stats)?;
            info!(path = %path.display(), "✓ {} finished", step.name());
        }
        Command::Verify { step } => {
            let step = steps::find(&step)?;
            let deps = connect(&tunables).await?;
            let ctx = StepContext::new(deps.source, deps.target, RunOptions::default());
            step.verify(&ctx).await?.log();
        }
        Command::All { dry_run } => {
            let launcher =
                ProcessLauncher::current(child_args(&tunables, dry_run), tunables.log_root.clone())?;
            let config = OrchestratorConfig {
                report_dir: Some(tunables.log_root.clone()),
            };
            let report =
                Orchestrator::with_config(MigrationPlan::full(), Box::new(launcher), config)
                    .run()
                    .await?;
            info!(succeeded = report.succeeded(), "✓ Full migration finished");
        }
        Command::Reset { dry_run } => {
            let deps = connect(&tunables).await?;
            let report = reset(deps.target.as_ref(), dry_run).await?;
            info!(
                deleted = report.deleted_total(),
                enum_values_added = report.enum_values_added.len(),
                "✓ Reset finished"
            );
        }
        Command::AuditUsers => {
            let deps = connect(&tunables).await?;
            let (missing, path) =
                audit_users(deps.source.as_ref(), deps.target.as_ref(), &tunables.log_root)
                    .await?;
            info!(missing = missing.total(), path = %path.display(), "✓ Audit finished");
        }
        Command::List => {
            for line in MigrationPlan::full().describe() {
                println!("{line}");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmapped_location_precedence() {
        assert_eq!(unmapped_location(false, None, None), UnmappedLocation::Null);
        assert_eq!(
            unmapped_location(false, None, Some(ClinicLocationId(3))),
            UnmappedLocation::UseDefault(ClinicLocationId(3))
        );
        assert_eq!(
            unmapped_location(false, Some(9), Some(ClinicLocationId(3))),
            UnmappedLocation::UseDefault(ClinicLocationId(9))
        );
        assert_eq!(
            unmapped_location(true, None, Some(ClinicLocationId(3))),
            UnmappedLocation::SkipInvalid
        );
    }

    #[test]
    fn test_log_targets_follow_the_step_domain() {
        let run = Command::Run {
            step: "case-files".to_string(),
            dry_run: false,
            skip_invalid: false,
            default_clinic_location_id: None,
        };
        assert_eq!(log_target(&run).unwrap(), Some(LogTarget::new("cases", "case-files")));
        assert_eq!(
            log_target(&Command::Verify {
                step: "clinics".to_string()
            })
            .unwrap(),
            Some(LogTarget::new("clinics", "clinics_verify"))
        );
        assert_eq!(
            log_target(&Command::Reset { dry_run: true }).unwrap(),
            Some(LogTarget::new("maintenance", "reset"))
        );
        assert_eq!(log_target(&Command::List).unwrap(), None);
    }

    #[test]
    fn test_unknown_step_has_no_log_target() {
        let verify = Command::Verify {
            step: "payments".to_string(),
        };
        assert!(matches!(log_target(&verify), Err(StepError::UnknownStep(_))));
    }

    #[test]
    fn test_children_inherit_settings() {
        let tunables = Tunables {
            commit_every: 50,
            progress_every: 10,
            max_connections: 5,
            log_root: PathBuf::from("/var/log/voxel"),
            default_clinic_location_id: None,
        };
        assert_eq!(
            child_args(&tunables, true),
            vec![
                "--log-root",
                "/var/log/voxel",
                "--commit-every",
                "50",
                "--progress-every",
                "10",
                "--dry-run"
            ]
        );
    }

    #[test]
    fn test_stats_are_written_for_the_orchestrator() {
        let dir = tempfile::tempdir().unwrap();
        let mut stats = RunStats::new("cases", false);
        stats.record_processed();
        stats.record_migrated();

        let path = write_stats(dir.path(), &stats).unwrap();

        assert_eq!(path, dir.path().join("stats").join("cases.json"));
        let read: RunStats = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(read, stats);
    }
}
