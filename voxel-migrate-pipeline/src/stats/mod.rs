//! Per-step run statistics.
use crate::transform::SkipReason;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Number of issue samples kept for the summary.
const ISSUE_SAMPLES: usize = 5;

/// Counters accumulated while one step runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub step: String,
    pub dry_run: bool,
    pub processed: u64,
    pub migrated: u64,
    pub failed: u64,
    pub foreign_key_violations: u64,
    pub skipped: BTreeMap<String, u64>,
    pub warnings: BTreeMap<String, u64>,
    pub counters: BTreeMap<String, u64>,
    pub issues: Vec<String>,
}

impl RunStats {
    pub fn new(step: &str, dry_run: bool) -> Self {
        Self {
            step: step.to_string(),
            dry_run,
            ..Self::default()
        }
    }

    pub fn record_processed(&mut self) {
        self.processed += 1;
    }

    pub fn record_migrated(&mut self) {
        self.migrated += 1;
    }

    pub fn record_skip(&mut self, reason: &SkipReason) {
        *self.skipped.entry(reason.key()).or_default() += 1;
    }

    pub fn record_failure(&mut self, detail: impl Into<String>) {
        self.failed += 1;
        self.record_issue(detail);
    }

    pub fn record_foreign_key_violation(&mut self, detail: impl Into<String>) {
        self.foreign_key_violations += 1;
        self.record_issue(detail);
    }

    /// Counts a degraded but migrated row: a fallback, a clamp or a
    /// nulled optional key.
    pub fn record_warning(&mut self, category: &str) {
        *self.warnings.entry(category.to_string()).or_default() += 1;
    }

    /// Bumps a step-specific counter such as `created_clinic_patients`.
    pub fn count(&mut self, counter: &str) {
        self.count_by(counter, 1);
    }

    pub fn count_by(&mut self, counter: &str, amount: u64) {
        *self.counters.entry(counter.to_string()).or_default() += amount;
    }

    /// Keeps the first few issue descriptions for the summary.
    pub fn record_issue(&mut self, detail: impl Into<String>) {
        if self.issues.len() < ISSUE_SAMPLES {
            self.issues.push(detail.into());
        }
    }

    pub fn skipped_total(&self) -> u64 {
        self.skipped.values().sum()
    }

    pub fn skipped_for(&self, reason: &SkipReason) -> u64 {
        self.skipped.get(&reason.key()).copied().unwrap_or(0)
    }

    pub fn warning_count(&self, category: &str) -> u64 {
        self.warnings.get(category).copied().unwrap_or(0)
    }

    pub fn counter(&self, counter: &str) -> u64 {
        self.counters.get(counter).copied().unwrap_or(0)
    }

    /// Share of processed rows that were migrated, in percent.
    pub fn success_rate(&self) -> f64 {
        if self.processed == 0 {
            return 0.0;
        }
        self.migrated as f64 * 100.0 / self.processed as f64
    }

    /// Logs a progress line every `every` processed rows.
    pub fn log_progress(&self, every: u64) {
        if every > 0 && self.processed % every == 0 {
            info!(
                step = %self.step,
                processed = self.processed,
                migrated = self.migrated,
                skipped = self.skipped_total(),
                failed = self.failed,
                "Progress"
            );
        }
    }

    pub fn log_summary(&self) {
        info!("\n=== {} summary{} ===", self.step, if self.dry_run { " (dry run)" } else { "" });
        info!(processed = self.processed, "Processed");
        info!(migrated = self.migrated, "Migrated");
        info!(skipped = self.skipped_total(), "Skipped");
        for (reason, count) in &self.skipped {
            info!(reason = %reason, count, "  skipped by reason");
        }
        info!(failed = self.failed, "Failed");
        info!(foreign_key_violations = self.foreign_key_violations, "Foreign key violations");
        for (category, count) in &self.warnings {
            warn!(category = %category, count, "  warnings");
        }
        for (counter, count) in &self.counters {
            info!(counter = %counter, count, "  counter");
        }
        for issue in &self.issues {
            warn!(issue = %issue, "  sample issue");
        }
        info!("Success rate: {:.2}%", self.success_rate());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_are_grouped_by_reason() {
        let mut stats = RunStats::new("clinics", false);
        stats.record_skip(&SkipReason::NoOwnerAvailable);
        stats.record_skip(&SkipReason::NoOwnerAvailable);
        stats.record_skip(&SkipReason::MissingRequiredField("email"));

        assert_eq!(stats.skipped_total(), 3);
        assert_eq!(stats.skipped_for(&SkipReason::NoOwnerAvailable), 2);
    }

    #[test]
    fn only_first_issues_are_kept() {
        let mut stats = RunStats::new("cases", false);
        for index in 0..8 {
            stats.record_failure(format!("row {index}"));
        }
        assert_eq!(stats.failed, 8);
        assert_eq!(stats.issues.len(), ISSUE_SAMPLES);
        assert_eq!(stats.issues[0], "row 0");
    }

    #[test]
    fn success_rate_handles_empty_runs() {
        let mut stats = RunStats::new("users", false);
        assert_eq!(stats.success_rate(), 0.0);
        stats.record_processed();
        stats.record_processed();
        stats.record_migrated();
        assert_eq!(stats.success_rate(), 50.0);
    }

    #[test]
    fn serializes_for_the_run_report() {
        let mut stats = RunStats::new("invoices", true);
        stats.count("created_clinic_patients");
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["step"], "invoices");
        assert_eq!(json["counters"]["created_clinic_patients"], 1);
    }
}
