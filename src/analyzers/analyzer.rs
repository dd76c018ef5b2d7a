use crate::analyzers::aggregate::{GroupKey, summarize_groups};
use crate::analyzers::distribution::{DistributionReport, summarize_distribution};
use crate::analyzers::efficiency::{EfficiencyReport, analyze_efficiency};
use crate::analyzers::temporal::{TemporalReport, compare_weeks};
use crate::analyzers::types::{GroupSummary, Percent};
use crate::cleaner::{CleanedDataset, load_and_clean};
use crate::config::RaterConfig;
use crate::error::RaterError;
use crate::output::{write_json, write_table};
use crate::record::SalesMethod;
use crate::stats::CleanStats;
use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Every table produced by one run, computed before anything is written.
#[derive(Debug, Clone)]
pub struct Report {
    pub cleaned: CleanedDataset,
    pub by_method: Vec<GroupSummary>,
    pub by_week: Vec<GroupSummary>,
    pub by_method_week: Vec<GroupSummary>,
    pub distribution: DistributionReport,
    pub temporal: TemporalReport,
    pub efficiency: EfficiencyReport,
}

/// Headline numbers written to `summary.json`.
#[derive(Debug, Serialize)]
pub struct Summary<'a> {
    pub clean_stats: &'a CleanStats,
    pub methods: Vec<SalesMethod>,
    pub best_mean_revenue: SalesMethod,
    pub worst_mean_revenue: SalesMethod,
    pub performance_gap_pct: Percent,
    pub efficiency: &'a EfficiencyReport,
}

/// Run metadata. The only output that differs between identical runs.
#[derive(Debug, Serialize)]
pub struct Manifest<'a> {
    pub generated_at: DateTime<Utc>,
    pub input: &'a str,
    pub tables: Vec<&'static str>,
}

pub const TABLES: [&str; 12] = [
    "cleaned.csv",
    "rejections.csv",
    "groups_method.csv",
    "groups_week.csv",
    "groups_method_week.csv",
    "distribution.csv",
    "weekly_revenue.csv",
    "temporal_changes.csv",
    "crossovers.csv",
    "efficiency.csv",
    "opportunity.csv",
    "summary.json",
];

/// Runs every stage on an already cleaned dataset.
///
/// Fails before efficiency is computed if a method in the data has no time
/// cost.
pub fn build_report(cleaned: CleanedDataset, config: &RaterConfig) -> Result<Report> {
    let tx = &cleaned.transactions;
    config.require_time_costs(cleaned.methods())?;

    let by_method = summarize_groups(tx, GroupKey::Method);
    let by_week = summarize_groups(tx, GroupKey::Week);
    let by_method_week = summarize_groups(tx, GroupKey::MethodWeek);
    let distribution = summarize_distribution(tx).ok_or(RaterError::EmptyDataset)?;
    let temporal = compare_weeks(tx, config.weeks());
    let efficiency = analyze_efficiency(tx, &config.time_cost, &config.allocation_mix)?;

    Ok(Report {
        cleaned,
        by_method,
        by_week,
        by_method_week,
        distribution,
        temporal,
        efficiency,
    })
}

/// Loads, cleans and analyzes the file at `input`.
#[tracing::instrument(skip(config))]
pub fn analyze(input: &str, config: &RaterConfig) -> Result<Report> {
    let cleaned = load_and_clean(input, config)?;
    build_report(cleaned, config)
}

/// Directory for a run on `date`: `<base>/run_date=YYYY-MM-DD`.
pub fn run_dir(base: &str, date: NaiveDate) -> PathBuf {
    Path::new(base).join(format!("run_date={}", date.format("%Y-%m-%d")))
}

impl Report {
    pub fn summary(&self) -> Summary<'_> {
        Summary {
            clean_stats: &self.cleaned.stats,
            methods: self.cleaned.methods(),
            best_mean_revenue: self.distribution.best_method,
            worst_mean_revenue: self.distribution.worst_method,
            performance_gap_pct: self.distribution.performance_gap_pct,
            efficiency: &self.efficiency,
        }
    }

    /// Writes every table into `dir`, creating it if needed.
    pub fn write_tables(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;

        write_table(&dir.join("cleaned.csv"), &self.cleaned.transactions)?;
        write_table(&dir.join("rejections.csv"), &self.cleaned.rejections)?;
        write_table(&dir.join("groups_method.csv"), &self.by_method)?;
        write_table(&dir.join("groups_week.csv"), &self.by_week)?;
        write_table(&dir.join("groups_method_week.csv"), &self.by_method_week)?;
        write_table(&dir.join("distribution.csv"), &self.distribution.rows)?;
        write_table(&dir.join("weekly_revenue.csv"), &self.temporal.weekly)?;
        write_table(&dir.join("temporal_changes.csv"), &self.temporal.trends)?;
        write_table(&dir.join("crossovers.csv"), &self.temporal.crossovers)?;
        write_table(&dir.join("efficiency.csv"), &self.efficiency.methods)?;
        let opportunity: Vec<_> = self.efficiency.opportunity.iter().collect();
        write_table(&dir.join("opportunity.csv"), &opportunity)?;
        write_json(&dir.join("summary.json"), &self.summary())?;

        Ok(())
    }

    /// Writes the tables plus a timestamped manifest into a dated run
    /// directory under `base`, returning that directory.
    pub fn write_run(&self, base: &str, input: &str) -> Result<PathBuf> {
        let now = Utc::now();
        let dir = run_dir(base, now.date_naive());
        self.write_tables(&dir)?;

        let manifest = Manifest {
            generated_at: now,
            input,
            tables: TABLES.to_vec(),
        };
        write_json(&dir.join("manifest.json"), &manifest)?;

        info!(
            dir = %dir.display(),
            rows = self.cleaned.stats.rows_kept,
            rejected = self.cleaned.stats.rows_rejected,
            "Report written"
        );
        Ok(dir)
    }
}
