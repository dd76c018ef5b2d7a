//! Per-method revenue distributions.
//!
//! Quartiles use linear interpolation between order statistics (see
//! [`quantile`]), so `min <= q1 <= median <= q3 <= max` always holds.

use crate::analyzers::aggregate::group_by;
use crate::analyzers::labels;
use crate::analyzers::types::{DistributionSummary, Percent};
use crate::analyzers::utility::{mean, quantile, sorted, stddev};
use crate::record::{SalesMethod, Transaction};
use serde::Serialize;

pub const OVERALL: &str = "Overall";

/// Distribution table plus the best/worst comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionReport {
    /// Overall row first, then one row per method in canonical order.
    pub rows: Vec<DistributionSummary>,
    pub best_method: SalesMethod,
    pub worst_method: SalesMethod,
    /// `(best mean / worst mean - 1) * 100`.
    pub performance_gap_pct: Percent,
}

/// Descriptive statistics of `values`, or `None` when empty.
pub fn describe(group: &str, values: &[f64]) -> Option<DistributionSummary> {
    let ordered = sorted(values);
    let min = *ordered.first()?;
    let max = *ordered.last()?;
    let q1 = quantile(&ordered, 0.25)?;
    let median = quantile(&ordered, 0.5)?;
    let q3 = quantile(&ordered, 0.75)?;
    let avg = mean(values);

    Some(DistributionSummary {
        group: group.to_string(),
        count: values.len(),
        mean: avg,
        std_dev: stddev(values, avg),
        min,
        q1,
        median,
        q3,
        max,
        iqr: q3 - q1,
        vs_overall_pct: Percent::Undefined,
        performance: None,
    })
}

/// Summarizes revenue overall and per method.
///
/// Returns `None` when there are no transactions.
pub fn summarize_distribution(transactions: &[Transaction]) -> Option<DistributionReport> {
    let all: Vec<f64> = transactions.iter().map(|t| t.revenue).collect();
    let overall = describe(OVERALL, &all)?;

    let mut rows = vec![overall.clone()];
    let mut means: Vec<(SalesMethod, f64)> = Vec::new();

    for (method, group) in group_by(transactions, |t| t.sales_method) {
        let values: Vec<f64> = group.iter().map(|t| t.revenue).collect();
        let Some(mut summary) = describe(method.label(), &values) else {
            continue;
        };
        summary.vs_overall_pct = Percent::change(overall.mean, summary.mean);
        summary.performance = Some(labels::performance(summary.vs_overall_pct));
        means.push((method, summary.mean));
        rows.push(summary);
    }

    // Ties resolve to the earliest method in canonical order.
    let (best_method, best_mean) = means
        .iter()
        .copied()
        .reduce(|acc, m| if m.1 > acc.1 { m } else { acc })?;
    let (worst_method, worst_mean) = means
        .iter()
        .copied()
        .reduce(|acc, m| if m.1 < acc.1 { m } else { acc })?;

    Some(DistributionReport {
        rows,
        best_method,
        worst_method,
        performance_gap_pct: Percent::change(worst_mean, best_mean),
    })
}
