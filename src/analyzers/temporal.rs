//! Week-by-week revenue comparison between methods.

use crate::analyzers::labels;
use crate::analyzers::types::{Crossover, Percent, TrendSummary, WeeklyRevenue};
use crate::analyzers::utility::mean;
use crate::record::{SalesMethod, Transaction};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Revenue per method per week. Weeks with no rows hold 0.
#[derive(Debug, Clone, PartialEq)]
pub struct RevenuePivot {
    pub weeks: Vec<u32>,
    /// One value per entry of `weeks`, for every method present in the data.
    pub series: BTreeMap<SalesMethod, Vec<f64>>,
}

impl RevenuePivot {
    /// Sums revenue by `(method, week)` over `weeks`.
    ///
    /// Transactions outside `weeks` are ignored; the loader has already
    /// rejected them.
    pub fn build(transactions: &[Transaction], weeks: impl IntoIterator<Item = u32>) -> Self {
        let weeks: Vec<u32> = weeks.into_iter().collect();
        let mut series: BTreeMap<SalesMethod, Vec<f64>> = BTreeMap::new();

        for t in transactions {
            let Some(slot) = weeks.iter().position(|w| *w == t.week) else {
                continue;
            };
            series
                .entry(t.sales_method)
                .or_insert_with(|| vec![0.0; weeks.len()])[slot] += t.revenue;
        }

        RevenuePivot { weeks, series }
    }

    /// Sum across methods for each week.
    pub fn week_totals(&self) -> Vec<f64> {
        (0..self.weeks.len())
            .map(|i| self.series.values().map(|s| s[i]).sum())
            .collect()
    }
}

/// Temporal comparison tables.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemporalReport {
    pub weekly: Vec<WeeklyRevenue>,
    pub trends: Vec<TrendSummary>,
    pub crossovers: Vec<Crossover>,
}

/// Percentage change between consecutive values. The first entry has no
/// predecessor and is `None`.
pub fn week_over_week(series: &[f64]) -> Vec<Option<Percent>> {
    let mut out = Vec::with_capacity(series.len());
    let mut prev: Option<f64> = None;
    for value in series {
        out.push(prev.map(|p| Percent::change(p, *value)));
        prev = Some(*value);
    }
    out
}

/// First week in which `challenger` is strictly above `leader`.
pub fn crossover_week(weeks: &[u32], leader: &[f64], challenger: &[f64]) -> Option<u32> {
    weeks
        .iter()
        .zip(leader.iter().zip(challenger))
        .find(|(_, (l, c))| c > l)
        .map(|(week, _)| *week)
}

/// Builds the weekly table, per-method trends and every pairwise crossover.
#[tracing::instrument(skip(transactions, weeks))]
pub fn compare_weeks(
    transactions: &[Transaction],
    weeks: impl IntoIterator<Item = u32>,
) -> TemporalReport {
    let pivot = RevenuePivot::build(transactions, weeks);
    let totals = pivot.week_totals();

    let mut weekly = Vec::new();
    let mut trends = Vec::new();

    for (method, series) in &pivot.series {
        let changes = week_over_week(series);
        let shares: Vec<Percent> = series
            .iter()
            .zip(&totals)
            .map(|(v, total)| Percent::of(*v, *total))
            .collect();

        for (i, week) in pivot.weeks.iter().enumerate() {
            weekly.push(WeeklyRevenue {
                week: *week,
                sales_method: *method,
                revenue: series[i],
                wow_change_pct: changes[i],
                share_pct: shares[i],
            });
        }

        if let Some(trend) = trend_of(*method, &pivot.weeks, series, &changes, &shares) {
            trends.push(trend);
        }
    }

    let mut crossovers = Vec::new();
    for (leader, leader_series) in &pivot.series {
        for (challenger, challenger_series) in &pivot.series {
            if leader == challenger {
                continue;
            }
            let week = crossover_week(&pivot.weeks, leader_series, challenger_series);
            let at = week.and_then(|w| pivot.weeks.iter().position(|x| *x == w));
            crossovers.push(Crossover {
                leader: *leader,
                challenger: *challenger,
                crossover_week: week,
                leader_revenue: at.map(|i| leader_series[i]),
                challenger_revenue: at.map(|i| challenger_series[i]),
            });
        }
    }

    debug!(
        weeks = pivot.weeks.len(),
        methods = pivot.series.len(),
        "Temporal comparison complete"
    );

    TemporalReport {
        weekly,
        trends,
        crossovers,
    }
}

fn trend_of(
    method: SalesMethod,
    weeks: &[u32],
    series: &[f64],
    changes: &[Option<Percent>],
    shares: &[Percent],
) -> Option<TrendSummary> {
    let first_week = *weeks.first()?;
    let last_week = *weeks.last()?;
    let first = *series.first()?;
    let last = *series.last()?;
    let total_change = Percent::change(first, last);

    let defined: Vec<f64> = changes.iter().flatten().filter_map(|c| c.value()).collect();
    let avg_weekly_growth = if defined.is_empty() {
        Percent::Undefined
    } else {
        Percent::Defined(mean(&defined))
    };

    let first_share = *shares.first()?;
    let last_share = *shares.last()?;

    Some(TrendSummary {
        sales_method: method,
        first_week,
        last_week,
        first_week_revenue: first,
        last_week_revenue: last,
        total_change_pct: total_change,
        avg_weekly_growth_pct: avg_weekly_growth,
        trend: labels::trend(total_change),
        first_week_share_pct: first_share,
        last_week_share_pct: last_share,
        share_shift_pts: last_share.points_since(first_share),
    })
}
