//! Revenue per minute of team time, per method and blended.
//!
//! The blended ratio is always recomputed from weighted totals,
//! `sum(revenue_i * w_i) / sum(time_i * w_i)`, never averaged from the
//! per-method ratios.

use crate::analyzers::aggregate::group_by;
use crate::analyzers::types::{Leaders, MethodEfficiency, OpportunityCost, Percent, TimeParadox};
use crate::error::{RaterError, RaterResult};
use crate::record::{SalesMethod, Transaction};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

/// Allowed distance of the weight sum from 1.
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Share of effort assigned to each method. Weights are non-negative and sum to 1.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationMix(BTreeMap<SalesMethod, f64>);

impl AllocationMix {
    /// Validates `weights`.
    ///
    /// # Errors
    ///
    /// Returns [`RaterError::Config`] for a negative or non-finite weight, or
    /// when the weights do not sum to 1 within [`WEIGHT_TOLERANCE`].
    pub fn new(weights: BTreeMap<SalesMethod, f64>) -> RaterResult<Self> {
        for (method, w) in &weights {
            if !w.is_finite() || *w < 0.0 {
                return Err(RaterError::config(
                    "allocation_mix",
                    format!("weight for {method} must be a non-negative number, got {w}"),
                ));
            }
        }
        let sum: f64 = weights.values().sum();
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(RaterError::config(
                "allocation_mix",
                format!("weights must sum to 1, got {sum}"),
            ));
        }
        Ok(AllocationMix(weights))
    }

    pub fn weight(&self, method: SalesMethod) -> f64 {
        self.0.get(&method).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SalesMethod, f64)> + '_ {
        self.0.iter().map(|(m, w)| (*m, *w))
    }
}

/// Efficiency tables and headline numbers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EfficiencyReport {
    /// Ranked by revenue per minute, best first.
    pub methods: Vec<MethodEfficiency>,
    /// Best RPM divided by worst RPM; `None` if the worst is zero.
    pub efficiency_gap: Option<f64>,
    /// Total revenue over total time actually spent.
    pub observed_blended_rpm: f64,
    pub target_mix: AllocationMix,
    /// `None` when a weighted method is absent from the data.
    pub target_blended_rpm: Option<f64>,
    pub blended_improvement_pct: Percent,
    pub opportunity: Option<OpportunityCost>,
    pub paradox: Option<TimeParadox>,
    pub leaders: Leaders,
}

/// `sum(value_i * w_i) / sum(cost_i * w_i)` over `(value, cost, weight)`
/// triples. `None` when the weighted cost is zero.
pub fn weighted_ratio(parts: impl IntoIterator<Item = (f64, f64, f64)>) -> Option<f64> {
    let (num, den) = parts
        .into_iter()
        .fold((0.0, 0.0), |(n, d), (value, cost, w)| (n + value * w, d + cost * w));
    if den == 0.0 { None } else { Some(num / den) }
}

/// Per-method efficiency metrics, ranked by revenue per minute.
///
/// # Errors
///
/// Returns [`RaterError::Config`] if a method present in `transactions` has
/// no entry in `time_cost`.
pub fn method_efficiency(
    transactions: &[Transaction],
    time_cost: &BTreeMap<SalesMethod, f64>,
) -> RaterResult<Vec<MethodEfficiency>> {
    let mut methods = Vec::new();

    for (method, rows) in group_by(transactions, |t| t.sales_method) {
        let minutes = *time_cost.get(&method).ok_or_else(|| {
            RaterError::config(
                "time_cost_minutes",
                format!("no time cost configured for {method}"),
            )
        })?;

        let customers = rows
            .iter()
            .map(|t| t.customer_id.as_str())
            .collect::<HashSet<_>>()
            .len();
        let total_revenue: f64 = rows.iter().map(|t| t.revenue).sum();
        let avg_revenue = total_revenue / rows.len() as f64;

        methods.push(MethodEfficiency {
            rank: 0,
            sales_method: method,
            customers,
            total_revenue,
            avg_revenue,
            time_per_customer: minutes,
            total_time: customers as f64 * minutes,
            revenue_per_minute: avg_revenue / minutes,
        });
    }

    // Stable sort keeps canonical order between equal ratios.
    methods.sort_by(|a, b| b.revenue_per_minute.total_cmp(&a.revenue_per_minute));
    for (i, m) in methods.iter_mut().enumerate() {
        m.rank = i + 1;
    }

    Ok(methods)
}

/// Revenue per minute under a hypothetical allocation mix.
///
/// `None` when the mix gives positive weight to a method with no
/// transactions, or when the weighted time is zero.
pub fn blended_ratio(methods: &[MethodEfficiency], mix: &AllocationMix) -> Option<f64> {
    let mut parts = Vec::new();
    for (method, w) in mix.iter() {
        if w == 0.0 {
            continue;
        }
        let Some(m) = methods.iter().find(|m| m.sales_method == method) else {
            warn!(%method, weight = w, "Weighted method has no transactions, blended ratio undefined");
            return None;
        };
        parts.push((m.avg_revenue, m.time_per_customer, w));
    }

    weighted_ratio(parts)
}

/// Total revenue over total time actually invested.
pub fn observed_blended_ratio(methods: &[MethodEfficiency]) -> Option<f64> {
    weighted_ratio(methods.iter().map(|m| (m.total_revenue, m.total_time, 1.0)))
}

/// What `from`'s invested time would have earned spent on `to` instead.
pub fn opportunity_cost(from: &MethodEfficiency, to: &MethodEfficiency) -> OpportunityCost {
    let potential_customers = from.total_time / to.time_per_customer;
    let potential_revenue = potential_customers * to.avg_revenue;
    let cost = potential_revenue - from.total_revenue;

    OpportunityCost {
        from: from.sales_method,
        to: to.sales_method,
        time_invested: from.total_time,
        actual_customers: from.customers,
        actual_revenue: from.total_revenue,
        potential_customers,
        potential_revenue,
        opportunity_cost: cost,
        improvement_pct: Percent::of(cost, from.total_revenue),
    }
}

/// Time saved and revenue gained per customer by switching `from` → `to`.
pub fn time_paradox(from: &MethodEfficiency, to: &MethodEfficiency) -> TimeParadox {
    TimeParadox {
        from: from.sales_method,
        to: to.sales_method,
        time_savings_pct: Percent::reduction(from.time_per_customer, to.time_per_customer),
        revenue_increase_pct: Percent::change(from.avg_revenue, to.avg_revenue),
    }
}

fn leader_by(methods: &[MethodEfficiency], f: impl Fn(&MethodEfficiency) -> f64) -> Option<SalesMethod> {
    methods
        .iter()
        .min_by(|a, b| {
            f(b).total_cmp(&f(a))
                .then(a.sales_method.cmp(&b.sales_method))
        })
        .map(|m| m.sales_method)
}

/// Full efficiency analysis.
///
/// The reallocation comparison moves the least efficient method's time to
/// the method with the highest average revenue among the others.
///
/// # Errors
///
/// Returns [`RaterError::Config`] for a missing time cost and
/// [`RaterError::EmptyDataset`] when there are no transactions.
#[tracing::instrument(skip_all)]
pub fn analyze_efficiency(
    transactions: &[Transaction],
    time_cost: &BTreeMap<SalesMethod, f64>,
    mix: &AllocationMix,
) -> RaterResult<EfficiencyReport> {
    let methods = method_efficiency(transactions, time_cost)?;
    let (Some(best), Some(worst)) = (methods.first(), methods.last()) else {
        return Err(RaterError::EmptyDataset);
    };

    let efficiency_gap =
        (worst.revenue_per_minute != 0.0).then(|| best.revenue_per_minute / worst.revenue_per_minute);
    let observed = observed_blended_ratio(&methods).ok_or(RaterError::EmptyDataset)?;
    let target = blended_ratio(&methods, mix);

    let target_method = methods
        .iter()
        .filter(|m| m.sales_method != worst.sales_method)
        .min_by(|a, b| {
            b.avg_revenue
                .total_cmp(&a.avg_revenue)
                .then(a.sales_method.cmp(&b.sales_method))
        });
    let opportunity = target_method.map(|to| opportunity_cost(worst, to));
    let paradox = target_method.map(|to| time_paradox(worst, to));

    let leaders = Leaders {
        highest_avg_revenue: leader_by(&methods, |m| m.avg_revenue).ok_or(RaterError::EmptyDataset)?,
        highest_revenue_per_minute: best.sales_method,
        highest_total_revenue: leader_by(&methods, |m| m.total_revenue)
            .ok_or(RaterError::EmptyDataset)?,
    };

    info!(
        best = %best.sales_method,
        worst = %worst.sales_method,
        observed_blended_rpm = observed,
        target_blended_rpm = ?target,
        "Efficiency computed"
    );
    debug!(?efficiency_gap, "Efficiency gap");

    Ok(EfficiencyReport {
        efficiency_gap,
        observed_blended_rpm: observed,
        target_mix: mix.clone(),
        target_blended_rpm: target,
        blended_improvement_pct: target
            .map_or(Percent::Undefined, |t| Percent::change(observed, t)),
        opportunity,
        paradox,
        leaders,
        methods,
    })
}
