//! Data types used by the analysis stages.

use crate::output::Table;
use crate::record::SalesMethod;
use serde::{Serialize, Serializer};
use std::fmt;

/// A percentage that may be undefined because its base is zero.
///
/// Serializes as a number, or as the string `undefined`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Percent {
    Defined(f64),
    Undefined,
}

impl Percent {
    /// `(to - from) / from * 100`. Undefined when `from` is zero.
    pub fn change(from: f64, to: f64) -> Self {
        if from == 0.0 {
            Percent::Undefined
        } else {
            Percent::Defined((to - from) / from * 100.0)
        }
    }

    /// `(from - to) / from * 100`, the relative reduction from `from` to `to`.
    pub fn reduction(from: f64, to: f64) -> Self {
        if from == 0.0 {
            Percent::Undefined
        } else {
            Percent::Defined((from - to) / from * 100.0)
        }
    }

    /// `part / total * 100`. Undefined when `total` is zero.
    pub fn of(part: f64, total: f64) -> Self {
        if total == 0.0 {
            Percent::Undefined
        } else {
            Percent::Defined(part / total * 100.0)
        }
    }

    /// Difference in percentage points, undefined if either side is.
    pub fn points_since(self, earlier: Percent) -> Self {
        match (earlier, self) {
            (Percent::Defined(a), Percent::Defined(b)) => Percent::Defined(b - a),
            _ => Percent::Undefined,
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Percent::Defined(v) => Some(v),
            Percent::Undefined => None,
        }
    }

    pub fn is_undefined(self) -> bool {
        matches!(self, Percent::Undefined)
    }
}

impl Serialize for Percent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Percent::Defined(v) => serializer.serialize_f64(*v),
            Percent::Undefined => serializer.serialize_str("undefined"),
        }
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Percent::Defined(v) => write!(f, "{v:+.1}%"),
            Percent::Undefined => f.write_str("undefined"),
        }
    }
}

/// One row of a grouping table. Key columns not used by the grouping are empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub sales_method: Option<SalesMethod>,
    pub week: Option<u32>,
    pub count: usize,
    pub unique_customers: usize,
    pub share_pct: Percent,
    pub total_revenue: f64,
    pub mean_revenue: f64,
    pub median_revenue: f64,
    pub units_sold: u64,
    /// Allocation reading of the customer share, method grouping only.
    pub allocation: Option<&'static str>,
}

/// Descriptive statistics for one group of revenue values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionSummary {
    pub group: String,
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
    pub iqr: f64,
    /// Mean relative to the overall mean; undefined for the overall row.
    pub vs_overall_pct: Percent,
    pub performance: Option<&'static str>,
}

/// Revenue of one method in one week.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyRevenue {
    pub week: u32,
    pub sales_method: SalesMethod,
    pub revenue: f64,
    /// Change from the previous week; empty for the first week.
    pub wow_change_pct: Option<Percent>,
    pub share_pct: Percent,
}

/// First-to-last-week movement of one method.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSummary {
    pub sales_method: SalesMethod,
    pub first_week: u32,
    pub last_week: u32,
    pub first_week_revenue: f64,
    pub last_week_revenue: f64,
    pub total_change_pct: Percent,
    pub avg_weekly_growth_pct: Percent,
    pub trend: &'static str,
    pub first_week_share_pct: Percent,
    pub last_week_share_pct: Percent,
    pub share_shift_pts: Percent,
}

/// First week in which `challenger` out-earns `leader`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Crossover {
    pub leader: SalesMethod,
    pub challenger: SalesMethod,
    pub crossover_week: Option<u32>,
    pub leader_revenue: Option<f64>,
    pub challenger_revenue: Option<f64>,
}

/// Revenue-per-minute metrics for one method.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodEfficiency {
    pub rank: usize,
    pub sales_method: SalesMethod,
    pub customers: usize,
    pub total_revenue: f64,
    pub avg_revenue: f64,
    pub time_per_customer: f64,
    pub total_time: f64,
    pub revenue_per_minute: f64,
}

/// Revenue forgone by spending `from`'s time on `to` instead.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpportunityCost {
    pub from: SalesMethod,
    pub to: SalesMethod,
    pub time_invested: f64,
    pub actual_customers: usize,
    pub actual_revenue: f64,
    pub potential_customers: f64,
    pub potential_revenue: f64,
    pub opportunity_cost: f64,
    pub improvement_pct: Percent,
}

/// Time saved and revenue gained by moving customers from one method to another.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeParadox {
    pub from: SalesMethod,
    pub to: SalesMethod,
    pub time_savings_pct: Percent,
    pub revenue_increase_pct: Percent,
}

/// The methods leading on each efficiency measure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Leaders {
    pub highest_avg_revenue: SalesMethod,
    pub highest_revenue_per_minute: SalesMethod,
    pub highest_total_revenue: SalesMethod,
}

impl Table for GroupSummary {
    const HEADERS: &'static [&'static str] = &[
        "sales_method",
        "week",
        "count",
        "unique_customers",
        "share_pct",
        "total_revenue",
        "mean_revenue",
        "median_revenue",
        "units_sold",
        "allocation",
    ];
}

impl Table for DistributionSummary {
    const HEADERS: &'static [&'static str] = &[
        "group",
        "count",
        "mean",
        "std_dev",
        "min",
        "q1",
        "median",
        "q3",
        "max",
        "iqr",
        "vs_overall_pct",
        "performance",
    ];
}

impl Table for WeeklyRevenue {
    const HEADERS: &'static [&'static str] =
        &["week", "sales_method", "revenue", "wow_change_pct", "share_pct"];
}

impl Table for TrendSummary {
    const HEADERS: &'static [&'static str] = &[
        "sales_method",
        "first_week",
        "last_week",
        "first_week_revenue",
        "last_week_revenue",
        "total_change_pct",
        "avg_weekly_growth_pct",
        "trend",
        "first_week_share_pct",
        "last_week_share_pct",
        "share_shift_pts",
    ];
}

impl Table for Crossover {
    const HEADERS: &'static [&'static str] = &[
        "leader",
        "challenger",
        "crossover_week",
        "leader_revenue",
        "challenger_revenue",
    ];
}

impl Table for MethodEfficiency {
    const HEADERS: &'static [&'static str] = &[
        "rank",
        "sales_method",
        "customers",
        "total_revenue",
        "avg_revenue",
        "time_per_customer",
        "total_time",
        "revenue_per_minute",
    ];
}

impl Table for OpportunityCost {
    const HEADERS: &'static [&'static str] = &[
        "from",
        "to",
        "time_invested",
        "actual_customers",
        "actual_revenue",
        "potential_customers",
        "potential_revenue",
        "opportunity_cost",
        "improvement_pct",
    ];
}
